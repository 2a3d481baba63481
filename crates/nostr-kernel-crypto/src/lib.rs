//! # Nostr Kernel Crypto
//!
//! Key agreement, payload ciphers, signers and private-message layering.
//!
//! ## Overview
//!
//! Private content on Nostr is encrypted between two secp256k1 keys. Both
//! ciphers start from the same ECDH shared secret:
//!
//! - **NIP-44** ([`nip44`]): HKDF key schedule, padded ChaCha20, HMAC-SHA256
//!   checked before decrypting. Versioned base64 envelope ([`envelope`]).
//! - **NIP-04** ([`nip04`]): legacy AES-256-CBC keyed directly on the secret.
//!
//! Shared secrets are memoized in a [`SharedSecretCache`] owned by whoever
//! owns the signer, and cleared explicitly at logout.
//!
//! ## Signers
//!
//! [`NostrSigner`] is the capability to act for a public key. It is async so
//! that [`RemoteSigner`] (requests answered by another task or device) has the
//! same shape as the in-process [`InternalSigner`]. A [`ReadOnlySigner`]
//! refuses every private operation with [`SignerError::ReadOnly`].
//!
//! ## Gift wraps
//!
//! [`giftwrap`] turns a rumor into a seal (signed by the author) and the seal
//! into a gift wrap (signed by a one-time key), and reverses both steps.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nostr_kernel_core::{EventTemplate, Keypair, Kind};
//! use nostr_kernel_crypto::{giftwrap, InternalSigner, NostrSigner};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let alice = InternalSigner::from_keypair(Keypair::generate());
//! let bob = InternalSigner::from_keypair(Keypair::generate());
//!
//! let rumor = EventTemplate::new(Kind::PRIVATE_DIRECT_MESSAGE, "hi bob")
//!     .to_unsigned(alice.pubkey());
//! let wrap = giftwrap::seal_and_wrap(&alice, &rumor, &bob.pubkey(), None).await?;
//! let opened = giftwrap::unwrap_and_unseal(&bob, &wrap).await?;
//! assert_eq!(opened.content(), "hi bob");
//! # Ok(())
//! # }
//! ```

pub mod ecdh;
pub mod envelope;
pub mod error;
pub mod giftwrap;
pub mod nip04;
pub mod nip44;
pub mod remote;
pub mod signer;

pub use ecdh::{shared_secret, SharedSecret, SharedSecretCache};
pub use envelope::{Nip44Payload, PayloadFormat};
pub use error::{CryptoError, Result, SignerError, WrapError};
pub use nip44::{calc_padded_len, ConversationKey, MessageKeys};
pub use remote::{
    serve_remote_signer, RemoteMethod, RemoteRequest, RemoteResponse, RemoteSigner,
    RemoteSignerConfig,
};
pub use signer::{InternalSigner, NostrSigner, ReadOnlySigner, SignerResult};
