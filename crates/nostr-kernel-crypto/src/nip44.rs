//! NIP-44 v2 authenticated encryption.
//!
//! ## Key schedule
//!
//! ```text
//! conversation_key = HKDF-Extract(salt = "nip44-v2", ikm = ecdh_x)
//! message_keys     = HKDF-Expand(conversation_key, info = nonce, L = 76)
//!   chacha_key   = message_keys[0..32]
//!   chacha_nonce = message_keys[32..44]
//!   hmac_key     = message_keys[44..76]
//! ```
//!
//! The plaintext is length-prefixed and zero-padded to a bucket size, then
//! ChaCha20-encrypted. The MAC is HMAC-SHA256 over `nonce || ciphertext` and is
//! checked before anything is decrypted.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;

use nostr_kernel_core::{Keypair, PublicKey};

use crate::ecdh::{self, SharedSecret};
use crate::envelope::Nip44Payload;
use crate::error::{CryptoError, Result};

type HmacSha256 = Hmac<Sha256>;

const SALT: &[u8] = b"nip44-v2";

/// Largest plaintext a 16-bit length prefix can describe.
pub const MAX_PLAINTEXT_LEN: usize = u16::MAX as usize;

/// Per-pair key: the HKDF-Extract output over the ECDH secret.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ConversationKey([u8; 32]);

impl ConversationKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive from an already computed shared secret.
    pub fn from_shared_secret(secret: &SharedSecret) -> Self {
        let (prk, _) = Hkdf::<Sha256>::extract(Some(SALT), secret.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&prk);
        Self(out)
    }

    /// Derive from our secret key and the peer's public key.
    pub fn derive(keypair: &Keypair, peer: &PublicKey) -> Result<Self> {
        let secret = ecdh::shared_secret(&keypair.secret_bytes(), peer)?;
        Ok(Self::from_shared_secret(&secret))
    }
}

impl fmt::Debug for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConversationKey(<redacted>)")
    }
}

/// Keys for a single message, expanded from the conversation key and nonce.
pub struct MessageKeys {
    pub chacha_key: [u8; 32],
    pub chacha_nonce: [u8; 12],
    pub hmac_key: [u8; 32],
}

impl MessageKeys {
    /// One HKDF-Expand call of 76 bytes, sliced into the three keys.
    pub fn derive(conversation_key: &ConversationKey, nonce: &[u8; 32]) -> Result<Self> {
        let hkdf = Hkdf::<Sha256>::from_prk(conversation_key.as_bytes())
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;

        let mut okm = [0u8; 76];
        hkdf.expand(nonce, &mut okm)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;

        let mut keys = MessageKeys {
            chacha_key: [0u8; 32],
            chacha_nonce: [0u8; 12],
            hmac_key: [0u8; 32],
        };
        keys.chacha_key.copy_from_slice(&okm[0..32]);
        keys.chacha_nonce.copy_from_slice(&okm[32..44]);
        keys.hmac_key.copy_from_slice(&okm[44..76]);
        Ok(keys)
    }

    fn apply_keystream(&self, buf: &mut [u8]) {
        let mut cipher = ChaCha20::new(&self.chacha_key.into(), &self.chacha_nonce.into());
        cipher.apply_keystream(buf);
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.hmac_key)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))
    }
}

/// Padded length for a plaintext of `len` bytes.
///
/// Up to 32 bytes pads to 32. Above that, lengths round up to a multiple of
/// a chunk: 32 while the next power of two is at most 256, otherwise an
/// eighth of that power.
pub fn calc_padded_len(len: usize) -> usize {
    if len <= 32 {
        return 32;
    }
    let next_power = 1usize << (usize::BITS - (len - 1).leading_zeros());
    let chunk = if next_power <= 256 { 32 } else { next_power / 8 };
    chunk * ((len - 1) / chunk + 1)
}

fn pad(plaintext: &[u8]) -> Result<Vec<u8>> {
    let len = plaintext.len();
    if len > MAX_PLAINTEXT_LEN {
        return Err(CryptoError::MessageTooLong(len));
    }
    let mut out = Vec::with_capacity(2 + calc_padded_len(len));
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.extend_from_slice(plaintext);
    out.resize(2 + calc_padded_len(len), 0);
    Ok(out)
}

fn unpad(padded: &[u8]) -> Result<&[u8]> {
    if padded.len() < 2 {
        return Err(CryptoError::DecryptionFailed);
    }
    let len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    if padded.len() != 2 + calc_padded_len(len) {
        return Err(CryptoError::DecryptionFailed);
    }
    Ok(&padded[2..2 + len])
}

/// Encrypt under a conversation key with a fresh random nonce.
pub fn encrypt(conversation_key: &ConversationKey, plaintext: &str) -> Result<String> {
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);
    encrypt_with_nonce(conversation_key, plaintext, &nonce)
}

/// Encrypt with a caller-chosen nonce. Reusing a nonce under the same
/// conversation key breaks confidentiality; this exists for test vectors.
pub fn encrypt_with_nonce(
    conversation_key: &ConversationKey,
    plaintext: &str,
    nonce: &[u8; 32],
) -> Result<String> {
    let keys = MessageKeys::derive(conversation_key, nonce)?;

    let mut ciphertext = pad(plaintext.as_bytes())?;
    keys.apply_keystream(&mut ciphertext);

    let mut mac = keys.mac()?;
    mac.update(nonce);
    mac.update(&ciphertext);

    let mut tag = [0u8; 32];
    tag.copy_from_slice(&mac.finalize().into_bytes());

    Ok(Nip44Payload {
        nonce: *nonce,
        ciphertext,
        mac: tag,
    }
    .encode())
}

/// Decrypt a base64 payload. The MAC is verified before decrypting.
pub fn decrypt(conversation_key: &ConversationKey, payload: &str) -> Result<String> {
    let payload = Nip44Payload::decode(payload)?;
    let keys = MessageKeys::derive(conversation_key, &payload.nonce)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let mut mac = keys.mac().map_err(|_| CryptoError::DecryptionFailed)?;
    for part in payload.authenticated_parts() {
        mac.update(part);
    }
    mac.verify_slice(&payload.mac)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let mut padded = payload.ciphertext;
    keys.apply_keystream(&mut padded);

    let plaintext = unpad(&padded)?;
    String::from_utf8(plaintext.to_vec()).map_err(|_| CryptoError::DecryptionFailed)
}

/// Encrypt from our key to a peer, deriving the conversation key.
pub fn encrypt_to(keypair: &Keypair, peer: &PublicKey, plaintext: &str) -> Result<String> {
    encrypt(&ConversationKey::derive(keypair, peer)?, plaintext)
}

/// Decrypt a payload from a peer, deriving the conversation key.
pub fn decrypt_from(keypair: &Keypair, peer: &PublicKey, payload: &str) -> Result<String> {
    decrypt(&ConversationKey::derive(keypair, peer)?, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use proptest::prelude::*;

    fn secret(last: u8) -> Keypair {
        let mut bytes = [0u8; 32];
        bytes[31] = last;
        Keypair::from_secret_bytes(&bytes).unwrap()
    }

    fn pair() -> (Keypair, Keypair, ConversationKey) {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let key = ConversationKey::derive(&alice, &bob.public_key()).unwrap();
        (alice, bob, key)
    }

    #[test]
    fn test_padding_table() {
        let table = [
            (0, 32),
            (1, 32),
            (16, 32),
            (32, 32),
            (33, 64),
            (37, 64),
            (45, 64),
            (49, 64),
            (64, 64),
            (65, 96),
            (100, 128),
            (111, 128),
            (200, 224),
            (250, 256),
            (256, 256),
            (257, 320),
            (320, 320),
            (383, 384),
            (384, 384),
            (400, 448),
            (500, 512),
            (512, 512),
            (515, 640),
            (700, 768),
            (800, 896),
            (900, 1024),
            (1020, 1024),
            (65536, 65536),
        ];
        for (len, padded) in table {
            assert_eq!(calc_padded_len(len), padded, "len {}", len);
        }
    }

    #[test]
    fn test_conversation_key_vector() {
        let key = ConversationKey::derive(&secret(1), &secret(2).public_key()).unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "c41c775356fd92eadc63ff5a0dc1da211b268cbea22316767095b2871ea1412d"
        );
    }

    #[test]
    fn test_payload_vector() {
        let key = ConversationKey::derive(&secret(1), &secret(2).public_key()).unwrap();
        let mut nonce = [0u8; 32];
        nonce[31] = 1;

        let payload = encrypt_with_nonce(&key, "a", &nonce).unwrap();
        assert_eq!(
            payload,
            "AgAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAABee0G5VSK0/9YypIObAtDKfYEAjD35uVkHyB0F4DwrcNaCXlCWZKaArsGrY6M9wnuTMxWfp1RTN9Xga8no+kF5Vsb"
        );
        assert_eq!(decrypt(&key, &payload).unwrap(), "a");
    }

    #[test]
    fn test_conversation_key_is_symmetric() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let ab = ConversationKey::derive(&alice, &bob.public_key()).unwrap();
        let ba = ConversationKey::derive(&bob, &alice.public_key()).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_roundtrip_across_the_pair() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let payload = encrypt_to(&alice, &bob.public_key(), "hello 💌").unwrap();
        let plain = decrypt_from(&bob, &alice.public_key(), &payload).unwrap();
        assert_eq!(plain, "hello 💌");
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let (_, _, key) = pair();
        let payload = encrypt(&key, "").unwrap();
        assert_eq!(decrypt(&key, &payload).unwrap(), "");
    }

    #[test]
    fn test_max_length_roundtrip_and_one_over_fails() {
        let (_, _, key) = pair();
        let max = "x".repeat(MAX_PLAINTEXT_LEN);
        let payload = encrypt(&key, &max).unwrap();
        assert_eq!(decrypt(&key, &payload).unwrap(), max);

        let over = "x".repeat(MAX_PLAINTEXT_LEN + 1);
        assert!(matches!(
            encrypt(&key, &over),
            Err(CryptoError::MessageTooLong(65536))
        ));
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let (_, _, key) = pair();
        let (_, _, other) = pair();
        let payload = encrypt(&key, "secret").unwrap();
        assert!(matches!(
            decrypt(&other, &payload),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_nonces_are_fresh() {
        let (_, _, key) = pair();
        assert_ne!(encrypt(&key, "same").unwrap(), encrypt(&key, "same").unwrap());
    }

    #[test]
    fn test_bad_padding_prefix_rejected_after_mac() {
        // Forge a payload whose MAC is valid but whose length prefix lies.
        let (_, _, key) = pair();
        let nonce = [3u8; 32];
        let keys = MessageKeys::derive(&key, &nonce).unwrap();

        let mut buf = vec![0u8; 34];
        buf[0] = 0;
        buf[1] = 40; // claims 40 bytes, buffer only holds 32
        keys.apply_keystream(&mut buf);

        let mut mac = keys.mac().unwrap();
        mac.update(&nonce);
        mac.update(&buf);
        let mut tag = [0u8; 32];
        tag.copy_from_slice(&mac.finalize().into_bytes());

        let forged = Nip44Payload {
            nonce,
            ciphertext: buf,
            mac: tag,
        }
        .encode();
        assert!(matches!(
            decrypt(&key, &forged),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn roundtrip_any_text(text in "\\PC{0,400}") {
            let key = ConversationKey::from_bytes([0x11; 32]);
            let payload = encrypt(&key, &text).unwrap();
            prop_assert_eq!(decrypt(&key, &payload).unwrap(), text);
        }

        #[test]
        fn flipped_mac_bit_fails(bit in 0usize..256) {
            let key = ConversationKey::from_bytes([0x22; 32]);
            let payload = encrypt(&key, "attack at dawn").unwrap();
            let mut raw = BASE64.decode(&payload).unwrap();
            let mac_start = raw.len() - 32;
            raw[mac_start + bit / 8] ^= 1 << (bit % 8);
            let tampered = BASE64.encode(raw);
            prop_assert!(matches!(decrypt(&key, &tampered), Err(CryptoError::DecryptionFailed)));
        }

        #[test]
        fn flipped_ciphertext_bit_fails(byte in 33usize..99, bit in 0u8..8) {
            let key = ConversationKey::from_bytes([0x33; 32]);
            let payload = encrypt(&key, "attack at dawn").unwrap();
            let mut raw = BASE64.decode(&payload).unwrap();
            let idx = byte.min(raw.len() - 33);
            raw[idx] ^= 1 << bit;
            let tampered = BASE64.encode(raw);
            prop_assert!(decrypt(&key, &tampered).is_err());
        }
    }
}
