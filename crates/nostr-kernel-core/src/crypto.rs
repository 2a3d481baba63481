//! Cryptographic primitives for the Nostr kernel.
//!
//! Wraps BIP-340 Schnorr signing over secp256k1 and SHA-256 hashing with
//! strong types.

use k256::schnorr::{SigningKey, VerifyingKey};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::codec::{self, hex_newtype};
use crate::error::CoreError;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Hash(pub [u8; 32]);

hex_newtype!(Sha256Hash, 32, "Sha256");

impl Sha256Hash {
    /// Compute the SHA-256 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }
}

/// A 32-byte x-only secp256k1 public key (BIP-340).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(pub [u8; 32]);

hex_newtype!(PublicKey, 32, "PublicKey");

impl PublicKey {
    /// Check that the x coordinate lies on the curve.
    pub fn is_valid(&self) -> bool {
        VerifyingKey::from_bytes(&self.0).is_ok()
    }

    /// Verify a Schnorr signature over `message`.
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not verify.
    /// Fails only when the public key itself is not a valid curve point.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<bool, CoreError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;

        let sig = match k256::schnorr::Signature::try_from(signature.0.as_slice()) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };

        Ok(verifying_key.verify_raw(message, &sig).is_ok())
    }
}

/// A 64-byte BIP-340 Schnorr signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

hex_newtype!(Signature, 64, "Signature");

impl Signature {
    /// Parse from a byte slice, rejecting anything that is not 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        Self::try_from(bytes).map_err(|_| CoreError::MalformedSignature(bytes.len()))
    }
}

/// Verify raw signature bytes against a message and x-only public key bytes.
///
/// Structurally malformed input (wrong lengths, key not on the curve) is an
/// error; a well-formed signature that fails to verify is `Ok(false)`.
pub fn verify_signature(
    signature: &[u8],
    message: &[u8],
    public_key: &[u8],
) -> Result<bool, CoreError> {
    let signature = Signature::from_slice(signature)?;
    let public_key = PublicKey::try_from(public_key)?;
    public_key.verify(message, &signature)
}

/// A secp256k1 keypair for signing events.
///
/// This wraps k256's Schnorr SigningKey.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::random(&mut rng),
        }
    }

    /// Create from 32 secret key bytes.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Result<Self, CoreError> {
        let signing_key =
            SigningKey::from_bytes(secret).map_err(|_| CoreError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// Parse a hex-encoded secret key.
    pub fn from_secret_hex(s: &str) -> Result<Self, CoreError> {
        let secret = codec::decode_fixed::<32>(s)?;
        Self::from_secret_bytes(&secret)
    }

    /// Get the x-only public key.
    pub fn public_key(&self) -> PublicKey {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.signing_key.verifying_key().to_bytes());
        PublicKey(out)
    }

    /// Sign a message with fresh auxiliary randomness.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, CoreError> {
        let mut aux = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut aux);
        self.sign_with_aux(message, &aux)
    }

    /// Sign a message with caller-supplied auxiliary randomness.
    ///
    /// Passing all zeros gives the deterministic signature that libsecp256k1
    /// produces when no aux data is supplied.
    pub fn sign_with_aux(&self, message: &[u8], aux: &[u8; 32]) -> Result<Signature, CoreError> {
        let sig = self
            .signing_key
            .sign_raw(message, aux)
            .map_err(|e| CoreError::SigningFailed(e.to_string()))?;
        Ok(Signature(sig.to_bytes()))
    }

    /// Deterministic signature (all-zero aux). Intended for test vectors.
    pub fn sign_deterministic(&self, message: &[u8]) -> Result<Signature, CoreError> {
        self.sign_with_aux(message, &[0u8; 32])
    }

    /// Get the raw secret key bytes.
    pub fn secret_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.signing_key.to_bytes());
        out
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP-340 test vector 0.
    const BIP340_SECRET: &str = "0000000000000000000000000000000000000000000000000000000000000003";
    const BIP340_PUBKEY: &str = "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9";
    const BIP340_SIG: &str = "e907831f80848d1069a5371b402410364bdf1c5f8307b0084c55f1ce2dca821525f66a4a85ea8b71e482a74f382d2ce5ebeee8fdb2172f477df4900d310536c0";

    #[test]
    fn test_bip340_vector_zero() {
        let keypair = Keypair::from_secret_hex(BIP340_SECRET).unwrap();
        assert_eq!(keypair.public_key().to_hex(), BIP340_PUBKEY);

        let sig = keypair.sign_with_aux(&[0u8; 32], &[0u8; 32]).unwrap();
        assert_eq!(sig.to_hex(), BIP340_SIG);

        assert!(keypair.public_key().verify(&[0u8; 32], &sig).unwrap());
    }

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::generate();
        let message = Sha256Hash::hash(b"hello world");
        let signature = keypair.sign(message.as_bytes()).unwrap();

        assert!(keypair
            .public_key()
            .verify(message.as_bytes(), &signature)
            .unwrap());

        let tampered = Sha256Hash::hash(b"hello worlD");
        assert!(!keypair
            .public_key()
            .verify(tampered.as_bytes(), &signature)
            .unwrap());
    }

    #[test]
    fn test_randomized_signatures_differ_but_verify() {
        let keypair = Keypair::generate();
        let message = Sha256Hash::hash(b"Test");

        let s1 = keypair.sign(message.as_bytes()).unwrap();
        let s2 = keypair.sign(message.as_bytes()).unwrap();
        assert_ne!(s1, s2);

        let pk = keypair.public_key();
        assert!(pk.verify(message.as_bytes(), &s1).unwrap());
        assert!(pk.verify(message.as_bytes(), &s2).unwrap());
    }

    #[test]
    fn test_deterministic_signature_is_stable() {
        let keypair = Keypair::from_secret_bytes(&[0x42; 32]).unwrap();
        let message = Sha256Hash::hash(b"Test");

        let s1 = keypair.sign_deterministic(message.as_bytes()).unwrap();
        let s2 = keypair.sign_deterministic(message.as_bytes()).unwrap();
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_keypair_from_secret_is_deterministic() {
        let kp1 = Keypair::from_secret_bytes(&[0x42; 32]).unwrap();
        let kp2 = Keypair::from_secret_bytes(&[0x42; 32]).unwrap();
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.secret_bytes(), [0x42; 32]);
    }

    #[test]
    fn test_zero_secret_rejected() {
        assert!(matches!(
            Keypair::from_secret_bytes(&[0u8; 32]),
            Err(CoreError::InvalidSecretKey)
        ));
    }

    #[test]
    fn test_verify_signature_malformed_length_is_error() {
        let keypair = Keypair::generate();
        let pk = keypair.public_key();
        let result = verify_signature(&[0u8; 63], &[0u8; 32], pk.as_bytes());
        assert!(matches!(result, Err(CoreError::MalformedSignature(63))));
    }

    #[test]
    fn test_verify_signature_well_formed_invalid_is_false() {
        let keypair = Keypair::generate();
        let pk = keypair.public_key();
        let sig = keypair.sign(&[1u8; 32]).unwrap();
        let result = verify_signature(sig.as_bytes(), &[2u8; 32], pk.as_bytes()).unwrap();
        assert!(!result);
    }

    #[test]
    fn test_sha256_hash() {
        let h1 = Sha256Hash::hash(b"test data");
        let h2 = Sha256Hash::hash(b"test data");
        assert_eq!(h1, h2);
        assert_ne!(h1, Sha256Hash::hash(b"different data"));

        // SHA-256("") is a well-known constant.
        assert_eq!(
            Sha256Hash::hash(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let keypair = Keypair::generate();
        let pk = keypair.public_key();
        let recovered = PublicKey::from_hex(&pk.to_hex()).unwrap();
        assert_eq!(pk, recovered);
        assert!(recovered.is_valid());
    }
}
