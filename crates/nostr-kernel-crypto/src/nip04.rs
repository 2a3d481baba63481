//! NIP-04 legacy encryption.
//!
//! AES-256-CBC with PKCS#7 padding, keyed directly on the 32-byte ECDH
//! secret, with a random 16-byte IV. Content is `base64(ct)?iv=base64(iv)`.
//! There is no authentication; prefer NIP-44 for anything new.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::ecdh::SharedSecret;
use crate::error::{CryptoError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_MARKER: &str = "?iv=";

/// A buggy client appended this to its payloads.
const NULL_SUFFIX: &str = "-null";

/// True when the content looks like a NIP-04 payload.
pub fn is_nip04_payload(content: &str) -> bool {
    let content = content.strip_suffix(NULL_SUFFIX).unwrap_or(content);
    match content.split_once(IV_MARKER) {
        Some((ct, iv)) => !ct.is_empty() && iv.len() == 24,
        None => false,
    }
}

/// Encrypt with a random IV.
pub fn encrypt(secret: &SharedSecret, plaintext: &str) -> Result<String> {
    let iv: [u8; 16] = rand::random();
    encrypt_with_iv(secret, plaintext, &iv)
}

/// Encrypt with a caller-chosen IV.
pub fn encrypt_with_iv(secret: &SharedSecret, plaintext: &str, iv: &[u8; 16]) -> Result<String> {
    let pt = plaintext.as_bytes();
    let mut buf = vec![0u8; pt.len() + 16];
    buf[..pt.len()].copy_from_slice(pt);

    let ciphertext = Aes256CbcEnc::new_from_slices(secret.as_bytes(), iv)
        .map_err(|e| CryptoError::EncryptionError(e.to_string()))?
        .encrypt_padded_mut::<Pkcs7>(&mut buf, pt.len())
        .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;

    Ok(format!(
        "{}{}{}",
        BASE64.encode(ciphertext),
        IV_MARKER,
        BASE64.encode(iv)
    ))
}

/// Decrypt `base64(ct)?iv=base64(iv)`, tolerating a trailing `-null`.
pub fn decrypt(secret: &SharedSecret, content: &str) -> Result<String> {
    let content = content.strip_suffix(NULL_SUFFIX).unwrap_or(content);
    let (ct, iv) = content
        .split_once(IV_MARKER)
        .ok_or(CryptoError::DecryptionFailed)?;

    let mut buf = BASE64
        .decode(ct.trim())
        .map_err(|_| CryptoError::DecryptionFailed)?;
    let iv: [u8; 16] = BASE64
        .decode(iv.trim())
        .map_err(|_| CryptoError::DecryptionFailed)?
        .try_into()
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let plaintext = Aes256CbcDec::new_from_slices(secret.as_bytes(), &iv)
        .map_err(|_| CryptoError::DecryptionFailed)?
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext.to_vec()).map_err(|_| CryptoError::DecryptionFailed)
}
