//! Hex codec for fixed-width protocol values.
//!
//! Keys, ids and signatures travel as lowercase hex on the wire. Decoding
//! for values that feed the canonical hash is strict (lowercase only), since
//! re-encoding an uppercase input would silently change the event id.

use crate::error::CoreError;

/// Encode bytes as lowercase hex.
pub fn encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a hex string of exactly `N` bytes. Accepts either case.
pub fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], CoreError> {
    if s.len() != N * 2 {
        return Err(CoreError::InvalidLength {
            expected: N,
            got: s.len() / 2,
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out)?;
    Ok(out)
}

/// Decode a lowercase hex string of exactly `N` bytes.
pub fn decode_canonical<const N: usize>(s: &str) -> Result<[u8; N], CoreError> {
    if let Some((index, c)) = s.char_indices().find(|(_, c)| c.is_ascii_uppercase()) {
        return Err(CoreError::InvalidHex(hex::FromHexError::InvalidHexCharacter {
            c,
            index,
        }));
    }
    decode_fixed(s)
}

/// Check that `s` is lowercase hex encoding exactly `len` bytes.
pub fn is_canonical_hex(s: &str, len: usize) -> bool {
    s.len() == len * 2 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Implement hex string (de)serialization and the usual hex helpers for a
/// newtype over `[u8; N]`.
macro_rules! hex_newtype {
    ($name:ident, $len:expr, $label:literal) => {
        impl $name {
            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Convert to lowercase hex.
            pub fn to_hex(&self) -> String {
                $crate::codec::encode(&self.0)
            }

            /// Parse from hex (either case).
            pub fn from_hex(s: &str) -> Result<Self, $crate::error::CoreError> {
                $crate::codec::decode_fixed::<$len>(s).map(Self)
            }

            /// Parse from lowercase hex only.
            pub fn from_hex_canonical(s: &str) -> Result<Self, $crate::error::CoreError> {
                $crate::codec::decode_canonical::<$len>(s).map(Self)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", $label, &self.to_hex()[..16])
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = $crate::error::CoreError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; $len] =
                    slice
                        .try_into()
                        .map_err(|_| $crate::error::CoreError::InvalidLength {
                            expected: $len,
                            got: slice.len(),
                        })?;
                Ok(Self(arr))
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
                $crate::codec::decode_canonical::<$len>(&s)
                    .map(Self)
                    .map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use hex_newtype;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fixed_accepts_both_cases() {
        let lower: [u8; 2] = decode_fixed("abcd").unwrap();
        let upper: [u8; 2] = decode_fixed("ABCD").unwrap();
        assert_eq!(lower, [0xab, 0xcd]);
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_decode_fixed_rejects_wrong_length() {
        let err = decode_fixed::<32>("abcd").unwrap_err();
        assert!(matches!(err, CoreError::InvalidLength { expected: 32, got: 2 }));
    }

    #[test]
    fn test_decode_canonical_rejects_uppercase() {
        assert!(decode_canonical::<2>("ABcd").is_err());
        assert!(decode_canonical::<2>("abcd").is_ok());
    }

    #[test]
    fn test_is_canonical_hex() {
        assert!(is_canonical_hex("00ff", 2));
        assert!(!is_canonical_hex("00FF", 2));
        assert!(!is_canonical_hex("00f", 2));
        assert!(!is_canonical_hex("zz00", 2));
    }
}
