//! Strong type definitions for the Nostr kernel.
//!
//! Identifiers are newtypes so that an event id can never be passed where a
//! public key is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::hex_newtype;

/// A 32-byte event identifier: SHA-256 of the canonical commitment array.
///
/// Two events with the same `(pubkey, created_at, kind, tags, content)`
/// have the same EventId regardless of signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub [u8; 32]);

hex_newtype!(EventId, 32, "EventId");

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Seconds in one day.
pub const DAY_SECS: i64 = 24 * 60 * 60;

/// Current unix time in seconds.
pub fn unix_now() -> Timestamp {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Event kind: a protocol-defined category number.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kind(pub u16);

impl Kind {
    pub const METADATA: Kind = Kind(0);
    pub const TEXT_NOTE: Kind = Kind(1);
    pub const CONTACTS: Kind = Kind(3);
    pub const ENCRYPTED_DIRECT_MESSAGE: Kind = Kind(4);
    pub const DELETION: Kind = Kind(5);
    /// Sealed rumor.
    pub const SEAL: Kind = Kind(13);
    /// Private direct message carried inside a seal.
    pub const PRIVATE_DIRECT_MESSAGE: Kind = Kind(14);
    pub const GIFT_WRAP: Kind = Kind(1059);
    pub const CLIENT_AUTH: Kind = Kind(22242);

    /// Convert to u16 for serialization.
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Replaceable kinds keep only the latest event per author.
    pub fn is_replaceable(self) -> bool {
        matches!(self.0, 0 | 3 | 10_000..=19_999)
    }

    /// Ephemeral kinds are relayed but never stored.
    pub fn is_ephemeral(self) -> bool {
        (20_000..30_000).contains(&self.0)
    }

    /// Addressable kinds keep the latest event per author and `d` tag.
    pub fn is_addressable(self) -> bool {
        (30_000..40_000).contains(&self.0)
    }

    /// Anything not in one of the special ranges.
    pub fn is_regular(self) -> bool {
        !self.is_replaceable() && !self.is_ephemeral() && !self.is_addressable()
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kind({})", self.0)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Kind {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_hex_roundtrip() {
        let id = EventId::from_bytes([0x42; 32]);
        let hex = id.to_hex();
        let recovered = EventId::from_hex(&hex).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_event_id_debug() {
        let id = EventId::from_bytes([0xcd; 32]);
        let debug = format!("{:?}", id);
        assert_eq!(debug, "EventId(cdcdcdcdcdcdcdcd)");
    }

    #[test]
    fn test_event_id_serde_rejects_uppercase() {
        let upper = format!("\"{}\"", "AB".repeat(32));
        assert!(serde_json::from_str::<EventId>(&upper).is_err());

        let lower = format!("\"{}\"", "ab".repeat(32));
        let id: EventId = serde_json::from_str(&lower).unwrap();
        assert_eq!(id, EventId::from_bytes([0xab; 32]));
    }

    #[test]
    fn test_kind_categories() {
        assert!(Kind::METADATA.is_replaceable());
        assert!(Kind::CONTACTS.is_replaceable());
        assert!(Kind(10_002).is_replaceable());

        assert!(Kind(20_000).is_ephemeral());
        assert!(Kind(29_999).is_ephemeral());
        assert!(!Kind(30_000).is_ephemeral());
        assert!(Kind::CLIENT_AUTH.is_ephemeral());

        assert!(Kind(30_023).is_addressable());

        assert!(Kind::TEXT_NOTE.is_regular());
        assert!(Kind::SEAL.is_regular());
        assert!(Kind::GIFT_WRAP.is_regular());
    }
}
