//! Canonical JSON serialization of the event commitment.
//!
//! The event id is the SHA-256 of
//! `[0,<pubkey hex>,<created_at>,<kind>,<tags>,<content>]` encoded as:
//! - no insignificant whitespace
//! - fixed array shape (no object keys, so no ordering question)
//! - only `"`, `\`, `\b`, `\f`, `\n`, `\r`, `\t` and other control
//!   characters below 0x20 are escaped, the latter as `\u00xx`
//! - every other code point emitted as raw UTF-8
//!
//! Byte-level determinism is load-bearing: any deviation yields a different
//! id and the event is rejected by every other client and relay.

use std::fmt::Write;

use crate::codec;
use crate::crypto::{PublicKey, Sha256Hash};
use crate::error::CoreError;
use crate::event::Tag;
use crate::types::{EventId, Kind, Timestamp};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Build the canonical commitment string for an event.
pub fn commitment_json(
    pubkey: &PublicKey,
    created_at: Timestamp,
    kind: Kind,
    tags: &[Tag],
    content: &str,
) -> String {
    let mut out = String::with_capacity(96 + content.len() + tags.len() * 80);
    out.push_str("[0,\"");
    out.push_str(&pubkey.to_hex());
    out.push_str("\",");
    // Writing into a String cannot fail.
    let _ = write!(out, "{},{},", created_at, kind.as_u16());
    write_tags(&mut out, tags);
    out.push(',');
    escape_json_string_into(&mut out, content);
    out.push(']');
    out
}

/// Compute the event id from its committed fields.
pub fn compute_event_id(
    pubkey: &PublicKey,
    created_at: Timestamp,
    kind: Kind,
    tags: &[Tag],
    content: &str,
) -> EventId {
    let json = commitment_json(pubkey, created_at, kind, tags, content);
    EventId(Sha256Hash::hash(json.as_bytes()).0)
}

/// Re-serialize a commitment array canonically.
///
/// Accepts any valid JSON rendering of `[0,pubkey,created_at,kind,tags,content]`
/// (extra whitespace, `\u` escapes) and returns the canonical form. Applying it
/// to its own output is a no-op.
pub fn canonicalize(json: &str) -> Result<String, CoreError> {
    let (zero, pubkey, created_at, kind, tags, content): (
        u8,
        String,
        Timestamp,
        u16,
        Vec<Vec<String>>,
        String,
    ) = serde_json::from_str(json)?;

    if zero != 0 {
        return Err(CoreError::MalformedEvent(format!(
            "commitment must start with 0, got {}",
            zero
        )));
    }

    let pubkey = PublicKey(codec::decode_canonical::<32>(&pubkey)?);
    let tags: Vec<Tag> = tags.into_iter().map(Tag::new).collect();

    Ok(commitment_json(&pubkey, created_at, Kind(kind), &tags, &content))
}

/// Append the tags array.
pub(crate) fn write_tags(out: &mut String, tags: &[Tag]) {
    out.push('[');
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('[');
        for (j, value) in tag.as_slice().iter().enumerate() {
            if j > 0 {
                out.push(',');
            }
            escape_json_string_into(out, value);
        }
        out.push(']');
    }
    out.push(']');
}

/// Append `s` as a quoted JSON string using the canonical escaping rules.
pub fn escape_json_string_into(out: &mut String, s: &str) {
    out.push('"');
    let mut start = 0;
    for (i, byte) in s.bytes().enumerate() {
        let escape: Option<&str> = match byte {
            b'"' => Some("\\\""),
            b'\\' => Some("\\\\"),
            0x08 => Some("\\b"),
            0x0c => Some("\\f"),
            b'\n' => Some("\\n"),
            b'\r' => Some("\\r"),
            b'\t' => Some("\\t"),
            0x00..=0x1f => None,
            _ => continue,
        };

        // Control bytes are ASCII, so `i` is always a char boundary.
        out.push_str(&s[start..i]);
        match escape {
            Some(seq) => out.push_str(seq),
            None => {
                out.push_str("\\u00");
                out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
                out.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
            }
        }
        start = i + 1;
    }
    out.push_str(&s[start..]);
    out.push('"');
}
