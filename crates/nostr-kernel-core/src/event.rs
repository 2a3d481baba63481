//! The event model: tags, signed events, unsigned rumors and templates.
//!
//! Events are immutable once constructed. The only way to obtain a signed
//! [`Event`] is to sign a [`Rumor`] (or to parse one from JSON), and the only
//! way to obtain a [`Rumor`] is from an [`EventTemplate`] plus the author's
//! public key, or by stripping the signature off an existing event.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

use crate::canonical::{compute_event_id, escape_json_string_into, write_tags};
use crate::crypto::{Keypair, PublicKey, Signature};
use crate::error::CoreError;
use crate::types::{unix_now, EventId, Kind, Timestamp};

/// A single tag: an ordered list of strings whose first element is the name.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(Vec<String>);

impl Tag {
    /// Create a tag from its elements.
    pub fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    /// Create a tag from anything string-like.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// `["p", <pubkey hex>]`
    pub fn pubkey(pubkey: &PublicKey) -> Self {
        Self(vec!["p".into(), pubkey.to_hex()])
    }

    /// `["e", <event id hex>]`
    pub fn event(id: &EventId) -> Self {
        Self(vec!["e".into(), id.to_hex()])
    }

    /// `["expiration", <unix seconds>]`
    pub fn expiration(at: Timestamp) -> Self {
        Self(vec!["expiration".into(), at.to_string()])
    }

    /// The tag name (first element), if any.
    pub fn name(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// The tag value (second element), if any.
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }

    /// Single-letter tags are the ones relays index for `#x` filters.
    pub fn is_indexable(&self) -> bool {
        matches!(self.name(), Some(name) if name.chars().count() == 1)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:?})", self.0)
    }
}

fn first_value<'a>(tags: &'a [Tag], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|t| t.name() == Some(name))
        .and_then(Tag::value)
}

fn expiration_of(tags: &[Tag]) -> Option<Timestamp> {
    first_value(tags, "expiration").and_then(|v| v.trim().parse().ok())
}

fn tagged_pubkeys_of(tags: &[Tag]) -> Vec<PublicKey> {
    tags.iter()
        .filter(|t| t.name() == Some("p"))
        .filter_map(|t| t.value())
        .filter_map(|v| PublicKey::from_hex(v).ok())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Signed events
// ─────────────────────────────────────────────────────────────────────────────

/// A signed event.
///
/// Construction does not verify anything; call
/// [`validate_event`](crate::validation::validate_event) on events received
/// from outside.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    pubkey: PublicKey,
    created_at: Timestamp,
    kind: Kind,
    tags: Vec<Tag>,
    content: String,
    sig: Signature,
}

impl Event {
    /// Assemble an event from stored parts without checking id or signature.
    pub fn from_parts_unchecked(
        id: EventId,
        pubkey: PublicKey,
        created_at: Timestamp,
        kind: Kind,
        tags: Vec<Tag>,
        content: String,
        sig: Signature,
    ) -> Self {
        Self {
            id,
            pubkey,
            created_at,
            kind,
            tags,
            content,
            sig,
        }
    }

    /// Parse an event from JSON. Field order does not matter and unknown
    /// fields are ignored. Hex fields must be lowercase.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to the wire JSON object.
    pub fn to_json(&self) -> String {
        let mut out = String::with_capacity(320 + self.content.len());
        out.push_str("{\"id\":\"");
        out.push_str(&self.id.to_hex());
        out.push_str("\",\"pubkey\":\"");
        out.push_str(&self.pubkey.to_hex());
        let _ = write!(
            out,
            "\",\"created_at\":{},\"kind\":{},\"tags\":",
            self.created_at,
            self.kind.as_u16()
        );
        write_tags(&mut out, &self.tags);
        out.push_str(",\"content\":");
        escape_json_string_into(&mut out, &self.content);
        out.push_str(",\"sig\":\"");
        out.push_str(&self.sig.to_hex());
        out.push_str("\"}");
        out
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn pubkey(&self) -> &PublicKey {
        &self.pubkey
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn sig(&self) -> &Signature {
        &self.sig
    }

    /// Recompute the id from the committed fields.
    pub fn compute_id(&self) -> EventId {
        compute_event_id(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )
    }

    /// Same header and signature with the content dropped.
    ///
    /// The result no longer hashes to its id; it exists for caching headers
    /// of events whose encrypted payload should not be kept.
    pub fn copy_without_content(&self) -> Self {
        Self {
            content: String::new(),
            ..self.clone()
        }
    }

    /// Value of the first tag named `name`.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        first_value(&self.tags, name)
    }

    /// Value of the `d` tag used by addressable events.
    pub fn d_tag(&self) -> Option<&str> {
        self.first_value("d")
    }

    /// Parsed `expiration` tag.
    pub fn expiration(&self) -> Option<Timestamp> {
        expiration_of(&self.tags)
    }

    /// True when the event carries an expiration at or before `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        matches!(self.expiration(), Some(at) if at <= now)
    }

    /// Public keys named in `p` tags, skipping malformed ones.
    pub fn tagged_pubkeys(&self) -> Vec<PublicKey> {
        tagged_pubkeys_of(&self.tags)
    }

    /// Strip the signature.
    pub fn into_rumor(self) -> Rumor {
        Rumor {
            id: self.id,
            pubkey: self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("pubkey", &self.pubkey)
            .field("created_at", &self.created_at)
            .field("kind", &self.kind)
            .field("tags", &self.tags.len())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rumors
// ─────────────────────────────────────────────────────────────────────────────

/// An unsigned event.
///
/// The id is still the canonical hash of the fields, so a rumor is
/// content-addressed but not authenticated. Rumors are the plaintext inside a
/// seal and the input to signing.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Rumor {
    id: EventId,
    pubkey: PublicKey,
    created_at: Timestamp,
    kind: Kind,
    tags: Vec<Tag>,
    content: String,
}

#[derive(Deserialize)]
struct RumorWire {
    #[serde(default)]
    id: Option<EventId>,
    pubkey: PublicKey,
    created_at: Timestamp,
    kind: Kind,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    content: String,
}

impl Rumor {
    /// Create a rumor, computing its id.
    pub fn new(
        pubkey: PublicKey,
        created_at: Timestamp,
        kind: Kind,
        tags: Vec<Tag>,
        content: String,
    ) -> Self {
        let id = compute_event_id(&pubkey, created_at, kind, &tags, &content);
        Self {
            id,
            pubkey,
            created_at,
            kind,
            tags,
            content,
        }
    }

    /// Strip the signature from an event.
    pub fn from_event(event: &Event) -> Self {
        event.clone().into_rumor()
    }

    /// Parse a rumor. A missing id is computed; a present id must match.
    /// Any `sig` field is ignored.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize without a `sig` field.
    pub fn to_json(&self) -> String {
        let mut out = String::with_capacity(200 + self.content.len());
        out.push_str("{\"id\":\"");
        out.push_str(&self.id.to_hex());
        out.push_str("\",\"pubkey\":\"");
        out.push_str(&self.pubkey.to_hex());
        let _ = write!(
            out,
            "\",\"created_at\":{},\"kind\":{},\"tags\":",
            self.created_at,
            self.kind.as_u16()
        );
        write_tags(&mut out, &self.tags);
        out.push_str(",\"content\":");
        escape_json_string_into(&mut out, &self.content);
        out.push('}');
        out
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn pubkey(&self) -> &PublicKey {
        &self.pubkey
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn first_value(&self, name: &str) -> Option<&str> {
        first_value(&self.tags, name)
    }

    pub fn expiration(&self) -> Option<Timestamp> {
        expiration_of(&self.tags)
    }

    pub fn tagged_pubkeys(&self) -> Vec<PublicKey> {
        tagged_pubkeys_of(&self.tags)
    }

    /// A template that reproduces this rumor when bound to the same author.
    pub fn to_template(&self) -> EventTemplate {
        EventTemplate::new(self.kind, self.content.clone())
            .tags(self.tags.iter().cloned())
            .created_at(self.created_at)
    }

    /// Attach a signature produced elsewhere (e.g. a remote signer).
    ///
    /// The signature is not checked here.
    pub fn with_signature(self, sig: Signature) -> Event {
        Event {
            id: self.id,
            pubkey: self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig,
        }
    }

    /// Sign with fresh auxiliary randomness.
    pub fn sign(self, keypair: &Keypair) -> Result<Event, CoreError> {
        self.check_author(keypair)?;
        let sig = keypair.sign(self.id.as_bytes())?;
        Ok(self.with_signature(sig))
    }

    /// Sign with all-zero auxiliary randomness.
    pub fn sign_deterministic(self, keypair: &Keypair) -> Result<Event, CoreError> {
        self.check_author(keypair)?;
        let sig = keypair.sign_deterministic(self.id.as_bytes())?;
        Ok(self.with_signature(sig))
    }

    fn check_author(&self, keypair: &Keypair) -> Result<(), CoreError> {
        if keypair.public_key() != self.pubkey {
            return Err(CoreError::MalformedEvent(
                "signing key does not match event pubkey".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Rumor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rumor")
            .field("id", &self.id)
            .field("pubkey", &self.pubkey)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<'de> Deserialize<'de> for Rumor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = RumorWire::deserialize(deserializer)?;
        let rumor = Rumor::new(
            wire.pubkey,
            wire.created_at,
            wire.kind,
            wire.tags,
            wire.content,
        );
        match wire.id {
            Some(claimed) if claimed != rumor.id => Err(serde::de::Error::custom(format!(
                "rumor id {} does not match computed {}",
                claimed, rumor.id
            ))),
            _ => Ok(rumor),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Templates
// ─────────────────────────────────────────────────────────────────────────────

/// Everything an author decides before signing: kind, content, tags and
/// optionally the timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTemplate {
    kind: Kind,
    content: String,
    tags: Vec<Tag>,
    created_at: Option<Timestamp>,
}

impl EventTemplate {
    /// Start a template.
    pub fn new(kind: Kind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            tags: Vec::new(),
            created_at: None,
        }
    }

    /// Append a tag.
    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Append several tags.
    pub fn tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Fix the timestamp instead of using the current time.
    pub fn created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Bind the template to an author, producing the unsigned event.
    pub fn to_unsigned(&self, pubkey: PublicKey) -> Rumor {
        Rumor::new(
            pubkey,
            self.created_at.unwrap_or_else(unix_now),
            self.kind,
            self.tags.clone(),
            self.content.clone(),
        )
    }
}
