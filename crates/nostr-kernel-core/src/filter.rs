//! Relay subscription filters.
//!
//! A filter is a conjunction of optional constraints. Present list fields
//! match when the event's value is one of the listed values; tag constraints
//! use single-letter names and serialize as `#e`, `#p` and so on.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::crypto::PublicKey;
use crate::error::CoreError;
use crate::event::Event;
use crate::types::{EventId, Kind, Timestamp};

/// A subscription filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub ids: Option<Vec<EventId>>,
    pub authors: Option<Vec<PublicKey>>,
    pub kinds: Option<Vec<Kind>>,
    /// Single-letter tag name to accepted values.
    pub tags: BTreeMap<char, Vec<String>>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
    pub limit: Option<usize>,
    pub search: Option<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = EventId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn id(self, id: EventId) -> Self {
        self.ids([id])
    }

    pub fn authors(mut self, authors: impl IntoIterator<Item = PublicKey>) -> Self {
        self.authors = Some(authors.into_iter().collect());
        self
    }

    pub fn author(self, author: PublicKey) -> Self {
        self.authors([author])
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = Kind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn kind(self, kind: Kind) -> Self {
        self.kinds([kind])
    }

    /// Add accepted values for the single-letter tag `name`.
    pub fn tag<S: Into<String>>(mut self, name: char, values: impl IntoIterator<Item = S>) -> Self {
        self.tags
            .entry(name)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Events that `p`-tag `pubkey`.
    pub fn pubkey_tag(self, pubkey: &PublicKey) -> Self {
        self.tag('p', [pubkey.to_hex()])
    }

    /// Events that `e`-tag `id`.
    pub fn event_tag(self, id: &EventId) -> Self {
        self.tag('e', [id.to_hex()])
    }

    pub fn since(mut self, since: Timestamp) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: Timestamp) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// True when no constraint is set.
    pub fn is_empty(&self) -> bool {
        self.ids.is_none()
            && self.authors.is_none()
            && self.kinds.is_none()
            && self.tags.is_empty()
            && self.since.is_none()
            && self.until.is_none()
            && self.limit.is_none()
            && self.search.is_none()
    }

    /// Check an event against every present constraint.
    ///
    /// `limit` does not affect matching.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(event.id()) {
                return false;
            }
        }
        if let Some(authors) = &self.authors {
            if !authors.contains(event.pubkey()) {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind()) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.created_at() < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.created_at() > until {
                return false;
            }
        }

        for (name, values) in &self.tags {
            let mut buf = [0u8; 4];
            let name: &str = name.encode_utf8(&mut buf);
            let hit = event.tags().iter().any(|tag| {
                tag.name() == Some(name)
                    && tag.value().map_or(false, |v| values.iter().any(|x| x == v))
            });
            if !hit {
                return false;
            }
        }

        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !event.content().to_lowercase().contains(&needle) {
                return false;
            }
        }

        true
    }

    /// Render the relay wire object.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(ids) = &self.ids {
            map.insert(
                "ids".into(),
                Value::Array(ids.iter().map(|id| Value::String(id.to_hex())).collect()),
            );
        }
        if let Some(authors) = &self.authors {
            map.insert(
                "authors".into(),
                Value::Array(authors.iter().map(|pk| Value::String(pk.to_hex())).collect()),
            );
        }
        if let Some(kinds) = &self.kinds {
            map.insert(
                "kinds".into(),
                Value::Array(kinds.iter().map(|k| Value::from(k.as_u16())).collect()),
            );
        }
        for (name, values) in &self.tags {
            map.insert(
                format!("#{}", name),
                Value::Array(values.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(since) = self.since {
            map.insert("since".into(), Value::from(since));
        }
        if let Some(until) = self.until {
            map.insert("until".into(), Value::from(until));
        }
        if let Some(limit) = self.limit {
            map.insert("limit".into(), Value::from(limit));
        }
        if let Some(search) = &self.search {
            map.insert("search".into(), Value::String(search.clone()));
        }
        Value::Object(map)
    }

    /// Parse the relay wire object. Unknown keys are ignored.
    pub fn from_value(value: &Value) -> Result<Self, CoreError> {
        let map = value
            .as_object()
            .ok_or_else(|| malformed("filter must be an object"))?;

        let mut filter = Filter::new();
        for (key, value) in map {
            match key.as_str() {
                "ids" => {
                    filter.ids = Some(
                        strings(value, key)?
                            .map(EventId::from_hex_canonical)
                            .collect::<Result<_, _>>()?,
                    )
                }
                "authors" => {
                    filter.authors = Some(
                        strings(value, key)?
                            .map(PublicKey::from_hex_canonical)
                            .collect::<Result<_, _>>()?,
                    )
                }
                "kinds" => {
                    let kinds = value
                        .as_array()
                        .ok_or_else(|| malformed("kinds must be an array"))?
                        .iter()
                        .map(|k| {
                            k.as_u64()
                                .and_then(|k| u16::try_from(k).ok())
                                .map(Kind)
                                .ok_or_else(|| malformed("kind out of range"))
                        })
                        .collect::<Result<_, _>>()?;
                    filter.kinds = Some(kinds);
                }
                "since" => filter.since = Some(integer(value, key)?),
                "until" => filter.until = Some(integer(value, key)?),
                "limit" => {
                    let limit = value
                        .as_u64()
                        .ok_or_else(|| malformed("limit must be a non-negative integer"))?;
                    filter.limit = Some(limit as usize);
                }
                "search" => {
                    filter.search = Some(
                        value
                            .as_str()
                            .ok_or_else(|| malformed("search must be a string"))?
                            .to_string(),
                    )
                }
                other => {
                    let mut chars = other.chars();
                    if let (Some('#'), Some(name), None) = (chars.next(), chars.next(), chars.next())
                    {
                        let values: Vec<String> = strings(value, key)?.map(str::to_string).collect();
                        filter.tags.entry(name).or_default().extend(values);
                    }
                }
            }
        }
        Ok(filter)
    }
}

fn malformed(msg: &str) -> CoreError {
    CoreError::MalformedEvent(format!("invalid filter: {}", msg))
}

fn strings<'a>(
    value: &'a Value,
    key: &str,
) -> Result<impl Iterator<Item = &'a str>, CoreError> {
    let array = value
        .as_array()
        .ok_or_else(|| malformed(&format!("{} must be an array", key)))?;
    if array.iter().any(|v| !v.is_string()) {
        return Err(malformed(&format!("{} must contain strings", key)));
    }
    Ok(array.iter().filter_map(Value::as_str))
}

fn integer(value: &Value, key: &str) -> Result<Timestamp, CoreError> {
    value
        .as_i64()
        .ok_or_else(|| malformed(&format!("{} must be an integer", key)))
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Filter::from_value(&value).map_err(serde::de::Error::custom)
    }
}
