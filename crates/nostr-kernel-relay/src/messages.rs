//! Relay protocol frames.
//!
//! Every frame is a JSON array whose first element names the verb.
//! [`ClientCommand`] covers what a client sends, [`RelayMessage`] what a
//! relay answers.
//!
//! ```text
//! client → relay                        relay → client
//! ["EVENT", <event>]                    ["EVENT", <sub>, <event>]
//! ["REQ", <sub>, <filter>, ...]         ["OK", <event id>, <bool>, <message>]
//! ["CLOSE", <sub>]                      ["EOSE", <sub>]
//! ["AUTH", <signed event>]              ["CLOSED", <sub>, <message>]
//! ["COUNT", <sub>, <filter>, ...]       ["NOTICE", <message>]
//!                                       ["AUTH", <challenge>]
//!                                       ["COUNT", <sub>, {"count": <n>}]
//! ```

use serde_json::{Map, Value};

use nostr_kernel_core::{Event, EventId, Filter};

use crate::error::{RelayError, Result};

/// Subscription ids relays are required to accept.
pub const MAX_SUBSCRIPTION_ID_LEN: usize = 64;

/// A fresh random subscription id.
pub fn new_subscription_id() -> String {
    use rand::Rng;
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Client-to-relay commands.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// Publish a signed event.
    Event(Event),
    /// Open or replace a subscription.
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },
    /// Close a subscription.
    Close(String),
    /// Answer an AUTH challenge with a signed kind 22242 event.
    Auth(Event),
    /// Ask for the number of matching events.
    Count {
        subscription_id: String,
        filters: Vec<Filter>,
    },
}

/// Relay-to-client messages.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Event {
        subscription_id: String,
        event: Event,
    },
    Ok {
        event_id: EventId,
        accepted: bool,
        message: String,
    },
    Eose(String),
    Closed {
        subscription_id: String,
        message: String,
    },
    Notice(String),
    Auth(String),
    Count {
        subscription_id: String,
        count: u64,
        approximate: bool,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Framing helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Join already-encoded JSON values into an array.
fn frame<I>(parts: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut out = String::from("[");
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&part);
    }
    out.push(']');
    out
}

fn json_str(s: &str) -> String {
    Value::from(s).to_string()
}

fn invalid(msg: impl Into<String>) -> RelayError {
    RelayError::InvalidMessage(msg.into())
}

fn split(text: &str) -> Result<(String, Vec<Value>)> {
    let mut items: Vec<Value> = serde_json::from_str(text)?;
    if items.is_empty() {
        return Err(invalid("empty frame"));
    }
    let verb = match items.remove(0) {
        Value::String(verb) => verb,
        _ => return Err(invalid("frame verb must be a string")),
    };
    Ok((verb, items))
}

fn str_at<'a>(items: &'a [Value], index: usize, what: &str) -> Result<&'a str> {
    items
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("missing {}", what)))
}

fn event_at(items: &[Value], index: usize) -> Result<Event> {
    let value = items
        .get(index)
        .ok_or_else(|| invalid("missing event"))?;
    Ok(serde_json::from_value(value.clone())?)
}

/// Parse the filter slots starting at `from`, dropping the ones that are not
/// valid filters.
fn filters_from(items: &[Value], from: usize) -> Vec<Filter> {
    items
        .iter()
        .skip(from)
        .filter_map(|value| match Filter::from_value(value) {
            Ok(filter) => Some(filter),
            Err(err) => {
                tracing::trace!(%err, "skipping malformed filter");
                None
            }
        })
        .collect()
}

fn filter_frame(verb: &str, subscription_id: &str, filters: &[Filter]) -> String {
    frame(
        [json_str(verb), json_str(subscription_id)]
            .into_iter()
            .chain(filters.iter().map(|f| f.to_value().to_string())),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Client commands
// ─────────────────────────────────────────────────────────────────────────────

impl ClientCommand {
    pub fn req(subscription_id: impl Into<String>, filters: Vec<Filter>) -> Self {
        ClientCommand::Req {
            subscription_id: subscription_id.into(),
            filters,
        }
    }

    pub fn count(subscription_id: impl Into<String>, filters: Vec<Filter>) -> Self {
        ClientCommand::Count {
            subscription_id: subscription_id.into(),
            filters,
        }
    }

    /// The verb this command is framed with.
    pub fn verb(&self) -> &'static str {
        match self {
            ClientCommand::Event(_) => "EVENT",
            ClientCommand::Req { .. } => "REQ",
            ClientCommand::Close(_) => "CLOSE",
            ClientCommand::Auth(_) => "AUTH",
            ClientCommand::Count { .. } => "COUNT",
        }
    }

    /// Subscription this command addresses, if any.
    pub fn subscription_id(&self) -> Option<&str> {
        match self {
            ClientCommand::Req { subscription_id, .. }
            | ClientCommand::Count { subscription_id, .. } => Some(subscription_id),
            ClientCommand::Close(subscription_id) => Some(subscription_id),
            ClientCommand::Event(_) | ClientCommand::Auth(_) => None,
        }
    }

    /// Encode as a wire frame.
    pub fn to_json(&self) -> String {
        match self {
            ClientCommand::Event(event) => frame([json_str("EVENT"), event.to_json()]),
            ClientCommand::Req {
                subscription_id,
                filters,
            } => filter_frame("REQ", subscription_id, filters),
            ClientCommand::Close(subscription_id) => {
                frame([json_str("CLOSE"), json_str(subscription_id)])
            }
            ClientCommand::Auth(event) => frame([json_str("AUTH"), event.to_json()]),
            ClientCommand::Count {
                subscription_id,
                filters,
            } => filter_frame("COUNT", subscription_id, filters),
        }
    }

    /// Decode a wire frame.
    ///
    /// REQ and COUNT keep every filter slot that parses and drop the rest; a
    /// REQ with no usable filter is still a REQ.
    pub fn parse(text: &str) -> Result<Self> {
        let (verb, items) = split(text)?;
        match verb.as_str() {
            "EVENT" => Ok(ClientCommand::Event(event_at(&items, 0)?)),
            "REQ" => Ok(ClientCommand::Req {
                subscription_id: str_at(&items, 0, "subscription id")?.to_string(),
                filters: filters_from(&items, 1),
            }),
            "CLOSE" => Ok(ClientCommand::Close(
                str_at(&items, 0, "subscription id")?.to_string(),
            )),
            "AUTH" => Ok(ClientCommand::Auth(event_at(&items, 0)?)),
            "COUNT" => Ok(ClientCommand::Count {
                subscription_id: str_at(&items, 0, "subscription id")?.to_string(),
                filters: filters_from(&items, 1),
            }),
            other => Err(invalid(format!("unknown command {}", other))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay messages
// ─────────────────────────────────────────────────────────────────────────────

impl RelayMessage {
    /// Encode as a wire frame.
    pub fn to_json(&self) -> String {
        match self {
            RelayMessage::Event {
                subscription_id,
                event,
            } => frame([json_str("EVENT"), json_str(subscription_id), event.to_json()]),
            RelayMessage::Ok {
                event_id,
                accepted,
                message,
            } => frame([
                json_str("OK"),
                json_str(&event_id.to_hex()),
                accepted.to_string(),
                json_str(message),
            ]),
            RelayMessage::Eose(subscription_id) => {
                frame([json_str("EOSE"), json_str(subscription_id)])
            }
            RelayMessage::Closed {
                subscription_id,
                message,
            } => frame([json_str("CLOSED"), json_str(subscription_id), json_str(message)]),
            RelayMessage::Notice(message) => frame([json_str("NOTICE"), json_str(message)]),
            RelayMessage::Auth(challenge) => frame([json_str("AUTH"), json_str(challenge)]),
            RelayMessage::Count {
                subscription_id,
                count,
                approximate,
            } => {
                let mut body = Map::new();
                body.insert("count".into(), Value::from(*count));
                if *approximate {
                    body.insert("approximate".into(), Value::Bool(true));
                }
                frame([
                    json_str("COUNT"),
                    json_str(subscription_id),
                    Value::Object(body).to_string(),
                ])
            }
        }
    }

    /// Decode a wire frame.
    pub fn parse(text: &str) -> Result<Self> {
        let (verb, items) = split(text)?;
        match verb.as_str() {
            "EVENT" => Ok(RelayMessage::Event {
                subscription_id: str_at(&items, 0, "subscription id")?.to_string(),
                event: event_at(&items, 1)?,
            }),
            "OK" => {
                let event_id = EventId::from_hex(str_at(&items, 0, "event id")?)
                    .map_err(|e| invalid(format!("bad event id: {}", e)))?;
                let accepted = items
                    .get(1)
                    .and_then(Value::as_bool)
                    .ok_or_else(|| invalid("missing accepted flag"))?;
                let message = items
                    .get(2)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(RelayMessage::Ok {
                    event_id,
                    accepted,
                    message,
                })
            }
            "EOSE" => Ok(RelayMessage::Eose(
                str_at(&items, 0, "subscription id")?.to_string(),
            )),
            "CLOSED" => Ok(RelayMessage::Closed {
                subscription_id: str_at(&items, 0, "subscription id")?.to_string(),
                message: items
                    .get(1)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            "NOTICE" => Ok(RelayMessage::Notice(
                str_at(&items, 0, "message")?.to_string(),
            )),
            "AUTH" => Ok(RelayMessage::Auth(str_at(&items, 0, "challenge")?.to_string())),
            "COUNT" => {
                let subscription_id = str_at(&items, 0, "subscription id")?.to_string();
                let body = items
                    .get(1)
                    .and_then(Value::as_object)
                    .ok_or_else(|| invalid("missing count body"))?;
                let count = body
                    .get("count")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| invalid("missing count"))?;
                let approximate = body
                    .get("approximate")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Ok(RelayMessage::Count {
                    subscription_id,
                    count,
                    approximate,
                })
            }
            other => Err(invalid(format!("unknown message {}", other))),
        }
    }

    /// Subscription this message belongs to, if any.
    pub fn subscription_id(&self) -> Option<&str> {
        match self {
            RelayMessage::Event {
                subscription_id, ..
            }
            | RelayMessage::Closed {
                subscription_id, ..
            }
            | RelayMessage::Count {
                subscription_id, ..
            } => Some(subscription_id),
            RelayMessage::Eose(subscription_id) => Some(subscription_id),
            RelayMessage::Ok { .. } | RelayMessage::Notice(_) | RelayMessage::Auth(_) => None,
        }
    }
}
