//! Proptest generators for property-based testing.

use proptest::prelude::*;

use nostr_kernel_core::{
    Event, EventId, EventTemplate, Keypair, Kind, PublicKey, Rumor, Tag, Timestamp,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_filter_map("valid secret key", |seed| {
        Keypair::from_secret_bytes(&seed).ok()
    })
}

/// Generate a random EventId.
pub fn event_id() -> impl Strategy<Value = EventId> {
    any::<[u8; 32]>().prop_map(EventId)
}

/// Generate a valid public key.
pub fn public_key() -> impl Strategy<Value = PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = Timestamp> {
    0i64..=4_102_444_800i64
}

/// Generate a kind, biased toward the ones the kernel treats specially.
pub fn kind() -> impl Strategy<Value = Kind> {
    prop_oneof![
        Just(Kind::METADATA),
        Just(Kind::TEXT_NOTE),
        Just(Kind::ENCRYPTED_DIRECT_MESSAGE),
        Just(Kind::SEAL),
        Just(Kind::PRIVATE_DIRECT_MESSAGE),
        Just(Kind::GIFT_WRAP),
        any::<u16>().prop_map(Kind),
    ]
}

/// Arbitrary text, control characters and astral-plane characters included.
pub fn text(max_chars: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(any::<char>(), 0..=max_chars).prop_map(String::from_iter)
}

/// Generate a tag: a single-letter or short name followed by values.
pub fn tag() -> impl Strategy<Value = Tag> {
    (
        "[a-zA-Z][a-z_]{0,8}",
        prop::collection::vec(text(40), 0..4),
    )
        .prop_map(|(name, values)| {
            let mut parts = vec![name];
            parts.extend(values);
            Tag::new(parts)
        })
}

/// Parameters for generating an event.
#[derive(Debug, Clone)]
pub struct EventParams {
    pub keypair: Keypair,
    pub created_at: Timestamp,
    pub kind: Kind,
    pub tags: Vec<Tag>,
    pub content: String,
}

impl Arbitrary for EventParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            keypair(),
            timestamp(),
            kind(),
            prop::collection::vec(tag(), 0..6),
            text(300),
        )
            .prop_map(|(keypair, created_at, kind, tags, content)| EventParams {
                keypair,
                created_at,
                kind,
                tags,
                content,
            })
            .boxed()
    }
}

/// The unsigned event described by `params`.
pub fn rumor_from_params(params: &EventParams) -> Rumor {
    EventTemplate::new(params.kind, params.content.clone())
        .tags(params.tags.iter().cloned())
        .created_at(params.created_at)
        .to_unsigned(params.keypair.public_key())
}

/// Sign the event described by `params` deterministically.
pub fn event_from_params(params: &EventParams) -> Event {
    rumor_from_params(params)
        .sign_deterministic(&params.keypair)
        .expect("params keypair is the rumor author")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr_kernel_core::{canonicalize, commitment_json, validate_event, Filter};

    proptest! {
        #[test]
        fn test_event_id_deterministic(params: EventParams) {
            let r1 = rumor_from_params(&params);
            let r2 = rumor_from_params(&params);

            prop_assert_eq!(r1.id(), r2.id());
        }

        #[test]
        fn test_signed_events_verify(params: EventParams) {
            let event = event_from_params(&params);
            prop_assert!(validate_event(&event).is_ok());
        }

        #[test]
        fn test_wire_json_round_trips(params: EventParams) {
            let event = event_from_params(&params);
            let json = event.to_json();

            prop_assert!(serde_json::from_str::<serde_json::Value>(&json).is_ok());
            prop_assert_eq!(Event::from_json(&json).unwrap(), event);
        }

        #[test]
        fn test_canonicalize_is_idempotent(params: EventParams) {
            let rumor = rumor_from_params(&params);
            let canonical = commitment_json(
                rumor.pubkey(),
                rumor.created_at(),
                rumor.kind(),
                rumor.tags(),
                rumor.content(),
            );

            prop_assert_eq!(canonicalize(&canonical).unwrap(), canonical);
        }

        #[test]
        fn test_author_filter_matches_own_events(params: EventParams) {
            let event = event_from_params(&params);
            let filter = Filter::new()
                .author(params.keypair.public_key())
                .kind(params.kind)
                .since(params.created_at)
                .until(params.created_at);

            prop_assert!(filter.matches(&event));
        }

        #[test]
        fn test_event_id_changes_with_content(
            kp in keypair(),
            c1 in text(100),
            c2 in text(100),
        ) {
            prop_assume!(c1 != c2);

            let r1 = EventTemplate::new(Kind::TEXT_NOTE, c1).created_at(1000).to_unsigned(kp.public_key());
            let r2 = EventTemplate::new(Kind::TEXT_NOTE, c2).created_at(1000).to_unsigned(kp.public_key());

            prop_assert_ne!(r1.id(), r2.id());
        }
    }
}
