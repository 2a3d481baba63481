//! Event validation: id recomputation and signature verification.

use crate::error::ValidationError;
use crate::event::{Event, Rumor};

/// Fully validate a signed event.
///
/// This performs:
/// - Id recomputation from the canonical commitment
/// - Public key curve check
/// - BIP-340 signature verification over the id
pub fn validate_event(event: &Event) -> Result<(), ValidationError> {
    // 1. Id must be the hash of the fields
    let computed = event.compute_id();
    if computed != *event.id() {
        return Err(ValidationError::IdMismatch {
            claimed: *event.id(),
            computed,
        });
    }

    // 2. Signature over the id
    let valid = event.pubkey().verify(event.id().as_bytes(), event.sig())?;
    if !valid {
        return Err(ValidationError::SignatureFailed);
    }

    Ok(())
}

/// Parse an event from JSON without checking id or signature.
///
/// Every structural rule is enforced by the parser: lowercase hex of the
/// right width for `id`, `pubkey` and `sig`, integer `created_at` and `kind`,
/// and tags as arrays of strings.
pub fn validate_event_structure(json: &str) -> Result<Event, ValidationError> {
    Event::from_json(json).map_err(|e| ValidationError::StructuralError(e.to_string()))
}

/// Parse and fully validate an event received from outside.
pub fn parse_and_validate(json: &str) -> Result<Event, ValidationError> {
    let event = validate_event_structure(json)?;
    validate_event(&event)?;
    Ok(event)
}

/// Check a rumor's id against its fields.
pub fn validate_rumor(rumor: &Rumor) -> Result<(), ValidationError> {
    let computed = crate::canonical::compute_event_id(
        rumor.pubkey(),
        rumor.created_at(),
        rumor.kind(),
        rumor.tags(),
        rumor.content(),
    );
    if computed != *rumor.id() {
        return Err(ValidationError::IdMismatch {
            claimed: *rumor.id(),
            computed,
        });
    }
    Ok(())
}

impl Event {
    /// Shorthand for [`validate_event`].
    pub fn verify(&self) -> Result<(), ValidationError> {
        validate_event(self)
    }
}
