//! # Nostr Kernel Testkit
//!
//! Testing utilities for the Nostr kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Real relay events, BIP-340 and NIP-44 reference values
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up test scenarios
//!
//! ## Golden Vectors
//!
//! Golden vectors pin hashing, signing and encryption to what other Nostr
//! implementations produce:
//!
//! ```rust
//! use nostr_kernel_testkit::vectors::{all_vectors, compute_vector_id};
//!
//! for vector in all_vectors() {
//!     let id = compute_vector_id(&vector).unwrap();
//!     assert_eq!(id, vector.expected_id, "{}", vector.name);
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use nostr_kernel_testkit::generators::{event_from_params, EventParams};
//!
//! proptest! {
//!     #[test]
//!     fn signed_events_verify(params: EventParams) {
//!         let event = event_from_params(&params);
//!         prop_assert!(event.verify().is_ok());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust
//! use nostr_kernel_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let note = fixture.make_note("hello");
//! assert!(note.verify().is_ok());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_fixtures, TestFixture};
pub use generators::{event_from_params, rumor_from_params, EventParams};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
