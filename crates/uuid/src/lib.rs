//! Entity identifiers and sharded-path utilities.
//!
//! Every LIS document (patient, test, order, sample, result, report, user) is keyed by a UUID.
//! To keep storage paths and API identifiers deterministic, LIS uses a *canonical* UUID
//! representation: **32 lowercase hexadecimal characters** (no hyphens).
//!
//! This crate provides:
//! - [`EntityId`], a wrapper that *guarantees* the canonical format once constructed.
//! - Sharding logic to derive a document's on-disk location from its identifier.
//! - [`human_reference`], the short date-stamped references printed on orders, samples and
//!   reports (`ORD-20260111-550E84`).
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Non-canonical values (uppercase, hyphenated, wrong length, non-hex) are rejected by
//! [`EntityId::parse`].
//!
//! ## Sharded layout
//! For a canonical UUID `u`, a document lives at:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>.<ext>`
//!
//! Example:
//! `lab_data/samples/55/0e/550e8400e29b41d4a716446655440000.yaml`

mod entity_id;

pub use entity_id::{human_reference, EntityId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
