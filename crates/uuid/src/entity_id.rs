//! Canonical entity identifier implementation.

use crate::{UuidError, UuidResult};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// LIS's canonical document identifier (32 lowercase hex characters, no hyphens).
///
/// Once constructed, the contained UUID is known to be valid, so callers never re-validate
/// identifiers that have already crossed the API boundary.
///
/// # Construction
/// - [`EntityId::new`] generates a fresh identifier for a new document.
/// - [`EntityId::parse`] validates an externally supplied identifier.
///
/// # Display format
/// Always the canonical 32-character lowercase hex form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(Uuid);

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityId {
    /// Generates a new random (v4) identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The all-zero identifier, recorded as the actor of unattended jobs such as the expiry sweep.
    pub const fn system() -> Self {
        Self(Uuid::nil())
    }

    /// Validates and parses an identifier that must already be in canonical form.
    ///
    /// Hyphenated or uppercase UUIDs are **not** normalised; callers must send the canonical
    /// representation.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not canonical.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "identifier must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("invalid identifier '{}': {}", input, e)))
    }

    /// Returns the underlying `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is exactly 32 lowercase hex characters.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<uuid>.<ext>`.
    ///
    /// `s1` is the first two hex characters and `s2` the next two.
    pub fn sharded_path(&self, parent_dir: &Path, ext: &str) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir
            .join(s1)
            .join(s2)
            .join(format!("{}.{}", canonical, ext))
    }

    /// First six hex characters, uppercased. Used in human-readable references.
    pub fn short_code(&self) -> String {
        self.0.simple().to_string()[..6].to_ascii_uppercase()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for EntityId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityId::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EntityId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Builds a human-readable reference: `<PREFIX>-<YYYYMMDD>-<SHORT>`.
///
/// The date component comes from `at` and the suffix from the document's identifier, so the
/// reference is stable for the lifetime of the document.
pub fn human_reference(prefix: &str, at: DateTime<Utc>, id: &EntityId) -> String {
    format!("{}-{}-{}", prefix, at.format("%Y%m%d"), id.short_code())
}
