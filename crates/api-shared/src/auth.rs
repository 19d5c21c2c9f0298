//! Caller identification shared by API layers.
//!
//! Two headers are recognised:
//! - `x-api-key`: checked against the key configured at startup, when one is configured.
//! - `x-actor-id`: the canonical id of the user performing a write. Handlers that record who did
//!   something require it.

use lis_uuid::EntityId;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing x-api-key header")]
    MissingApiKey,
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("missing x-actor-id header")]
    MissingActor,
    #[error("invalid x-actor-id header: {0}")]
    InvalidActor(String),
}

/// Validates the provided API key against the expected key.
///
/// An unset `expected` key disables the check.
///
/// # Errors
///
/// Returns [`AuthError::MissingApiKey`] or [`AuthError::InvalidApiKey`] when a key is expected
/// and the provided one is absent or different.
pub fn validate_api_key(provided: Option<&str>, expected: Option<&str>) -> Result<(), AuthError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match provided {
        None => Err(AuthError::MissingApiKey),
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(AuthError::InvalidApiKey),
    }
}

/// Parses the acting user's id from the `x-actor-id` header value.
///
/// # Errors
///
/// Returns [`AuthError::MissingActor`] when the header is absent or blank, and
/// [`AuthError::InvalidActor`] when it is not a canonical id.
pub fn parse_actor(value: Option<&str>) -> Result<EntityId, AuthError> {
    let value = value.map(str::trim).filter(|v| !v.is_empty());
    let Some(value) = value else {
        return Err(AuthError::MissingActor);
    };
    EntityId::parse(value).map_err(|e| AuthError::InvalidActor(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_check_is_optional() {
        assert_eq!(validate_api_key(None, None), Ok(()));
        assert_eq!(validate_api_key(Some("k"), Some("k")), Ok(()));
        assert_eq!(
            validate_api_key(None, Some("k")),
            Err(AuthError::MissingApiKey)
        );
        assert_eq!(
            validate_api_key(Some("x"), Some("k")),
            Err(AuthError::InvalidApiKey)
        );
    }

    #[test]
    fn actor_must_be_canonical() {
        let id = EntityId::new();
        assert_eq!(parse_actor(Some(&id.to_string())), Ok(id));
        assert_eq!(parse_actor(Some("  ")), Err(AuthError::MissingActor));
        assert!(matches!(
            parse_actor(Some("550E8400-E29B")),
            Err(AuthError::InvalidActor(_))
        ));
    }
}
