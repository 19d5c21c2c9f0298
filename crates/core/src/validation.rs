//! Input validation utilities.
//!
//! Field-level checks applied by services before any document is written.

use crate::constants::MAX_TEST_CODE_LEN;
use crate::{LisError, LisResult};
use lis_types::NonEmptyText;

/// Validates and normalises a catalog test code.
///
/// Codes are trimmed and uppercased. They must be non-empty, at most
/// [`MAX_TEST_CODE_LEN`] characters and contain only ASCII alphanumerics, `-` or `_`.
///
/// # Errors
///
/// Returns [`LisError::InvalidInput`] describing the first rule that fails.
pub fn normalize_test_code(code: &str) -> LisResult<String> {
    let code = code.trim().to_ascii_uppercase();

    if code.is_empty() {
        return Err(LisError::InvalidInput("test code cannot be empty".into()));
    }

    if code.len() > MAX_TEST_CODE_LEN {
        return Err(LisError::InvalidInput(format!(
            "test code exceeds maximum length of {MAX_TEST_CODE_LEN} characters"
        )));
    }

    let ok = code
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'Z' | b'-' | b'_'));
    if !ok {
        return Err(LisError::InvalidInput(
            "test code contains invalid characters (only alphanumeric, '-', '_' allowed)".into(),
        ));
    }

    Ok(code)
}

/// Validates a supplied medical record number.
///
/// MRNs are trimmed and uppercased and use the same character set as test codes, up to 64
/// characters.
pub fn normalize_mrn(mrn: &str) -> LisResult<String> {
    const MAX_MRN_LEN: usize = 64;

    let mrn = mrn.trim().to_ascii_uppercase();
    if mrn.is_empty() {
        return Err(LisError::InvalidInput("mrn cannot be empty".into()));
    }
    if mrn.len() > MAX_MRN_LEN {
        return Err(LisError::InvalidInput(format!(
            "mrn exceeds maximum length of {MAX_MRN_LEN} characters"
        )));
    }
    if !mrn
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'Z' | b'-' | b'_'))
    {
        return Err(LisError::InvalidInput(
            "mrn contains invalid characters (only alphanumeric, '-', '_' allowed)".into(),
        ));
    }
    Ok(mrn)
}

/// Requires a non-blank value and returns it trimmed.
pub fn required_text(field: &str, value: &str) -> LisResult<String> {
    NonEmptyText::new(value)
        .map(NonEmptyText::into_inner)
        .map_err(|_| LisError::InvalidInput(format!("{field} cannot be empty")))
}

/// Trims an optional value, mapping blank input to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Rejects negative or non-finite money amounts.
pub fn validate_amount(field: &str, amount: f64) -> LisResult<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(LisError::InvalidInput(format!(
            "{field} must be a non-negative amount, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_uppercased() {
        assert_eq!(normalize_test_code(" cbc-1 ").expect("valid code"), "CBC-1");
    }

    #[test]
    fn test_code_rules() {
        assert!(normalize_test_code("").is_err());
        assert!(normalize_test_code("A B").is_err());
        assert!(normalize_test_code(&"X".repeat(MAX_TEST_CODE_LEN + 1)).is_err());
        assert!(normalize_test_code(&"X".repeat(MAX_TEST_CODE_LEN)).is_ok());
    }

    #[test]
    fn mrn_rules() {
        assert_eq!(normalize_mrn("mrn_42").expect("valid mrn"), "MRN_42");
        assert!(normalize_mrn("  ").is_err());
        assert!(normalize_mrn("MRN/42").is_err());
    }

    #[test]
    fn required_text_trims() {
        assert_eq!(required_text("name", "  Ada ").expect("non-empty"), "Ada");
        assert!(required_text("name", " ").is_err());
        assert_eq!(optional_text(Some("  ".into())), None);
    }

    #[test]
    fn amounts_must_be_non_negative() {
        assert!(validate_amount("discount", -0.01).is_err());
        assert!(validate_amount("discount", f64::INFINITY).is_err());
        assert!(validate_amount("discount", 0.0).is_ok());
    }
}
