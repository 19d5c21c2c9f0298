//! Core runtime configuration.
//!
//! This module defines configuration that is resolved once at process startup and then passed
//! into core services. Services never read environment variables during request handling; the
//! binaries read them, parse them with the helpers below, and build a [`CoreConfig`].

use crate::constants::{DEFAULT_SAMPLE_EXPIRY_DAYS, MAX_SAMPLE_EXPIRY_DAYS};
use crate::lifecycle::TransitionPolicy;
use crate::{LisError, LisResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: Option<PathBuf>,
    transition_policy: TransitionPolicy,
    sample_expiry_days: i64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            transition_policy: TransitionPolicy::default(),
            sample_expiry_days: DEFAULT_SAMPLE_EXPIRY_DAYS,
        }
    }
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Where committed documents are persisted. `None` keeps the store in memory.
    /// * `transition_policy` - Whether sample/result/report status moves are checked.
    /// * `sample_expiry_days` - Default shelf life of a collected sample.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::InvalidInput`] if `sample_expiry_days` is not between 1 and
    /// [`MAX_SAMPLE_EXPIRY_DAYS`].
    pub fn new(
        data_dir: Option<PathBuf>,
        transition_policy: TransitionPolicy,
        sample_expiry_days: i64,
    ) -> LisResult<Self> {
        Ok(Self {
            data_dir,
            transition_policy,
            sample_expiry_days: check_expiry_days(sample_expiry_days)?,
        })
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn transition_policy(&self) -> TransitionPolicy {
        self.transition_policy
    }

    pub fn sample_expiry_days(&self) -> i64 {
        self.sample_expiry_days
    }
}

/// Parse the transition policy from an optional string value.
///
/// `None` or blank input yields the default (permissive) policy.
pub fn transition_policy_from_env_value(value: Option<String>) -> LisResult<TransitionPolicy> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value.map(|v| v.parse::<TransitionPolicy>()).transpose()?;

    Ok(parsed.unwrap_or_default())
}

/// Parse the sample expiry window (in days) from an optional string value.
pub fn expiry_days_from_env_value(value: Option<String>) -> LisResult<i64> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(DEFAULT_SAMPLE_EXPIRY_DAYS),
        Some(v) => {
            let days: i64 = v.parse().map_err(|_| {
                LisError::InvalidInput(format!("sample expiry days must be an integer, got '{v}'"))
            })?;
            check_expiry_days(days)
        }
    }
}

fn check_expiry_days(days: i64) -> LisResult<i64> {
    if !(1..=MAX_SAMPLE_EXPIRY_DAYS).contains(&days) {
        return Err(LisError::InvalidInput(format!(
            "sample expiry days must be between 1 and {MAX_SAMPLE_EXPIRY_DAYS}, got {days}"
        )));
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_defaults_to_permissive() {
        assert_eq!(
            transition_policy_from_env_value(None).unwrap(),
            TransitionPolicy::Permissive
        );
        assert_eq!(
            transition_policy_from_env_value(Some("  ".into())).unwrap(),
            TransitionPolicy::Permissive
        );
    }

    #[test]
    fn policy_parses_strict() {
        assert_eq!(
            transition_policy_from_env_value(Some("Strict".into())).unwrap(),
            TransitionPolicy::Strict
        );
    }

    #[test]
    fn policy_rejects_unknown_value() {
        let err = transition_policy_from_env_value(Some("lenient".into()))
            .expect_err("unknown policy should fail");
        assert!(matches!(err, LisError::InvalidInput(_)));
    }

    #[test]
    fn expiry_days_parsing() {
        assert_eq!(expiry_days_from_env_value(None).unwrap(), 7);
        assert_eq!(expiry_days_from_env_value(Some("14".into())).unwrap(), 14);
        assert!(expiry_days_from_env_value(Some("0".into())).is_err());
        assert!(expiry_days_from_env_value(Some("week".into())).is_err());
    }

    #[test]
    fn new_rejects_non_positive_expiry() {
        assert!(CoreConfig::new(None, TransitionPolicy::Strict, 0).is_err());
    }

    #[test]
    fn expiry_days_beyond_cap_are_rejected() {
        let err = expiry_days_from_env_value(Some("100000000".into()))
            .expect_err("huge window should fail");
        assert!(matches!(err, LisError::InvalidInput(_)));
        assert!(CoreConfig::new(None, TransitionPolicy::Permissive, 100_000_000).is_err());
        assert!(CoreConfig::new(None, TransitionPolicy::Permissive, i64::MAX).is_err());

        let at_cap = CoreConfig::new(None, TransitionPolicy::Permissive, MAX_SAMPLE_EXPIRY_DAYS)
            .expect("cap itself is allowed");
        assert_eq!(at_cap.sample_expiry_days(), MAX_SAMPLE_EXPIRY_DAYS);
    }
}
