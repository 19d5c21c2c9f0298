//! Constants used throughout the LIS core crate.
//!
//! Collection directory names, reference prefixes and lifecycle defaults live here so the
//! storage layout and human-readable identifiers stay consistent across services.

/// Default directory for lab data when persistence is enabled without an explicit path.
pub const DEFAULT_LAB_DATA_DIR: &str = "lab_data";

/// File extension for persisted documents.
pub const DOCUMENT_EXTENSION: &str = "yaml";

/// Days a collected sample remains usable when no explicit expiry is supplied.
pub const DEFAULT_SAMPLE_EXPIRY_DAYS: i64 = 7;

/// Upper bound on the configurable sample expiry window (ten years).
pub const MAX_SAMPLE_EXPIRY_DAYS: i64 = 3650;

/// History note recorded when a sample document is first created.
pub const SAMPLE_CREATED_NOTE: &str = "Sample created";

/// History note recorded by the expiry sweep.
pub const SAMPLE_EXPIRED_NOTE: &str = "Sample expired";

/// Prefix for generated medical record numbers.
pub const MRN_PREFIX: &str = "MRN";

/// Prefix for order numbers.
pub const ORDER_NUMBER_PREFIX: &str = "ORD";

/// Prefix for sample identifiers.
pub const SAMPLE_ID_PREFIX: &str = "SMP";

/// Prefix for report numbers.
pub const REPORT_NUMBER_PREFIX: &str = "RPT";

/// Maximum length of a catalog test code.
pub const MAX_TEST_CODE_LEN: usize = 20;
