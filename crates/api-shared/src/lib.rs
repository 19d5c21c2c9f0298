//! # API Shared
//!
//! Shared utilities and definitions for LIS APIs.
//!
//! Contains:
//! - Request and response types with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//! - Caller identification (API key and acting user headers)
//!
//! Used by `api-rest` and the workspace binary for common functionality.

pub mod auth;
pub mod dto;
pub mod health;

pub use health::{HealthRes, HealthService};
