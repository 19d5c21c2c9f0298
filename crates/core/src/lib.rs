//! # LIS Core
//!
//! Core business logic for the laboratory information system.
//!
//! This crate owns the lifecycle of the four laboratory workflow entities and the leaves they
//! reference:
//! - Orders: test requests with a price snapshot and a strictly forward status
//! - Samples: collected specimens with a status history and expiry
//! - Results: measured values with derived abnormal and critical flags
//! - Reports: signed-off documents with an append-only amendment chain
//!
//! State lives in a [`LabStore`], an in-process transactional document store that can persist
//! committed documents as sharded YAML files.
//!
//! **No API concerns**: HTTP servers, authentication and request DTOs belong in `api-rest` and
//! `api-shared`.

pub mod collaborators;
pub mod config;
pub mod constants;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod repositories;
pub mod store;
pub mod validation;

pub use config::CoreConfig;
pub use error::{ErrorKind, LisError, LisResult};
pub use lifecycle::{
    check_transition, CollectionStatus, Lifecycle, OrderStatus, ReportStatus, ResultStatus,
    TransitionPolicy,
};
pub use repositories::{BulkUpdateOutcome, LabServices};
pub use store::LabStore;

pub use lis_uuid::EntityId;
