//! Entity documents held by the store.

pub mod order;
pub mod patient;
pub mod report;
pub mod result;
pub mod sample;
pub mod test_catalog;
pub mod user;

pub use order::{Order, OrderItem, OrderPriority, PaymentStatus};
pub use patient::{Gender, MedicalCondition, Patient};
pub use report::{Amendment, AuditEntry, Report, ReportChanges, ReportType};
pub use result::{compute_is_abnormal, parse_float, LabResult, ParameterResult, ValueType};
pub use sample::{Sample, SampleDraft, SamplePriority, StatusHistoryEntry};
pub use test_catalog::{LabTest, NormalRange, TestParameter};
pub use user::{User, UserRole};
