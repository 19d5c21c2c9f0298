//! Specimens collected against an order.
//!
//! `status_history` is append-only: each status write pushes one entry and never edits an
//! earlier one. Transition fields are first-write-wins: re-applying a status never moves a
//! timestamp or actor that is already recorded.

use crate::constants::{SAMPLE_CREATED_NOTE, SAMPLE_ID_PREFIX};
use crate::lifecycle::{status_strings, CollectionStatus};
use crate::{LisError, LisResult};
use chrono::{DateTime, Duration, Utc};
use lis_uuid::{human_reference, EntityId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplePriority {
    #[default]
    Routine,
    Urgent,
    Stat,
    Critical,
}

status_strings!(SamplePriority {
    Routine => "routine",
    Urgent => "urgent",
    Stat => "stat",
    Critical => "critical",
});

impl SamplePriority {
    /// Higher is more urgent.
    pub fn rank(self) -> u8 {
        match self {
            SamplePriority::Routine => 0,
            SamplePriority::Urgent => 1,
            SamplePriority::Stat => 2,
            SamplePriority::Critical => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: CollectionStatus,
    pub changed_by: EntityId,
    pub changed_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: EntityId,
    pub sample_id: String,
    pub order: EntityId,
    pub patient: EntityId,
    pub tests: Vec<EntityId>,
    pub sample_type: String,
    #[serde(default)]
    pub container_type: Option<String>,
    pub collection_status: CollectionStatus,
    pub priority: SamplePriority,
    #[serde(default)]
    pub scheduled_collection_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_collection_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub collected_by: Option<EntityId>,
    #[serde(default)]
    pub received_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processed_by: Option<EntityId>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_by: Option<EntityId>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    /// True when `expiry_date` was supplied by the caller rather than derived.
    #[serde(default)]
    pub expiry_explicit: bool,
    pub status_history: Vec<StatusHistoryEntry>,
    pub last_modified_by: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies when registering a sample. Everything else is derived.
#[derive(Clone, Debug)]
pub struct SampleDraft {
    pub order: EntityId,
    pub patient: EntityId,
    pub tests: Vec<EntityId>,
    pub sample_type: String,
    pub container_type: Option<String>,
    pub priority: SamplePriority,
    pub scheduled_collection_time: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
}

impl Sample {
    /// Builds a pending sample whose history holds the creation entry.
    pub fn create(draft: SampleDraft, created_by: EntityId, at: DateTime<Utc>) -> Self {
        let id = EntityId::new();
        Self {
            id,
            sample_id: human_reference(SAMPLE_ID_PREFIX, at, &id),
            order: draft.order,
            patient: draft.patient,
            tests: draft.tests,
            sample_type: draft.sample_type,
            container_type: draft.container_type,
            collection_status: CollectionStatus::Pending,
            priority: draft.priority,
            scheduled_collection_time: draft.scheduled_collection_time,
            actual_collection_time: None,
            collected_by: None,
            received_time: None,
            processing_start_time: None,
            processing_end_time: None,
            processed_by: None,
            rejected_at: None,
            rejected_by: None,
            rejection_reason: None,
            expiry_explicit: draft.expiry_date.is_some(),
            expiry_date: draft.expiry_date,
            status_history: vec![StatusHistoryEntry {
                status: CollectionStatus::Pending,
                changed_by: created_by,
                changed_at: at,
                notes: Some(SAMPLE_CREATED_NOTE.to_string()),
            }],
            last_modified_by: created_by,
            created_at: at,
            updated_at: at,
        }
    }

    /// Applies a status write: sets the status, appends history and fills transition fields.
    ///
    /// The caller checks the move against the configured policy first.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::InvalidInput`] if the default expiry date would fall outside the
    /// representable date range. The sample may be partially updated in that case and must be
    /// discarded.
    pub fn apply_status(
        &mut self,
        status: CollectionStatus,
        changed_by: EntityId,
        notes: Option<String>,
        at: DateTime<Utc>,
        expiry_days: i64,
    ) -> LisResult<()> {
        match status {
            CollectionStatus::Collected => {
                if self.actual_collection_time.is_none() {
                    self.actual_collection_time = Some(at);
                }
                if self.collected_by.is_none() {
                    self.collected_by = Some(changed_by);
                }
                self.default_expiry(expiry_days)?;
            }
            CollectionStatus::InProcess => {
                if self.received_time.is_none() {
                    self.received_time = Some(at);
                }
            }
            CollectionStatus::Processing => {
                if self.processing_start_time.is_none() {
                    self.processing_start_time = Some(at);
                }
                if self.processed_by.is_none() {
                    self.processed_by = Some(changed_by);
                }
            }
            CollectionStatus::Completed => {
                if self.processing_end_time.is_none() {
                    self.processing_end_time = Some(at);
                }
            }
            CollectionStatus::Rejected => {
                if self.rejected_at.is_none() {
                    self.rejected_at = Some(at);
                    self.rejected_by = Some(changed_by);
                }
                if self.rejection_reason.is_none() {
                    self.rejection_reason = notes.clone();
                }
            }
            CollectionStatus::Pending | CollectionStatus::Cancelled | CollectionStatus::Expired => {
            }
        }

        self.collection_status = status;
        self.last_modified_by = changed_by;
        self.updated_at = at;
        self.status_history.push(StatusHistoryEntry {
            status,
            changed_by,
            changed_at: at,
            notes,
        });
        Ok(())
    }

    /// Derives `expiry_date` from the collection time unless one was given explicitly.
    fn default_expiry(&mut self, expiry_days: i64) -> LisResult<()> {
        if self.expiry_explicit || self.expiry_date.is_some() {
            return Ok(());
        }
        if let Some(collected) = self.actual_collection_time {
            let expiry = Duration::try_days(expiry_days)
                .and_then(|window| collected.checked_add_signed(window))
                .ok_or_else(|| {
                    LisError::InvalidInput(format!(
                        "expiry window of {expiry_days} days is out of range"
                    ))
                })?;
            self.expiry_date = Some(expiry);
        }
        Ok(())
    }

    /// Minutes between processing start and end, when both are recorded.
    pub fn processing_minutes(&self) -> Option<f64> {
        let start = self.processing_start_time?;
        let end = self.processing_end_time?;
        Some((end - start).num_milliseconds() as f64 / 60_000.0)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expiry_date, Some(expiry) if expiry < now)
    }
}
