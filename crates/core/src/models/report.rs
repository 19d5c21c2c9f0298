//! Clinical reports and their amendment chain.
//!
//! Amending never edits a report in place. It creates a new document that points back at its
//! predecessor through `previous_version`, and the predecessor points forward through
//! `next_version`. Amendments and the audit trail are copied forward, so the newest version
//! carries the whole history.

use crate::lifecycle::{status_strings, ReportStatus};
use chrono::{DateTime, Utc};
use lis_uuid::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Preliminary,
    #[default]
    Final,
    Amended,
}

status_strings!(ReportType {
    Preliminary => "preliminary",
    Final => "final",
    Amended => "amended",
});

/// Content edits carried by an update or an amendment. Absent fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<EntityId>>,
}

impl ReportChanges {
    pub fn is_empty(&self) -> bool {
        self.interpretation.is_none() && self.comments.is_none() && self.results.is_none()
    }

    /// Short human summary used in audit details, e.g. `"interpretation, comments"`.
    pub fn summary(&self) -> String {
        let mut fields = Vec::new();
        if self.interpretation.is_some() {
            fields.push("interpretation");
        }
        if self.comments.is_some() {
            fields.push("comments");
        }
        if self.results.is_some() {
            fields.push("results");
        }
        fields.join(", ")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Amendment {
    pub amended_by: EntityId,
    pub amended_at: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub changes: ReportChanges,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    pub performed_by: EntityId,
    pub performed_at: DateTime<Utc>,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: EntityId,
    pub report_number: String,
    pub order: EntityId,
    pub patient: EntityId,
    pub doctor: EntityId,
    pub results: Vec<EntityId>,
    pub patient_name: String,
    pub patient_mrn: String,
    pub report_type: ReportType,
    pub status: ReportStatus,
    pub version: u32,
    #[serde(default)]
    pub previous_version: Option<EntityId>,
    #[serde(default)]
    pub next_version: Option<EntityId>,
    #[serde(default)]
    pub interpretation: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub amendments: Vec<Amendment>,
    #[serde(default)]
    pub audit_trail: Vec<AuditEntry>,
    #[serde(default)]
    pub approved_by: Option<EntityId>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_by: Option<EntityId>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_to: Option<String>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    pub created_by: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn is_editable(&self) -> bool {
        matches!(self.status, ReportStatus::Draft | ReportStatus::Rejected)
    }

    pub fn is_approvable(&self) -> bool {
        self.status == ReportStatus::PendingReview
    }

    pub fn is_deliverable(&self) -> bool {
        self.status == ReportStatus::Approved
    }

    pub fn is_archivable(&self) -> bool {
        self.status == ReportStatus::Delivered && self.archived_at.is_none()
    }

    pub fn record(
        &mut self,
        action: &str,
        actor: EntityId,
        at: DateTime<Utc>,
        details: Option<String>,
    ) {
        self.audit_trail.push(AuditEntry {
            action: action.to_string(),
            performed_by: actor,
            performed_at: at,
            details,
        });
        self.updated_at = at;
    }

    pub fn apply_changes(&mut self, changes: &ReportChanges) {
        if let Some(interpretation) = &changes.interpretation {
            self.interpretation = Some(interpretation.clone());
        }
        if let Some(comments) = &changes.comments {
            self.comments = Some(comments.clone());
        }
        if let Some(results) = &changes.results {
            self.results = results.clone();
        }
    }

    /// Builds the next version of this report. The caller links `self.next_version`.
    ///
    /// The copy starts as a draft of type amended, inherits amendments and the audit trail,
    /// and then records this amendment in both.
    pub fn amended_copy(
        &self,
        actor: EntityId,
        reason: &str,
        changes: ReportChanges,
        at: DateTime<Utc>,
    ) -> Report {
        let version = self.version + 1;
        let mut next = Report {
            id: EntityId::new(),
            report_number: format!("{}-V{version}", root_report_number(&self.report_number)),
            report_type: ReportType::Amended,
            status: ReportStatus::Draft,
            version,
            previous_version: Some(self.id),
            next_version: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            delivered_at: None,
            delivered_to: None,
            archived_at: None,
            created_by: actor,
            created_at: at,
            updated_at: at,
            ..self.clone()
        };
        next.apply_changes(&changes);
        let details = format!("version {version}: {reason}");
        next.amendments.push(Amendment {
            amended_by: actor,
            amended_at: at,
            reason: reason.to_string(),
            changes,
        });
        next.record("amended", actor, at, Some(details));
        next
    }
}

/// Strips a trailing `-V<digits>` version suffix from a report number.
pub fn root_report_number(number: &str) -> &str {
    if let Some(pos) = number.rfind("-V") {
        let suffix = &number[pos + 2..];
        if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
            return &number[..pos];
        }
    }
    number
}
