//! Report authoring, sign-off and amendment.
//!
//! Each lifecycle step writes the status, its timestamp fields and one audit entry together.
//! Amendments create a new document and link it to its predecessor in the same transaction.

use crate::collaborators::{Mailer, Notification, NotificationKind};
use crate::config::CoreConfig;
use crate::constants::REPORT_NUMBER_PREFIX;
use crate::lifecycle::{check_transition, ReportStatus};
use crate::models::{LabResult, Order, Report, ReportChanges, ReportType, User};
use crate::store::{LabStore, Tables};
use crate::validation::{optional_text, required_text};
use crate::{LisError, LisResult};
use chrono::{DateTime, Utc};
use lis_uuid::{human_reference, EntityId};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct NewReport {
    pub order: EntityId,
    pub doctor: EntityId,
    pub results: Vec<EntityId>,
    pub report_type: ReportType,
    pub interpretation: Option<String>,
    pub comments: Option<String>,
}

/// Checks every result exists and belongs to `order`.
fn check_results(tables: &Tables, order: EntityId, results: &[EntityId]) -> LisResult<()> {
    for id in results {
        let result = tables.require::<LabResult>(*id)?;
        if result.order != order {
            return Err(LisError::InvalidInput(format!(
                "result {id} does not belong to order {order}"
            )));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct ReportService {
    cfg: Arc<CoreConfig>,
    store: LabStore,
    mailer: Arc<dyn Mailer>,
}

impl ReportService {
    pub fn new(cfg: Arc<CoreConfig>, store: LabStore, mailer: Arc<dyn Mailer>) -> Self {
        Self { cfg, store, mailer }
    }

    /// Drafts version 1 of a report for an order.
    ///
    /// # Errors
    ///
    /// - [`LisError::NotFound`] if the order, doctor or any result does not exist.
    /// - [`LisError::InvalidInput`] if a result belongs to another order.
    pub fn create_report(&self, new: NewReport, actor: EntityId) -> LisResult<Report> {
        let report = self.store.transaction(|tx| {
            let order = tx.fetch::<Order>(new.order)?;
            tx.fetch::<User>(new.doctor)?;
            let results = super::unique(&new.results);
            check_results(tx.view(), order.id, &results)?;

            let now = Utc::now();
            let id = EntityId::new();
            let mut report = Report {
                id,
                report_number: human_reference(REPORT_NUMBER_PREFIX, now, &id),
                order: order.id,
                patient: order.patient,
                doctor: new.doctor,
                results,
                patient_name: order.patient_name,
                patient_mrn: order.patient_mrn,
                report_type: new.report_type,
                status: ReportStatus::Draft,
                version: 1,
                previous_version: None,
                next_version: None,
                interpretation: optional_text(new.interpretation),
                comments: optional_text(new.comments),
                amendments: Vec::new(),
                audit_trail: Vec::new(),
                approved_by: None,
                approved_at: None,
                rejected_by: None,
                rejected_at: None,
                rejection_reason: None,
                delivered_at: None,
                delivered_to: None,
                archived_at: None,
                created_by: actor,
                created_at: now,
                updated_at: now,
            };
            report.record("created", actor, now, None);
            tx.put(report.clone())?;
            Ok(report)
        })?;

        tracing::info!(
            report = %report.id,
            number = %report.report_number,
            order = %report.order,
            "report drafted"
        );
        Ok(report)
    }

    /// Overwrites interpretation, comments or the result list while the report is editable.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::InvalidInput`] if the report is not a draft or rejected, or if
    /// the changes are empty.
    pub fn update_report_content(
        &self,
        id: EntityId,
        changes: ReportChanges,
        actor: EntityId,
    ) -> LisResult<Report> {
        if changes.is_empty() {
            return Err(LisError::InvalidInput("no report changes supplied".into()));
        }
        self.store.transaction(|tx| {
            let mut report = tx.fetch::<Report>(id)?;
            if !report.is_editable() {
                return Err(LisError::InvalidInput(format!(
                    "report {} cannot be edited while {}",
                    report.report_number, report.status
                )));
            }
            if let Some(results) = &changes.results {
                check_results(tx.view(), report.order, results)?;
            }
            report.apply_changes(&changes);
            report.record("updated", actor, Utc::now(), Some(changes.summary()));
            tx.put(report.clone())?;
            Ok(report)
        })
    }

    pub fn submit_for_review(&self, id: EntityId, actor: EntityId) -> LisResult<Report> {
        self.transition(id, ReportStatus::PendingReview, actor, "submitted", None, |_, _| {})
    }

    pub fn approve_report(&self, id: EntityId, actor: EntityId) -> LisResult<Report> {
        self.transition(id, ReportStatus::Approved, actor, "approved", None, |r, at| {
            r.approved_by = Some(actor);
            r.approved_at = Some(at);
        })
    }

    pub fn reject_report(&self, id: EntityId, actor: EntityId, reason: &str) -> LisResult<Report> {
        let reason = required_text("reason", reason)?;
        let details = Some(reason.clone());
        self.transition(id, ReportStatus::Rejected, actor, "rejected", details, |r, at| {
            r.rejected_by = Some(actor);
            r.rejected_at = Some(at);
            r.rejection_reason = Some(reason);
        })
    }

    /// Marks the report delivered and notifies the recipient through the mailer.
    pub fn deliver_report(
        &self,
        id: EntityId,
        actor: EntityId,
        delivered_to: Option<String>,
    ) -> LisResult<Report> {
        let delivered_to = optional_text(delivered_to);
        let details = delivered_to.as_ref().map(|to| format!("delivered to {to}"));
        let report =
            self.transition(id, ReportStatus::Delivered, actor, "delivered", details, |r, at| {
                r.delivered_at = Some(at);
                r.delivered_to = delivered_to;
            })?;

        self.mailer.send(Notification {
            kind: NotificationKind::ReportDelivered,
            subject: report.id,
            recipient: report.delivered_to.clone(),
            message: format!(
                "Report {} for {} is available",
                report.report_number, report.patient_name
            ),
            sent_at: report.updated_at,
        });
        Ok(report)
    }

    pub fn archive_report(&self, id: EntityId, actor: EntityId) -> LisResult<Report> {
        self.transition(id, ReportStatus::Archived, actor, "archived", None, |r, at| {
            r.archived_at = Some(at);
        })
    }

    fn transition(
        &self,
        id: EntityId,
        status: ReportStatus,
        actor: EntityId,
        action: &str,
        details: Option<String>,
        side_effects: impl FnOnce(&mut Report, DateTime<Utc>),
    ) -> LisResult<Report> {
        let report = self.store.transaction(|tx| {
            tx.update::<Report, _>(id, |report| {
                check_transition(self.cfg.transition_policy(), report.status, status)?;
                let now = Utc::now();
                side_effects(report, now);
                report.status = status;
                report.record(action, actor, now, details);
                Ok(())
            })
        })?;
        tracing::info!(report = %id, status = %status, %actor, "report status updated");
        Ok(report)
    }

    /// Creates the next version of a report.
    ///
    /// The new document is a draft of type amended numbered `{root}-V{n}`. The original gains
    /// a `next_version` link in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::StateConflict`] if the report has already been amended, and
    /// [`LisError::InvalidInput`] for a blank reason or results from another order.
    pub fn amend_report(
        &self,
        id: EntityId,
        actor: EntityId,
        reason: &str,
        changes: ReportChanges,
    ) -> LisResult<Report> {
        let reason = required_text("reason", reason)?;
        let amended = self.store.transaction(|tx| {
            let mut original = tx.fetch::<Report>(id)?;
            if let Some(next) = original.next_version {
                return Err(LisError::StateConflict(format!(
                    "report {} was already amended by {next}",
                    original.report_number
                )));
            }
            if let Some(results) = &changes.results {
                check_results(tx.view(), original.order, results)?;
            }

            let now = Utc::now();
            let amended = original.amended_copy(actor, &reason, changes, now);
            original.next_version = Some(amended.id);
            original.updated_at = now;
            tx.put(amended.clone())?;
            tx.put(original)?;
            Ok(amended)
        })?;

        tracing::info!(
            report = %amended.id,
            previous = %id,
            number = %amended.report_number,
            version = amended.version,
            "report amended"
        );
        Ok(amended)
    }

    pub fn get_report(&self, id: EntityId) -> LisResult<Report> {
        self.store.read(|t| t.require::<Report>(id).cloned())
    }

    /// The report and its direct neighbours in the version chain, sorted by version.
    pub fn get_report_versions(&self, id: EntityId) -> LisResult<Vec<Report>> {
        self.store.read(|t| {
            t.require::<Report>(id)?;
            let mut versions: Vec<Report> = t
                .iter::<Report>()
                .filter(|r| {
                    r.id == id || r.previous_version == Some(id) || r.next_version == Some(id)
                })
                .cloned()
                .collect();
            versions.sort_by_key(|r| r.version);
            Ok(versions)
        })
    }

    /// Every version from the original report to the latest amendment.
    pub fn get_report_chain(&self, id: EntityId) -> LisResult<Vec<Report>> {
        self.store.read(|t| {
            let mut root = t.require::<Report>(id)?;
            let mut seen = HashSet::from([root.id]);
            while let Some(previous) = root.previous_version.and_then(|p| t.get::<Report>(p)) {
                if !seen.insert(previous.id) {
                    break;
                }
                root = previous;
            }

            let mut chain = vec![root.clone()];
            let mut seen = HashSet::from([root.id]);
            let mut current = root;
            while let Some(next) = current.next_version.and_then(|n| t.get::<Report>(n)) {
                if !seen.insert(next.id) {
                    break;
                }
                chain.push(next.clone());
                current = next;
            }
            Ok(chain)
        })
    }

    /// Newest first.
    pub fn list_reports_by_patient(&self, patient: EntityId) -> Vec<Report> {
        self.list(|r| r.patient == patient)
    }

    pub fn list_reports_by_status(&self, status: ReportStatus) -> Vec<Report> {
        self.list(|r| r.status == status)
    }

    fn list(&self, keep: impl Fn(&Report) -> bool) -> Vec<Report> {
        let mut reports: Vec<Report> = self
            .store
            .read(|t| t.iter::<Report>().filter(|r| keep(r)).cloned().collect());
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::TransitionPolicy;
    use crate::repositories::test_support::Fixture;
    use serde_json::json;

    fn draft(fx: &Fixture) -> Report {
        let order = fx.order(vec![fx.cbc.id]);
        let result = fx
            .services
            .results
            .create_result(fx.new_result(&order, fx.cbc.id, Some(json!(5))), fx.actor)
            .expect("result");
        fx.services
            .reports
            .create_report(
                NewReport {
                    order: order.id,
                    doctor: fx.doctor.id,
                    results: vec![result.id, result.id],
                    report_type: ReportType::Final,
                    interpretation: Some("Within normal limits".into()),
                    comments: None,
                },
                fx.actor,
            )
            .expect("create report")
    }

    #[test]
    fn create_snapshots_order_and_audits() {
        let fx = Fixture::new();
        let report = draft(&fx);
        assert_eq!(report.status, ReportStatus::Draft);
        assert_eq!(report.version, 1);
        assert!(report.report_number.starts_with("RPT-"));
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.patient_mrn, fx.patient.mrn);
        assert_eq!(report.audit_trail.len(), 1);
        assert_eq!(report.audit_trail[0].action, "created");
    }

    #[test]
    fn results_from_another_order_are_rejected() {
        let fx = Fixture::new();
        let other = fx.order(vec![fx.cbc.id]);
        let result = fx
            .services
            .results
            .create_result(fx.new_result(&other, fx.cbc.id, Some(json!(5))), fx.actor)
            .expect("result");
        let order = fx.order(vec![fx.cbc.id]);

        let err = fx
            .services
            .reports
            .create_report(
                NewReport {
                    order: order.id,
                    doctor: fx.doctor.id,
                    results: vec![result.id],
                    report_type: ReportType::Preliminary,
                    interpretation: None,
                    comments: None,
                },
                fx.actor,
            )
            .expect_err("foreign result");
        assert!(matches!(err, LisError::InvalidInput(_)));
    }

    #[test]
    fn lifecycle_records_one_audit_entry_per_step() {
        let fx = Fixture::new();
        let reports = &fx.services.reports;
        let report = draft(&fx);

        reports.submit_for_review(report.id, fx.actor).expect("submit");
        let approved = reports.approve_report(report.id, fx.doctor.id).expect("approve");
        assert_eq!(approved.approved_by, Some(fx.doctor.id));
        assert!(approved.is_deliverable());

        let delivered = reports
            .deliver_report(report.id, fx.actor, Some("gp@clinic.example".into()))
            .expect("deliver");
        assert_eq!(delivered.delivered_to.as_deref(), Some("gp@clinic.example"));
        assert!(delivered.is_archivable());

        let archived = reports.archive_report(report.id, fx.actor).expect("archive");
        assert!(archived.archived_at.is_some());
        assert!(!archived.is_archivable());

        let actions: Vec<&str> = archived.audit_trail.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(
            actions,
            ["created", "submitted", "approved", "delivered", "archived"]
        );

        let sent = fx.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::ReportDelivered);
        assert_eq!(sent[0].recipient.as_deref(), Some("gp@clinic.example"));
    }

    #[test]
    fn content_is_editable_only_while_draft_or_rejected() {
        let fx = Fixture::new();
        let reports = &fx.services.reports;
        let report = draft(&fx);
        let changes = ReportChanges {
            comments: Some("Repeat in 3 months".into()),
            ..ReportChanges::default()
        };

        let updated = reports
            .update_report_content(report.id, changes.clone(), fx.actor)
            .expect("draft is editable");
        assert_eq!(updated.comments.as_deref(), Some("Repeat in 3 months"));

        reports.submit_for_review(report.id, fx.actor).expect("submit");
        assert!(matches!(
            reports.update_report_content(report.id, changes.clone(), fx.actor),
            Err(LisError::InvalidInput(_))
        ));

        let rejected = reports
            .reject_report(report.id, fx.doctor.id, "missing lipid panel")
            .expect("reject");
        assert_eq!(rejected.rejection_reason.as_deref(), Some("missing lipid panel"));
        reports
            .update_report_content(report.id, changes, fx.actor)
            .expect("rejected is editable");
    }

    #[test]
    fn amendment_links_versions_and_numbers_from_root() {
        let fx = Fixture::new();
        let reports = &fx.services.reports;
        let v1 = draft(&fx);

        let v2 = reports
            .amend_report(
                v1.id,
                fx.doctor.id,
                "typo in interpretation",
                ReportChanges {
                    interpretation: Some("Borderline".into()),
                    ..ReportChanges::default()
                },
            )
            .expect("amend v1");
        assert_eq!(v2.version, 2);
        assert_eq!(v2.report_number, format!("{}-V2", v1.report_number));
        assert_eq!(v2.status, ReportStatus::Draft);
        assert_eq!(v2.report_type, ReportType::Amended);
        assert_eq!(v2.previous_version, Some(v1.id));
        assert_eq!(v2.interpretation.as_deref(), Some("Borderline"));
        assert_eq!(v2.amendments.len(), 1);
        assert_eq!(
            reports.get_report(v1.id).expect("v1").next_version,
            Some(v2.id)
        );

        let v3 = reports
            .amend_report(v2.id, fx.doctor.id, "second look", ReportChanges::default())
            .expect("amend v2");
        assert_eq!(v3.report_number, format!("{}-V3", v1.report_number));
        assert_eq!(v3.amendments.len(), 2);

        let err = reports
            .amend_report(v1.id, fx.doctor.id, "fork", ReportChanges::default())
            .expect_err("v1 already amended");
        assert!(matches!(err, LisError::StateConflict(_)));
    }

    #[test]
    fn versions_are_one_hop_and_chain_is_complete() {
        let fx = Fixture::new();
        let reports = &fx.services.reports;
        let v1 = draft(&fx);
        let v2 = reports
            .amend_report(v1.id, fx.actor, "a", ReportChanges::default())
            .expect("v2");
        let v3 = reports
            .amend_report(v2.id, fx.actor, "b", ReportChanges::default())
            .expect("v3");

        let around_v1: Vec<u32> = reports
            .get_report_versions(v1.id)
            .expect("versions")
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(around_v1, [1, 2]);

        let around_v2: Vec<u32> = reports
            .get_report_versions(v2.id)
            .expect("versions")
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(around_v2, [1, 2, 3]);

        let chain: Vec<EntityId> = reports
            .get_report_chain(v3.id)
            .expect("chain")
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(chain, [v1.id, v2.id, v3.id]);
    }

    #[test]
    fn strict_policy_enforces_report_table() {
        let fx = Fixture::with_policy(TransitionPolicy::Strict);
        let reports = &fx.services.reports;
        let report = draft(&fx);

        let err = reports
            .approve_report(report.id, fx.doctor.id)
            .expect_err("draft cannot be approved directly");
        assert!(matches!(err, LisError::InvalidTransition { .. }));
        assert!(reports.get_report(report.id).expect("get").approved_by.is_none());

        reports.submit_for_review(report.id, fx.actor).expect("submit");
        reports.approve_report(report.id, fx.doctor.id).expect("approve");
    }

    #[test]
    fn listing_by_patient_and_status() {
        let fx = Fixture::new();
        let a = draft(&fx);
        draft(&fx);
        fx.services
            .reports
            .submit_for_review(a.id, fx.actor)
            .expect("submit");

        let reports = &fx.services.reports;
        assert_eq!(reports.list_reports_by_patient(fx.patient.id).len(), 2);
        assert_eq!(reports.list_reports_by_status(ReportStatus::Draft).len(), 1);
        assert_eq!(
            reports.list_reports_by_status(ReportStatus::PendingReview)[0].id,
            a.id
        );
    }
}
