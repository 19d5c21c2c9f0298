//! Result entry, verification and review.
//!
//! At most one result exists per order and test. The store's unique index enforces that; a
//! second insert for the same pair fails with `Conflict`. Nothing checks for it beforehand.

use super::{unique, BulkUpdateOutcome};
use crate::collaborators::{Mailer, Notification, NotificationKind};
use crate::config::CoreConfig;
use crate::lifecycle::{check_transition, ResultStatus, TransitionPolicy};
use crate::models::result::validate_value_shape;
use crate::models::{
    compute_is_abnormal, LabResult, LabTest, NormalRange, Order, ParameterResult, ValueType,
};
use crate::store::{LabStore, Transaction};
use crate::validation::{optional_text, required_text};
use crate::{LisError, LisResult};
use chrono::{DateTime, Utc};
use lis_uuid::EntityId;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct NewParameterResult {
    pub name: String,
    pub value: Value,
    pub unit: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewResult {
    pub order: EntityId,
    pub test: EntityId,
    /// `None` (or JSON null) registers a pending result awaiting a value.
    pub value: Option<Value>,
    pub value_type: ValueType,
    pub unit: Option<String>,
    /// Overrides the catalog range when supplied.
    pub normal_range: Option<NormalRange>,
    pub parameters: Vec<NewParameterResult>,
    pub comments: Option<String>,
}

fn evaluate_parameters(test: &LabTest, parameters: Vec<NewParameterResult>) -> Vec<ParameterResult> {
    parameters
        .into_iter()
        .map(|p| {
            let catalog = test.parameter(&p.name);
            let normal_range = catalog.map(|c| c.normal_range.clone()).unwrap_or_default();
            ParameterResult {
                is_abnormal: compute_is_abnormal(ValueType::Number, &p.value, &normal_range),
                unit: p.unit.or_else(|| catalog.and_then(|c| c.unit.clone())),
                name: p.name.trim().to_string(),
                value: p.value,
                normal_range,
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct ResultService {
    cfg: Arc<CoreConfig>,
    store: LabStore,
    mailer: Arc<dyn Mailer>,
}

impl ResultService {
    pub fn new(cfg: Arc<CoreConfig>, store: LabStore, mailer: Arc<dyn Mailer>) -> Self {
        Self { cfg, store, mailer }
    }

    fn policy(&self) -> TransitionPolicy {
        self.cfg.transition_policy()
    }

    /// Records a result for one test of an order.
    ///
    /// The reference range is the supplied one or a copy of the catalog test's. The abnormal
    /// flag is derived from it. A result with a value starts `completed`; one without starts
    /// `pending`.
    ///
    /// # Errors
    ///
    /// - [`LisError::NotFound`] if the order or test does not exist.
    /// - [`LisError::InvalidInput`] if the test is not on the order or the value does not fit
    ///   `value_type`.
    /// - [`LisError::Conflict`] if the order already has a result for this test.
    pub fn create_result(&self, new: NewResult, actor: EntityId) -> LisResult<LabResult> {
        let value = new.value.filter(|v| !v.is_null());
        if let Some(value) = &value {
            validate_value_shape(new.value_type, value)?;
        }
        if let Some(range) = &new.normal_range {
            range.validate()?;
        }

        let result = self.store.transaction(|tx| {
            let order = tx.fetch::<Order>(new.order)?;
            let test = tx.fetch::<LabTest>(new.test)?;
            if !order.tests.contains(&test.id) {
                return Err(LisError::InvalidInput(format!(
                    "test {} is not part of order {}",
                    test.code, order.order_number
                )));
            }

            let now = Utc::now();
            let normal_range = new.normal_range.unwrap_or_else(|| test.normal_range.clone());
            let has_value = value.is_some();
            let result = LabResult {
                id: EntityId::new(),
                order: order.id,
                test: test.id,
                patient: order.patient,
                patient_name: order.patient_name.clone(),
                patient_mrn: order.patient_mrn.clone(),
                test_name: test.name.clone(),
                test_code: test.code.clone(),
                is_abnormal: value
                    .as_ref()
                    .is_some_and(|v| compute_is_abnormal(new.value_type, v, &normal_range)),
                value,
                value_type: new.value_type,
                unit: optional_text(new.unit).or_else(|| normal_range.unit.clone()),
                normal_range,
                parameters: evaluate_parameters(&test, new.parameters),
                critical_value: false,
                critical_value_notified_at: None,
                status: if has_value {
                    ResultStatus::Completed
                } else {
                    ResultStatus::Pending
                },
                entered_by: actor,
                analysis_date: has_value.then_some(now),
                verified_by: None,
                verified_at: None,
                rejected_by: None,
                rejected_at: None,
                rejection_reason: None,
                comments: optional_text(new.comments),
                created_at: now,
                updated_at: now,
            };
            tx.put(result.clone())?;
            Ok(result)
        })?;

        tracing::info!(
            result = %result.id,
            order = %result.order,
            test = %result.test_code,
            abnormal = result.is_abnormal,
            "result recorded"
        );
        Ok(result)
    }

    /// Writes a new value and re-derives the abnormal flag.
    ///
    /// The result's own range is used unless it is empty, in which case the linked test's
    /// current range applies. The result becomes `completed` with a fresh analysis date.
    pub fn update_result_value(
        &self,
        id: EntityId,
        value: Value,
        actor: EntityId,
    ) -> LisResult<LabResult> {
        let result = self.store.transaction(|tx| {
            let mut result = tx.fetch::<LabResult>(id)?;
            validate_value_shape(result.value_type, &value)?;
            check_transition(self.policy(), result.status, ResultStatus::Completed)?;

            let range = if result.normal_range.is_empty() {
                tx.get::<LabTest>(result.test)
                    .map(|t| t.normal_range.clone())
                    .unwrap_or_default()
            } else {
                result.normal_range.clone()
            };
            result.set_value(value, &range, Utc::now());
            tx.put(result.clone())?;
            Ok(result)
        })?;
        tracing::info!(result = %id, %actor, abnormal = result.is_abnormal, "result value updated");
        Ok(result)
    }

    pub fn verify_result(&self, id: EntityId, actor: EntityId) -> LisResult<LabResult> {
        self.set_status(id, ResultStatus::Verified, actor, None)
    }

    pub fn reject_result(&self, id: EntityId, actor: EntityId, reason: &str) -> LisResult<LabResult> {
        let reason = required_text("reason", reason)?;
        self.set_status(id, ResultStatus::Rejected, actor, Some(reason))
    }

    /// Sends a result back for review with an explanatory comment.
    pub fn flag_for_review(
        &self,
        id: EntityId,
        actor: EntityId,
        comment: &str,
    ) -> LisResult<LabResult> {
        let comment = required_text("comment", comment)?;
        self.set_status(id, ResultStatus::RequiresReview, actor, Some(comment))
    }

    fn set_status(
        &self,
        id: EntityId,
        status: ResultStatus,
        actor: EntityId,
        reason: Option<String>,
    ) -> LisResult<LabResult> {
        let result = self.store.transaction(|tx| {
            tx.update::<LabResult, _>(id, |result| {
                check_transition(self.policy(), result.status, status)?;
                result.apply_status(status, actor, reason, Utc::now());
                Ok(())
            })
        })?;
        tracing::info!(result = %id, status = %status, %actor, "result status updated");
        Ok(result)
    }

    /// Flags a result as critical and notifies through the mailer. The status is unchanged.
    pub fn mark_result_as_critical(&self, id: EntityId, actor: EntityId) -> LisResult<LabResult> {
        let now = Utc::now();
        let result = self.store.transaction(|tx| {
            tx.update::<LabResult, _>(id, |result| {
                result.mark_critical(now);
                Ok(())
            })
        })?;

        tracing::warn!(result = %id, %actor, test = %result.test_code, "critical value flagged");
        self.mailer.send(Notification {
            kind: NotificationKind::CriticalResult,
            subject: result.id,
            recipient: None,
            message: format!(
                "Critical {} result for {} ({})",
                result.test_code, result.patient_name, result.patient_mrn
            ),
            sent_at: now,
        });
        Ok(result)
    }

    /// Verifies every listed result in one transaction.
    ///
    /// Under the permissive policy results are overwritten whatever their status. Under the
    /// strict policy one illegal move rejects the whole batch.
    pub fn bulk_verify(&self, ids: &[EntityId], actor: EntityId) -> LisResult<BulkUpdateOutcome> {
        self.bulk_set_status(ids, ResultStatus::Verified, actor, None)
    }

    pub fn bulk_reject(
        &self,
        ids: &[EntityId],
        actor: EntityId,
        reason: &str,
    ) -> LisResult<BulkUpdateOutcome> {
        let reason = required_text("reason", reason)?;
        self.bulk_set_status(ids, ResultStatus::Rejected, actor, Some(reason))
    }

    fn bulk_set_status(
        &self,
        ids: &[EntityId],
        status: ResultStatus,
        actor: EntityId,
        reason: Option<String>,
    ) -> LisResult<BulkUpdateOutcome> {
        let outcome = self.store.transaction(|tx| {
            let now = Utc::now();
            let mut outcome = BulkUpdateOutcome::default();
            for id in unique(ids) {
                if self.apply_one(tx, id, status, actor, reason.clone(), now)? {
                    outcome.matched += 1;
                    outcome.modified += 1;
                }
            }
            Ok(outcome)
        })?;
        tracing::info!(
            status = %status,
            matched = outcome.matched,
            modified = outcome.modified,
            "bulk result status update"
        );
        Ok(outcome)
    }

    /// Returns false when `id` does not resolve.
    fn apply_one(
        &self,
        tx: &mut Transaction<'_>,
        id: EntityId,
        status: ResultStatus,
        actor: EntityId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> LisResult<bool> {
        let Some(mut result) = tx.get::<LabResult>(id).cloned() else {
            return Ok(false);
        };
        check_transition(self.policy(), result.status, status)?;
        result.apply_status(status, actor, reason, at);
        tx.put(result)?;
        Ok(true)
    }

    /// Deletes a result, freeing its order/test slot for a new entry.
    pub fn delete_result(&self, id: EntityId) -> LisResult<LabResult> {
        let removed = self.store.transaction(|tx| {
            tx.remove::<LabResult>(id)
                .ok_or_else(|| LisError::not_found("result", id))
        })?;
        tracing::info!(result = %id, "result deleted");
        Ok(removed)
    }

    pub fn get_result(&self, id: EntityId) -> LisResult<LabResult> {
        self.store.read(|t| t.require::<LabResult>(id).cloned())
    }

    pub fn get_results_by_order(&self, order: EntityId) -> Vec<LabResult> {
        self.filter(|r| r.order == order)
    }

    pub fn get_results_by_patient(&self, patient: EntityId) -> Vec<LabResult> {
        self.filter(|r| r.patient == patient)
    }

    pub fn get_abnormal_results(&self) -> Vec<LabResult> {
        self.filter(|r| r.is_abnormal)
    }

    pub fn get_critical_results(&self) -> Vec<LabResult> {
        self.filter(|r| r.critical_value)
    }

    /// Results awaiting sign-off: completed or flagged for review.
    pub fn get_pending_verification(&self) -> Vec<LabResult> {
        self.filter(|r| {
            matches!(
                r.status,
                ResultStatus::Completed | ResultStatus::RequiresReview
            )
        })
    }

    /// Newest first.
    fn filter(&self, keep: impl Fn(&LabResult) -> bool) -> Vec<LabResult> {
        let mut results: Vec<LabResult> = self
            .store
            .read(|t| t.iter::<LabResult>().filter(|r| keep(r)).cloned().collect());
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        results
    }
}
