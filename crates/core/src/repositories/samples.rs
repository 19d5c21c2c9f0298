//! Sample collection and processing lifecycle.
//!
//! Every status write appends to the sample's history. Whether a move is accepted depends on
//! the configured [`TransitionPolicy`](crate::lifecycle::TransitionPolicy).

use super::orders::transition_order;
use super::{unique, BulkUpdateOutcome};
use crate::config::CoreConfig;
use crate::constants::SAMPLE_EXPIRED_NOTE;
use crate::lifecycle::{check_transition, CollectionStatus, Lifecycle, OrderStatus};
use crate::models::{Order, Patient, Sample, SampleDraft, SamplePriority};
use crate::store::{LabStore, Transaction};
use crate::validation::{optional_text, required_text};
use crate::{LisError, LisResult};
use chrono::{DateTime, Utc};
use lis_uuid::EntityId;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct NewSample {
    pub order: EntityId,
    pub patient: EntityId,
    pub tests: Vec<EntityId>,
    pub sample_type: String,
    pub container_type: Option<String>,
    pub priority: SamplePriority,
    pub scheduled_collection_time: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Per-status count and mean processing time.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionStat {
    pub status: CollectionStatus,
    pub count: usize,
    /// Mean of `processing_end_time - processing_start_time` over samples that have both.
    pub avg_processing_minutes: Option<f64>,
}

/// Pending-queue ordering: most urgent first, then earliest scheduled, unscheduled last.
fn queue_order(a: &Sample, b: &Sample) -> Ordering {
    let scheduled = match (a.scheduled_collection_time, b.scheduled_collection_time) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    b.priority
        .rank()
        .cmp(&a.priority.rank())
        .then(scheduled)
        .then_with(|| a.created_at.cmp(&b.created_at))
}

#[derive(Clone)]
pub struct SampleService {
    cfg: Arc<CoreConfig>,
    store: LabStore,
}

impl SampleService {
    pub fn new(cfg: Arc<CoreConfig>, store: LabStore) -> Self {
        Self { cfg, store }
    }

    /// Registers a sample against an order.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::NotFound`] if the order or patient is missing, and
    /// [`LisError::InvalidInput`] if the patient does not match the order or any test is not
    /// on the order.
    pub fn create_sample(&self, new: NewSample, actor: EntityId) -> LisResult<Sample> {
        let sample_type = required_text("sample_type", &new.sample_type)?;
        if new.tests.is_empty() {
            return Err(LisError::InvalidInput(
                "a sample must cover at least one test".into(),
            ));
        }

        let sample = self.store.transaction(|tx| {
            let order = tx.fetch::<Order>(new.order)?;
            tx.fetch::<Patient>(new.patient)?;
            if order.patient != new.patient {
                return Err(LisError::InvalidInput(format!(
                    "patient {} does not match order {}",
                    new.patient, order.order_number
                )));
            }
            if let Some(stray) = new.tests.iter().find(|t| !order.tests.contains(t)) {
                return Err(LisError::InvalidInput(format!(
                    "test {stray} is not part of order {}",
                    order.order_number
                )));
            }

            let sample = Sample::create(
                SampleDraft {
                    order: order.id,
                    patient: order.patient,
                    tests: unique(&new.tests),
                    sample_type,
                    container_type: optional_text(new.container_type),
                    priority: new.priority,
                    scheduled_collection_time: new.scheduled_collection_time,
                    expiry_date: new.expiry_date,
                },
                actor,
                Utc::now(),
            );
            tx.put(sample.clone())?;
            Ok(sample)
        })?;

        tracing::info!(
            sample = %sample.id,
            sample_id = %sample.sample_id,
            order = %sample.order,
            "sample registered"
        );
        Ok(sample)
    }

    /// Applies one status write inside `tx`, including the order side effect.
    fn write_status(
        &self,
        tx: &mut Transaction<'_>,
        mut sample: Sample,
        status: CollectionStatus,
        actor: EntityId,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> LisResult<Sample> {
        check_transition(self.cfg.transition_policy(), sample.collection_status, status)?;
        sample.apply_status(status, actor, notes, at, self.cfg.sample_expiry_days())?;
        tx.put(sample.clone())?;

        if status == CollectionStatus::Collected {
            if let Some(mut order) = tx.get::<Order>(sample.order).cloned() {
                if matches!(order.status, OrderStatus::Pending | OrderStatus::Processing) {
                    transition_order(&mut order, OrderStatus::SampleCollected, actor, at)?;
                    tx.put(order)?;
                }
            }
        }
        Ok(sample)
    }

    /// Moves a sample to `status` and records it in the history.
    ///
    /// # Arguments
    ///
    /// * `id` - The sample document id.
    /// * `status` - Target status. Re-applying the current status appends history only.
    /// * `actor` - Recorded as `changed_by` and `last_modified_by`.
    /// * `notes` - Free-text note for the history entry.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::NotFound`] for an unknown sample and, under the strict policy,
    /// [`LisError::InvalidTransition`] for a move the table does not list.
    pub fn update_status(
        &self,
        id: EntityId,
        status: CollectionStatus,
        actor: EntityId,
        notes: Option<String>,
    ) -> LisResult<Sample> {
        let sample = self.store.transaction(|tx| {
            let sample = tx.fetch::<Sample>(id)?;
            self.write_status(tx, sample, status, actor, optional_text(notes), Utc::now())
        })?;
        tracing::info!(sample = %id, status = %status, %actor, "sample status updated");
        Ok(sample)
    }

    pub fn reject_sample(&self, id: EntityId, actor: EntityId, reason: &str) -> LisResult<Sample> {
        let reason = required_text("reason", reason)?;
        self.update_status(id, CollectionStatus::Rejected, actor, Some(reason))
    }

    /// Applies one status write to many samples in a single transaction.
    ///
    /// Unknown ids are skipped. Each updated sample gets its own history entry. Under the
    /// strict policy one illegal move rejects the whole batch.
    pub fn bulk_update_status(
        &self,
        ids: &[EntityId],
        status: CollectionStatus,
        actor: EntityId,
        notes: Option<String>,
    ) -> LisResult<BulkUpdateOutcome> {
        let notes = optional_text(notes);
        let outcome = self.store.transaction(|tx| {
            let now = Utc::now();
            let mut outcome = BulkUpdateOutcome::default();
            for id in unique(ids) {
                let Some(sample) = tx.get::<Sample>(id).cloned() else {
                    continue;
                };
                outcome.matched += 1;
                self.write_status(tx, sample, status, actor, notes.clone(), now)?;
                outcome.modified += 1;
            }
            Ok(outcome)
        })?;
        tracing::info!(
            status = %status,
            matched = outcome.matched,
            modified = outcome.modified,
            "bulk sample status update"
        );
        Ok(outcome)
    }

    /// Expires samples whose `expiry_date` is before `now`.
    ///
    /// Only samples that have not started processing are considered: pending, collected and
    /// in-process. Returns the expired samples.
    pub fn expire_overdue_samples(
        &self,
        now: DateTime<Utc>,
        actor: EntityId,
    ) -> LisResult<Vec<Sample>> {
        let expired = self.store.transaction(|tx| {
            let overdue: Vec<Sample> = tx
                .view()
                .iter::<Sample>()
                .filter(|s| {
                    s.is_overdue(now)
                        && s.collection_status
                            .allowed_targets()
                            .contains(&CollectionStatus::Expired)
                })
                .cloned()
                .collect();

            overdue
                .into_iter()
                .map(|sample| {
                    self.write_status(
                        tx,
                        sample,
                        CollectionStatus::Expired,
                        actor,
                        Some(SAMPLE_EXPIRED_NOTE.to_string()),
                        now,
                    )
                })
                .collect::<LisResult<Vec<_>>>()
        })?;
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired overdue samples");
        }
        Ok(expired)
    }

    pub fn get_sample(&self, id: EntityId) -> LisResult<Sample> {
        self.store.read(|t| t.require::<Sample>(id).cloned())
    }

    /// Pending samples, most urgent first.
    pub fn get_pending_samples(&self) -> Vec<Sample> {
        let mut pending = self.filter(|s| s.collection_status == CollectionStatus::Pending);
        pending.sort_by(queue_order);
        pending
    }

    /// Samples in `status`, newest first.
    pub fn get_samples_by_status(&self, status: CollectionStatus) -> Vec<Sample> {
        let mut samples = self.filter(|s| s.collection_status == status);
        samples.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        samples
    }

    /// Samples of one order, oldest first.
    pub fn get_samples_by_order(&self, order: EntityId) -> Vec<Sample> {
        let mut samples = self.filter(|s| s.order == order);
        samples.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        samples
    }

    /// Groups samples by status, in lifecycle order. Statuses with no samples are omitted.
    pub fn get_collection_stats(&self) -> Vec<CollectionStat> {
        self.store.read(|t| {
            let mut groups: BTreeMap<usize, (CollectionStatus, usize, Vec<f64>)> =
                BTreeMap::new();
            for sample in t.iter::<Sample>() {
                let position = CollectionStatus::all()
                    .iter()
                    .position(|s| *s == sample.collection_status)
                    .unwrap_or(usize::MAX);
                let entry = groups
                    .entry(position)
                    .or_insert_with(|| (sample.collection_status, 0, Vec::new()));
                entry.1 += 1;
                if let Some(minutes) = sample.processing_minutes() {
                    entry.2.push(minutes);
                }
            }

            groups
                .into_values()
                .map(|(status, count, durations)| CollectionStat {
                    status,
                    count,
                    avg_processing_minutes: (!durations.is_empty())
                        .then(|| durations.iter().sum::<f64>() / durations.len() as f64),
                })
                .collect()
        })
    }

    fn filter(&self, keep: impl Fn(&Sample) -> bool) -> Vec<Sample> {
        self.store
            .read(|t| t.iter::<Sample>().filter(|s| keep(s)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::TransitionPolicy;
    use crate::repositories::test_support::Fixture;
    use chrono::Duration;

    #[test]
    fn history_grows_by_one_per_transition() {
        let fx = Fixture::new();
        let sample = fx.sample();
        let samples = &fx.services.samples;

        let steps = [
            CollectionStatus::Collected,
            CollectionStatus::InProcess,
            CollectionStatus::Processing,
            CollectionStatus::Completed,
        ];
        let mut previous = sample.status_history.clone();
        for status in steps {
            let updated = samples
                .update_status(sample.id, status, fx.actor, None)
                .expect("transition");
            assert_eq!(updated.status_history.len(), previous.len() + 1);
            assert_eq!(&updated.status_history[..previous.len()], previous.as_slice());
            previous = updated.status_history;
        }
        assert_eq!(previous.len(), steps.len() + 1);
        assert_eq!(previous[0].notes.as_deref(), Some("Sample created"));
    }

    #[test]
    fn collecting_twice_keeps_first_collection_time() {
        let fx = Fixture::new();
        let sample = fx.sample();
        let samples = &fx.services.samples;

        let first = samples
            .update_status(sample.id, CollectionStatus::Collected, fx.actor, None)
            .expect("collect");
        let second = samples
            .update_status(sample.id, CollectionStatus::Collected, EntityId::new(), None)
            .expect("collect again");

        assert!(first.actual_collection_time.is_some());
        assert_eq!(second.actual_collection_time, first.actual_collection_time);
        assert_eq!(second.collected_by, Some(fx.actor));
        assert_eq!(
            second.expiry_date,
            first
                .actual_collection_time
                .map(|t| t + Duration::days(fx.services.config().sample_expiry_days()))
        );
    }

    #[test]
    fn processing_twice_keeps_first_processor() {
        let fx = Fixture::new();
        let sample = fx.sample();
        let samples = &fx.services.samples;

        for status in [CollectionStatus::Collected, CollectionStatus::InProcess] {
            samples
                .update_status(sample.id, status, fx.actor, None)
                .expect("advance");
        }
        let first = samples
            .update_status(sample.id, CollectionStatus::Processing, fx.actor, None)
            .expect("process");
        let second = samples
            .update_status(sample.id, CollectionStatus::Processing, EntityId::new(), None)
            .expect("process again");

        assert!(first.processing_start_time.is_some());
        assert_eq!(second.processing_start_time, first.processing_start_time);
        assert_eq!(second.processed_by, Some(fx.actor));
    }

    #[test]
    fn collection_moves_pending_order_along() {
        let fx = Fixture::new();
        let sample = fx.sample();
        fx.services
            .samples
            .update_status(sample.id, CollectionStatus::Collected, fx.actor, None)
            .expect("collect");

        let order = fx.services.orders.get_order(sample.order).expect("order");
        assert_eq!(order.status, OrderStatus::SampleCollected);
        assert_eq!(order.collected_by, Some(fx.actor));
    }

    #[test]
    fn sample_tests_must_belong_to_order() {
        let fx = Fixture::new();
        let order = fx.order(vec![fx.cbc.id]);
        let mut new = fx.new_sample(&order);
        new.tests = vec![fx.lipid.id];
        let err = fx
            .services
            .samples
            .create_sample(new, fx.actor)
            .expect_err("foreign test");
        assert!(matches!(err, LisError::InvalidInput(_)));
    }

    #[test]
    fn strict_policy_rejects_skipping_collection() {
        let fx = Fixture::with_policy(TransitionPolicy::Strict);
        let sample = fx.sample();
        let err = fx
            .services
            .samples
            .update_status(sample.id, CollectionStatus::Completed, fx.actor, None)
            .expect_err("pending -> completed");
        assert!(matches!(err, LisError::InvalidTransition { .. }));

        let unchanged = fx.services.samples.get_sample(sample.id).expect("get");
        assert_eq!(unchanged.status_history.len(), 1);
    }

    #[test]
    fn permissive_policy_allows_any_move() {
        let fx = Fixture::new();
        let sample = fx.sample();
        let completed = fx
            .services
            .samples
            .update_status(sample.id, CollectionStatus::Completed, fx.actor, None)
            .expect("permissive");
        assert_eq!(completed.collection_status, CollectionStatus::Completed);
    }

    #[test]
    fn bulk_update_skips_unknown_ids() {
        let fx = Fixture::new();
        let a = fx.sample();
        let b = fx.sample();

        let outcome = fx
            .services
            .samples
            .bulk_update_status(
                &[a.id, b.id, EntityId::new()],
                CollectionStatus::Collected,
                fx.actor,
                Some("round".into()),
            )
            .expect("bulk");
        assert_eq!(outcome, BulkUpdateOutcome { matched: 2, modified: 2 });

        for id in [a.id, b.id] {
            let sample = fx.services.samples.get_sample(id).expect("get");
            assert_eq!(sample.status_history.len(), 2);
            assert!(sample.actual_collection_time.is_some());
        }
    }

    #[test]
    fn strict_bulk_update_is_all_or_nothing() {
        let fx = Fixture::with_policy(TransitionPolicy::Strict);
        let samples = &fx.services.samples;
        let a = fx.sample();
        let b = fx.sample();
        samples
            .update_status(b.id, CollectionStatus::Cancelled, fx.actor, None)
            .expect("cancel b");

        assert!(samples
            .bulk_update_status(&[a.id, b.id], CollectionStatus::Collected, fx.actor, None)
            .is_err());
        let a = samples.get_sample(a.id).expect("get");
        assert_eq!(a.collection_status, CollectionStatus::Pending);
    }

    #[test]
    fn overdue_samples_expire() {
        let fx = Fixture::new();
        let samples = &fx.services.samples;
        let sample = fx.sample();
        samples
            .update_status(sample.id, CollectionStatus::Collected, fx.actor, None)
            .expect("collect");

        let later = Utc::now() + Duration::days(30);
        let expired = samples
            .expire_overdue_samples(later, fx.actor)
            .expect("sweep");
        assert_eq!(expired.len(), 1);
        let last = expired[0].status_history.last().expect("entry");
        assert_eq!(last.status, CollectionStatus::Expired);
        assert_eq!(last.notes.as_deref(), Some(SAMPLE_EXPIRED_NOTE));

        assert!(samples
            .expire_overdue_samples(later, fx.actor)
            .expect("second sweep")
            .is_empty());
    }

    #[test]
    fn pending_queue_is_ordered_by_priority() {
        let fx = Fixture::new();
        let order = fx.order(vec![fx.cbc.id]);
        let mut routine = fx.new_sample(&order);
        routine.priority = SamplePriority::Routine;
        let mut critical = fx.new_sample(&order);
        critical.priority = SamplePriority::Critical;
        let mut stat = fx.new_sample(&order);
        stat.priority = SamplePriority::Stat;

        for new in [routine, critical, stat] {
            fx.services
                .samples
                .create_sample(new, fx.actor)
                .expect("create");
        }

        let queue: Vec<SamplePriority> = fx
            .services
            .samples
            .get_pending_samples()
            .into_iter()
            .map(|s| s.priority)
            .collect();
        assert_eq!(
            queue,
            vec![
                SamplePriority::Critical,
                SamplePriority::Stat,
                SamplePriority::Routine
            ]
        );
    }

    #[test]
    fn stats_average_processing_time() {
        let fx = Fixture::new();
        let samples = &fx.services.samples;
        let done = fx.sample();
        fx.sample();
        samples
            .update_status(done.id, CollectionStatus::Processing, fx.actor, None)
            .expect("start");
        samples
            .update_status(done.id, CollectionStatus::Completed, fx.actor, None)
            .expect("finish");

        let stats = samples.get_collection_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].status, CollectionStatus::Pending);
        assert_eq!(stats[0].count, 1);
        assert_eq!(stats[0].avg_processing_minutes, None);
        assert_eq!(stats[1].status, CollectionStatus::Completed);
        assert!(stats[1].avg_processing_minutes.is_some());
    }
}
