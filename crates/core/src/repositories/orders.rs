//! Order lifecycle.
//!
//! Orders always follow their forward-only transition table, whatever the configured policy.
//! Prices, names and codes are copied from the catalog when a test is added to an order.

use super::test_catalog::resolve_tests;
use crate::config::CoreConfig;
use crate::constants::ORDER_NUMBER_PREFIX;
use crate::lifecycle::{check_transition, Lifecycle, OrderStatus, TransitionPolicy};
use crate::models::{LabTest, Order, OrderItem, OrderPriority, Patient, PaymentStatus};
use crate::store::{LabStore, Transaction};
use crate::validation::{optional_text, validate_amount};
use crate::{LisError, LisResult};
use chrono::{DateTime, Utc};
use lis_uuid::{human_reference, EntityId};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct NewOrder {
    pub patient: EntityId,
    pub tests: Vec<EntityId>,
    pub discount: Option<f64>,
    pub priority: OrderPriority,
    pub notes: Option<String>,
}

/// Count and revenue for one order status.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderStat {
    pub status: OrderStatus,
    pub count: usize,
    /// Sum of `final_amount`.
    pub revenue: f64,
}

fn snapshot_item(test: &LabTest) -> OrderItem {
    OrderItem {
        test: test.id,
        test_name: test.name.clone(),
        test_code: test.code.clone(),
        price: test.price,
        quantity: 1,
    }
}

fn resolve_orderable(tx: &Transaction<'_>, ids: &[EntityId]) -> LisResult<Vec<LabTest>> {
    let tests = resolve_tests(tx.view(), ids)?;
    if let Some(inactive) = tests.iter().find(|t| !t.is_active) {
        return Err(LisError::InvalidInput(format!(
            "test {} is no longer orderable",
            inactive.code
        )));
    }
    Ok(tests)
}

fn check_discount(discount: f64, total: f64) -> LisResult<()> {
    validate_amount("discount", discount)?;
    if discount > total {
        return Err(LisError::InvalidInput(format!(
            "discount {discount} exceeds order total {total}"
        )));
    }
    Ok(())
}

/// Moves an order along its table and fills the transition's side fields.
///
/// Re-applying the current status is accepted, except on a terminal order.
///
/// # Errors
///
/// Returns [`LisError::InvalidTransition`] when the table forbids the move or the order is
/// already completed or cancelled.
pub(crate) fn transition_order(
    order: &mut Order,
    status: OrderStatus,
    actor: EntityId,
    at: DateTime<Utc>,
) -> LisResult<()> {
    if order.status.is_terminal() {
        return Err(LisError::InvalidTransition {
            entity: OrderStatus::ENTITY,
            from: order.status.to_string(),
            to: status.to_string(),
        });
    }
    check_transition(TransitionPolicy::Strict, order.status, status)?;
    order.apply_status(status, actor, at);
    Ok(())
}

#[derive(Clone)]
pub struct OrderService {
    cfg: Arc<CoreConfig>,
    store: LabStore,
}

impl OrderService {
    pub fn new(cfg: Arc<CoreConfig>, store: LabStore) -> Self {
        Self { cfg, store }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    fn build_order(tx: &mut Transaction<'_>, new: NewOrder, actor: EntityId) -> LisResult<Order> {
        if new.tests.is_empty() {
            return Err(LisError::InvalidInput(
                "an order needs at least one test".into(),
            ));
        }

        let patient = tx.fetch::<Patient>(new.patient)?;
        if !patient.is_active {
            return Err(LisError::not_found("patient", patient.id));
        }
        let tests = resolve_orderable(tx, &new.tests)?;

        let now = Utc::now();
        let id = EntityId::new();
        let mut order = Order {
            id,
            order_number: human_reference(ORDER_NUMBER_PREFIX, now, &id),
            patient: patient.id,
            patient_name: patient.full_name(),
            patient_mrn: patient.mrn.clone(),
            tests: tests.iter().map(|t| t.id).collect(),
            order_items: tests.iter().map(snapshot_item).collect(),
            total_amount: 0.0,
            discount_amount: 0.0,
            final_amount: 0.0,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            priority: new.priority,
            notes: optional_text(new.notes),
            ordered_by: actor,
            sample_collected_at: None,
            collected_by: None,
            completed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        order.recompute_totals();

        let discount = new.discount.unwrap_or(0.0);
        check_discount(discount, order.total_amount)?;
        order.apply_discount(discount);

        tx.put(order.clone())?;
        Ok(order)
    }

    /// Creates an order with a price snapshot of each requested test.
    ///
    /// # Arguments
    ///
    /// * `new` - Patient, tests and optional discount.
    /// * `actor` - The ordering user.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::NotFound`] if the patient is missing or inactive, or if any test id
    /// does not resolve (every missing id is named). Returns [`LisError::InvalidInput`] for an
    /// empty test list, an inactive test or a discount outside `[0, total]`.
    pub fn create_order(&self, new: NewOrder, actor: EntityId) -> LisResult<Order> {
        let order = self
            .store
            .transaction(|tx| Self::build_order(tx, new, actor))?;
        tracing::info!(
            order = %order.id,
            number = %order.order_number,
            total = order.total_amount,
            "order created"
        );
        Ok(order)
    }

    /// Creates several orders atomically. One failure rejects the whole batch.
    pub fn create_orders_bulk(
        &self,
        orders: Vec<NewOrder>,
        actor: EntityId,
    ) -> LisResult<Vec<Order>> {
        let created = self.store.transaction(|tx| {
            orders
                .into_iter()
                .map(|new| Self::build_order(tx, new, actor))
                .collect::<LisResult<Vec<_>>>()
        })?;
        tracing::info!(count = created.len(), "orders created in bulk");
        Ok(created)
    }

    /// Moves an order to `status`.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::InvalidTransition`] for a backwards move or a move out of
    /// `completed`/`cancelled`.
    pub fn update_order_status(
        &self,
        id: EntityId,
        status: OrderStatus,
        actor: EntityId,
    ) -> LisResult<Order> {
        self.set_status(id, status, actor, None)
    }

    pub fn cancel_order(
        &self,
        id: EntityId,
        actor: EntityId,
        reason: Option<String>,
    ) -> LisResult<Order> {
        self.set_status(id, OrderStatus::Cancelled, actor, optional_text(reason))
    }

    pub fn complete_order(&self, id: EntityId, actor: EntityId) -> LisResult<Order> {
        self.set_status(id, OrderStatus::Completed, actor, None)
    }

    pub fn mark_sample_collected(&self, id: EntityId, actor: EntityId) -> LisResult<Order> {
        self.set_status(id, OrderStatus::SampleCollected, actor, None)
    }

    fn set_status(
        &self,
        id: EntityId,
        status: OrderStatus,
        actor: EntityId,
        reason: Option<String>,
    ) -> LisResult<Order> {
        let order = self.store.transaction(|tx| {
            tx.update::<Order, _>(id, |order| {
                transition_order(order, status, actor, Utc::now())?;
                if status == OrderStatus::Cancelled && order.cancellation_reason.is_none() {
                    order.cancellation_reason = reason;
                }
                Ok(())
            })
        })?;
        tracing::info!(order = %id, status = %status, %actor, "order status updated");
        Ok(order)
    }

    /// Updates payment status and, optionally, the discount.
    ///
    /// The discount is checked against the order's current total as stored, so tests added
    /// since creation are accounted for.
    pub fn update_order_payment(
        &self,
        id: EntityId,
        payment_status: PaymentStatus,
        discount: Option<f64>,
    ) -> LisResult<Order> {
        self.store.transaction(|tx| {
            tx.update::<Order, _>(id, |order| {
                if let Some(discount) = discount {
                    check_discount(discount, order.total_amount)?;
                    order.apply_discount(discount);
                }
                order.payment_status = payment_status;
                order.updated_at = Utc::now();
                Ok(())
            })
        })
    }

    /// Adds tests to a pending order. Tests already on the order are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::StateConflict`] once the order has left `pending`, and
    /// [`LisError::InvalidInput`] if the new total would fall below the current discount.
    pub fn add_order_tests(
        &self,
        id: EntityId,
        tests: Vec<EntityId>,
        actor: EntityId,
    ) -> LisResult<Order> {
        let order = self.store.transaction(|tx| {
            let mut order = tx.fetch::<Order>(id)?;
            if order.status != OrderStatus::Pending {
                return Err(LisError::StateConflict(format!(
                    "tests can only be added while the order is pending (currently {})",
                    order.status
                )));
            }

            let fresh: Vec<EntityId> = tests
                .into_iter()
                .filter(|t| !order.tests.contains(t))
                .collect();
            for test in resolve_orderable(tx, &fresh)? {
                order.tests.push(test.id);
                order.order_items.push(snapshot_item(&test));
            }
            order.recompute_totals();
            check_discount(order.discount_amount, order.total_amount)?;
            order.updated_at = Utc::now();
            tx.put(order.clone())?;
            Ok(order)
        })?;
        tracing::info!(order = %id, %actor, tests = order.tests.len(), "tests added to order");
        Ok(order)
    }

    pub fn get_order(&self, id: EntityId) -> LisResult<Order> {
        self.store.read(|t| t.require::<Order>(id).cloned())
    }

    /// Newest first.
    pub fn list_orders_by_patient(&self, patient: EntityId) -> Vec<Order> {
        self.list(|o| o.patient == patient)
    }

    /// Newest first.
    pub fn list_orders_by_status(&self, status: OrderStatus) -> Vec<Order> {
        self.list(|o| o.status == status)
    }

    fn list(&self, keep: impl Fn(&Order) -> bool) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .store
            .read(|t| t.iter::<Order>().filter(|o| keep(o)).cloned().collect());
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// One entry per status that has at least one order, in lifecycle order.
    pub fn order_stats(&self) -> Vec<OrderStat> {
        self.store.read(|t| {
            OrderStatus::all()
                .iter()
                .filter_map(|status| {
                    let (count, revenue) = t
                        .iter::<Order>()
                        .filter(|o| o.status == *status)
                        .fold((0, 0.0), |(n, sum), o| (n + 1, sum + o.final_amount));
                    (count > 0).then_some(OrderStat {
                        status: *status,
                        count,
                        revenue,
                    })
                })
                .collect()
        })
    }
}
