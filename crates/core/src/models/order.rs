//! Test orders.
//!
//! An order snapshots the patient's name/MRN and each test's name, code and price at creation
//! time. Later catalog or demographic edits do not flow back into existing orders.

use crate::lifecycle::{status_strings, OrderStatus};
use chrono::{DateTime, Utc};
use lis_uuid::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Refunded,
}

status_strings!(PaymentStatus {
    Pending => "pending",
    Partial => "partial",
    Paid => "paid",
    Refunded => "refunded",
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPriority {
    #[default]
    Routine,
    Urgent,
    Stat,
}

status_strings!(OrderPriority {
    Routine => "routine",
    Urgent => "urgent",
    Stat => "stat",
});

/// Snapshot of one catalog test at order time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub test: EntityId,
    pub test_name: String,
    pub test_code: String,
    pub price: f64,
    pub quantity: u32,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: EntityId,
    pub order_number: String,
    pub patient: EntityId,
    pub patient_name: String,
    pub patient_mrn: String,
    pub tests: Vec<EntityId>,
    pub order_items: Vec<OrderItem>,
    pub total_amount: f64,
    pub discount_amount: f64,
    pub final_amount: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub priority: OrderPriority,
    #[serde(default)]
    pub notes: Option<String>,
    pub ordered_by: EntityId,
    #[serde(default)]
    pub sample_collected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub collected_by: Option<EntityId>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_by: Option<EntityId>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Recomputes `total_amount` from the item snapshots and `final_amount` from the discount.
    pub fn recompute_totals(&mut self) {
        self.total_amount = self.order_items.iter().map(OrderItem::line_total).sum();
        self.final_amount = self.total_amount - self.discount_amount;
    }

    /// Sets a new discount against the current total.
    pub fn apply_discount(&mut self, discount: f64) {
        self.discount_amount = discount;
        self.final_amount = self.total_amount - self.discount_amount;
    }

    /// Sets `status` and the transition's side fields.
    ///
    /// Side fields are written once: re-entering a status keeps the original timestamp and
    /// actor. The caller is responsible for checking the move is legal.
    pub fn apply_status(&mut self, status: OrderStatus, actor: EntityId, at: DateTime<Utc>) {
        match status {
            OrderStatus::SampleCollected => {
                if self.sample_collected_at.is_none() {
                    self.sample_collected_at = Some(at);
                    self.collected_by = Some(actor);
                }
            }
            OrderStatus::Completed => {
                if self.completed_at.is_none() {
                    self.completed_at = Some(at);
                }
            }
            OrderStatus::Cancelled => {
                if self.cancelled_at.is_none() {
                    self.cancelled_at = Some(at);
                    self.cancelled_by = Some(actor);
                }
            }
            OrderStatus::Pending | OrderStatus::Processing => {}
        }
        self.status = status;
        self.updated_at = at;
    }
}
