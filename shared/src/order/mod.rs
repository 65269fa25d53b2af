//! The order aggregate.
//!
//! An [`Order`] is the single root entity for one check or tab. It owns its
//! items and payments outright; nothing else mutates them. Every successful
//! mutation bumps `version` by exactly one, which is what lets a terminal
//! holding a stale copy be rejected instead of silently overwriting newer
//! state.

mod item;
mod payment;

pub use item::{ItemClass, ItemStatus, ModifierSelection, OrderItem};
pub use payment::Payment;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// `Draft → InProgress → Sent → Paid`, with `Voided` reachable from any
/// non-paid state. Reopening a paid order returns it to `InProgress`;
/// there is no separate terminal status for it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Draft,
    InProgress,
    Sent,
    Paid,
    Voided,
}

impl OrderStatus {
    /// Whether an order in this status still claims its table.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            OrderStatus::Draft | OrderStatus::InProgress | OrderStatus::Sent
        )
    }
}

/// Reference to the physical table an order sits on. `None` on the order
/// means a bar tab with no table claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableRef {
    pub table_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
}

/// Order aggregate root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Order ID (assigned by server)
    pub order_id: String,
    /// Owning venue
    pub venue_id: String,
    /// Table claim; `None` for tabs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_ref: Option<TableRef>,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Monotonic mutation counter; +1 per committed mutation, never skipped
    pub version: u64,
    /// Items, in add order
    pub items: Vec<OrderItem>,
    /// Accepted payments
    pub payments: Vec<Payment>,
    /// Sum of live item line totals
    pub subtotal: Decimal,
    /// Tax on the subtotal
    pub tax: Decimal,
    /// Sum of payment tips
    pub tip: Decimal,
    /// subtotal + tax
    pub total: Decimal,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reopened_at: Option<i64>,
    pub updated_at: i64,
    /// Set on orders produced by a split
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub void_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub void_approver_id: Option<String>,
}

impl Order {
    /// Create a fresh draft order at version 1.
    pub fn new(venue_id: impl Into<String>, table_ref: Option<TableRef>) -> Self {
        let now = crate::now_millis();
        Self {
            order_id: uuid::Uuid::new_v4().to_string(),
            venue_id: venue_id.into(),
            table_ref,
            status: OrderStatus::Draft,
            version: 1,
            items: Vec::new(),
            payments: Vec::new(),
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            tip: Decimal::ZERO,
            total: Decimal::ZERO,
            created_at: now,
            sent_at: None,
            paid_at: None,
            closed_at: None,
            reopened_at: None,
            updated_at: now,
            parent_order_id: None,
            void_reason: None,
            void_approver_id: None,
        }
    }

    /// Whether the order still claims its table (draft, in progress or sent).
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_paid(&self) -> bool {
        self.status == OrderStatus::Paid
    }

    pub fn is_voided(&self) -> bool {
        self.status == OrderStatus::Voided
    }

    /// Items that have not been voided.
    pub fn live_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|i| !i.voided)
    }

    /// Live items not yet flushed to the kitchen.
    pub fn unsent_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.live_items().filter(|i| !i.sent)
    }

    pub fn item(&self, item_id: &str) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    pub fn item_mut(&mut self, item_id: &str) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|i| i.item_id == item_id)
    }

    /// Look up a payment by its client-supplied idempotency key.
    pub fn payment_by_key(&self, idempotency_key: &str) -> Option<&Payment> {
        self.payments
            .iter()
            .find(|p| p.idempotency_key == idempotency_key)
    }
}
