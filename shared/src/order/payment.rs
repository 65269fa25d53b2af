//! Payment records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One accepted charge against an order.
///
/// Created exactly once per accepted attempt: the `idempotency_key` is
/// client-supplied and unique per order, and a repeated request bearing a
/// key the order has already seen returns this record unchanged instead of
/// charging again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub payment_id: String,
    pub idempotency_key: String,
    /// Payment method, e.g. "CASH" or "CARD"
    pub method: String,
    pub amount: Decimal,
    #[serde(default)]
    pub tip: Decimal,
    pub created_at: i64,
}

impl Payment {
    pub fn new(
        idempotency_key: impl Into<String>,
        method: impl Into<String>,
        amount: Decimal,
        tip: Decimal,
    ) -> Self {
        Self {
            payment_id: uuid::Uuid::new_v4().to_string(),
            idempotency_key: idempotency_key.into(),
            method: method.into(),
            amount,
            tip,
            created_at: crate::now_millis(),
        }
    }
}
