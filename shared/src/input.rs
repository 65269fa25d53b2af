//! Validated wire inputs submitted by terminals.
//!
//! Inputs never carry money the server trusts: prices and routing tags are
//! resolved through the catalog at add time, and totals are recomputed
//! server-side from the full item set on every mutation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One item a terminal wants added to an order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewItemInput {
    #[validate(length(min = 1))]
    pub menu_item_id: String,
    #[validate(range(min = 1))]
    pub quantity: u32,
    #[serde(default)]
    pub modifiers: Vec<ModifierInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Client-generated id used to reconcile crash-recovered buffers against
    /// the server's authoritative item list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<String>,
}

/// A modifier selection as submitted. Price deltas are kept (modifier
/// pricing is per-selection), but they only ever enter totals through the
/// server-side recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierInput {
    pub name: String,
    #[serde(default)]
    pub price_delta: Decimal,
    #[serde(default)]
    pub children: Vec<ModifierInput>,
}

impl ModifierInput {
    pub fn into_selection(self) -> crate::order::ModifierSelection {
        crate::order::ModifierSelection {
            name: self.name,
            price_delta: self.price_delta,
            children: self
                .children
                .into_iter()
                .map(ModifierInput::into_selection)
                .collect(),
        }
    }
}

/// A payment attempt.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaymentInput {
    /// Client-supplied idempotency key, unique per order
    #[validate(length(min = 1))]
    pub idempotency_key: String,
    #[validate(length(min = 1))]
    pub method: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate as _;

    #[test]
    fn zero_quantity_is_rejected() {
        let input = NewItemInput {
            menu_item_id: "m1".to_string(),
            quantity: 0,
            modifiers: vec![],
            seat: None,
            course: None,
            note: None,
            client_ref: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn empty_idempotency_key_is_rejected() {
        let input = PaymentInput {
            idempotency_key: String::new(),
            method: "CASH".to_string(),
            amount: Decimal::new(4200, 2),
            tip: None,
        };
        assert!(input.validate().is_err());
    }
}
