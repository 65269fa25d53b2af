//! Order items and modifier selections.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Coarse catalog class, used as the routing fallback when an item carries
/// no tags of its own and its category carries none either.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemClass {
    Food,
    Drink,
    #[default]
    Other,
}

/// Preparation status of a single item on a station display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    #[default]
    Queued,
    InProgress,
    Ready,
    Served,
    Bumped,
}

/// A selected modifier. Selections nest (a "burger" modifier group can carry
/// its own "no onion" children), and order matters for ticket rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModifierSelection {
    pub name: String,
    /// Price adjustment for this selection, snapshotted at add time
    pub price_delta: Decimal,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ModifierSelection>,
}

impl ModifierSelection {
    /// Price contribution of this selection including nested children.
    pub fn total_delta(&self) -> Decimal {
        self.price_delta
            + self
                .children
                .iter()
                .map(ModifierSelection::total_delta)
                .sum::<Decimal>()
    }
}

/// A line on an order. Money values are snapshots taken when the item was
/// added; later catalog price changes never touch them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub item_id: String,
    pub menu_item_id: String,
    pub name: String,
    pub quantity: u32,
    /// Unit price snapshot at add time (immutable)
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<ModifierSelection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<u32>,
    /// Explicit routing tags from the catalog item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Routing tags inherited from the catalog category, snapshotted at add time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category_tags: Vec<String>,
    #[serde(default)]
    pub class: ItemClass,
    /// Whether this item has been flushed to the kitchen
    #[serde(default)]
    pub sent: bool,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub voided: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub void_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Client-generated reference for crash-recovery reconciliation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<String>,
    pub added_at: i64,
}

impl OrderItem {
    /// Line total: (unit price + modifier deltas) × quantity.
    pub fn line_total(&self) -> Decimal {
        let per_unit = self.unit_price
            + self
                .modifiers
                .iter()
                .map(ModifierSelection::total_delta)
                .sum::<Decimal>();
        per_unit * Decimal::from(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: Decimal, quantity: u32, modifiers: Vec<ModifierSelection>) -> OrderItem {
        OrderItem {
            item_id: "i1".to_string(),
            menu_item_id: "m1".to_string(),
            name: "Margherita".to_string(),
            quantity,
            unit_price: price,
            modifiers,
            seat: None,
            course: None,
            tags: vec![],
            category_tags: vec![],
            class: ItemClass::Food,
            sent: false,
            status: ItemStatus::Queued,
            voided: false,
            void_reason: None,
            note: None,
            client_ref: None,
            added_at: 0,
        }
    }

    #[test]
    fn line_total_multiplies_by_quantity() {
        let i = item(Decimal::new(1250, 2), 3, vec![]);
        assert_eq!(i.line_total(), Decimal::new(3750, 2));
    }

    #[test]
    fn nested_modifier_deltas_count_once_per_unit() {
        let modifiers = vec![ModifierSelection {
            name: "extra cheese".to_string(),
            price_delta: Decimal::new(150, 2),
            children: vec![ModifierSelection {
                name: "buffalo".to_string(),
                price_delta: Decimal::new(50, 2),
                children: vec![],
            }],
        }];
        let i = item(Decimal::new(1000, 2), 2, modifiers);
        // (10.00 + 1.50 + 0.50) * 2
        assert_eq!(i.line_total(), Decimal::new(2400, 2));
    }
}
