//! AddItems mutation.
//!
//! Adds items to an existing order, snapshotting price and routing tags
//! from the catalog at add time. Items added after a send are created
//! un-sent, so the next send flushes only the delta.

use std::collections::HashMap;

use shared::{NewItemInput, Order, OrderEventKind, OrderItem, OrderStatus};

use crate::effects::MenuItemInfo;
use crate::orders::error::{OrderError, OrderResult};
use crate::orders::money;

use super::{MutationCtx, OrderMutation};

pub struct AddItemsOp {
    pub items: Vec<NewItemInput>,
    /// Catalog snapshots resolved by the service before the lock was taken
    pub catalog_info: HashMap<String, MenuItemInfo>,
}

impl OrderMutation for AddItemsOp {
    fn name(&self) -> &'static str {
        "add_items"
    }

    fn validate(&self, order: &Order) -> OrderResult<()> {
        match order.status {
            OrderStatus::Draft | OrderStatus::InProgress | OrderStatus::Sent => {}
            status => {
                return Err(OrderError::InvalidTransition {
                    status,
                    operation: "add items to",
                });
            }
        }
        if self.items.is_empty() {
            return Err(OrderError::InvalidOperation("no items to add".to_string()));
        }
        for input in &self.items {
            if !self.catalog_info.contains_key(&input.menu_item_id) {
                return Err(OrderError::UnknownMenuItem(input.menu_item_id.clone()));
            }
        }
        Ok(())
    }

    fn apply(&self, order: &mut Order, ctx: &MutationCtx) -> OrderResult<Vec<OrderEventKind>> {
        for input in &self.items {
            let info = self
                .catalog_info
                .get(&input.menu_item_id)
                .expect("validated above");

            order.items.push(OrderItem {
                item_id: uuid::Uuid::new_v4().to_string(),
                menu_item_id: info.menu_item_id.clone(),
                name: info.name.clone(),
                quantity: input.quantity,
                unit_price: info.price,
                modifiers: input
                    .modifiers
                    .iter()
                    .cloned()
                    .map(shared::ModifierInput::into_selection)
                    .collect(),
                seat: input.seat,
                course: input.course,
                tags: info.tags.clone(),
                category_tags: info.category_tags.clone(),
                class: info.class,
                sent: false,
                status: shared::ItemStatus::Queued,
                voided: false,
                void_reason: None,
                note: input.note.clone(),
                client_ref: input.client_ref.clone(),
                added_at: ctx.now,
            });
        }

        // A sent order with fresh items goes back to in-progress until the
        // next send flushes them
        order.status = OrderStatus::InProgress;

        money::recalculate_totals(order, ctx.tax_rate);

        Ok(vec![OrderEventKind::OrderTotalsUpdated {
            subtotal: order.subtotal,
            total: order.total,
        }])
    }
}
