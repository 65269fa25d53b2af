//! VoidItem mutation.
//!
//! Partial void: one item is struck and totals recomputed. The order keeps
//! its status unless the void empties it, in which case the whole order is
//! voided and the table released.

use shared::{Order, OrderEventKind, OrderStatus};

use crate::orders::error::{OrderError, OrderResult};
use crate::orders::money;

use super::{MutationCtx, OrderMutation};

pub struct VoidItemOp {
    pub item_id: String,
    pub reason: String,
    pub approver_id: String,
}

impl OrderMutation for VoidItemOp {
    fn name(&self) -> &'static str {
        "void_item"
    }

    fn validate(&self, order: &Order) -> OrderResult<()> {
        match order.status {
            OrderStatus::Paid | OrderStatus::Voided => Err(OrderError::InvalidTransition {
                status: order.status,
                operation: "void an item on",
            }),
            _ => {
                let item = order
                    .item(&self.item_id)
                    .ok_or_else(|| OrderError::ItemNotFound(self.item_id.clone()))?;
                if item.voided {
                    return Err(OrderError::InvalidOperation(format!(
                        "item {} is already voided",
                        self.item_id
                    )));
                }
                Ok(())
            }
        }
    }

    fn apply(&self, order: &mut Order, ctx: &MutationCtx) -> OrderResult<Vec<OrderEventKind>> {
        let item = order
            .item_mut(&self.item_id)
            .ok_or_else(|| OrderError::ItemNotFound(self.item_id.clone()))?;
        item.voided = true;
        item.void_reason = Some(self.reason.clone());

        money::recalculate_totals(order, ctx.tax_rate);

        if order.live_items().next().is_none() {
            // Nothing left on the check; the whole order is void
            order.status = OrderStatus::Voided;
            order.closed_at = Some(ctx.now);
            order.void_reason = Some(self.reason.clone());
            order.void_approver_id = Some(self.approver_id.clone());
            return Ok(vec![OrderEventKind::OrderVoided {
                reason: Some(self.reason.clone()),
            }]);
        }

        Ok(vec![OrderEventKind::OrderTotalsUpdated {
            subtotal: order.subtotal,
            total: order.total,
        }])
    }
}
