//! Reopen mutation.
//!
//! Takes a paid order back into the mutable lifecycle. The existing
//! payments stay on the order as history; the table claim is re-asserted
//! at commit time and fails if another order took the table meanwhile.

use shared::{Order, OrderEventKind, OrderStatus};

use crate::orders::error::{OrderError, OrderResult};

use super::{MutationCtx, OrderMutation};

pub struct ReopenOrderOp {
    pub actor_id: String,
    pub reason: String,
}

impl OrderMutation for ReopenOrderOp {
    fn name(&self) -> &'static str {
        "reopen"
    }

    fn validate(&self, order: &Order) -> OrderResult<()> {
        match order.status {
            OrderStatus::Paid => Ok(()),
            status => Err(OrderError::InvalidTransition {
                status,
                operation: "reopen",
            }),
        }
    }

    fn apply(&self, order: &mut Order, ctx: &MutationCtx) -> OrderResult<Vec<OrderEventKind>> {
        order.status = OrderStatus::InProgress;
        order.reopened_at = Some(ctx.now);
        order.closed_at = None;

        tracing::info!(
            order_id = %order.order_id,
            actor_id = %self.actor_id,
            reason = %self.reason,
            "Order reopened"
        );

        Ok(vec![OrderEventKind::OrderReopened {
            actor_id: self.actor_id.clone(),
        }])
    }
}
