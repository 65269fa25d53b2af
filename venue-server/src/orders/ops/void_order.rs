//! VoidOrder mutation.

use shared::{Order, OrderEventKind, OrderStatus};

use crate::orders::error::{OrderError, OrderResult};

use super::{MutationCtx, OrderMutation};

pub struct VoidOrderOp {
    pub reason: String,
    pub approver_id: String,
}

impl OrderMutation for VoidOrderOp {
    fn name(&self) -> &'static str {
        "void"
    }

    fn validate(&self, order: &Order) -> OrderResult<()> {
        match order.status {
            OrderStatus::Paid | OrderStatus::Voided => Err(OrderError::InvalidTransition {
                status: order.status,
                operation: "void",
            }),
            _ => Ok(()),
        }
    }

    fn apply(&self, order: &mut Order, ctx: &MutationCtx) -> OrderResult<Vec<OrderEventKind>> {
        order.status = OrderStatus::Voided;
        order.closed_at = Some(ctx.now);
        order.void_reason = Some(self.reason.clone());
        order.void_approver_id = Some(self.approver_id.clone());

        Ok(vec![OrderEventKind::OrderVoided {
            reason: Some(self.reason.clone()),
        }])
    }
}
