//! Pay mutation.
//!
//! Idempotency-key replay is handled by the service *before* this op runs
//! (a replayed key returns the original payment without re-entering the
//! pipeline), so by the time `validate` sees the order, the key is new.

use rust_decimal::Decimal;
use shared::{Order, OrderEventKind, OrderStatus, Payment, PaymentInput};

use crate::orders::error::{OrderError, OrderResult};

use super::{MutationCtx, OrderMutation};

pub struct PayOrderOp {
    pub input: PaymentInput,
}

impl OrderMutation for PayOrderOp {
    fn name(&self) -> &'static str {
        "pay"
    }

    fn validate(&self, order: &Order) -> OrderResult<()> {
        match order.status {
            OrderStatus::InProgress | OrderStatus::Sent => {}
            OrderStatus::Paid => {
                // Double-submit under a *different* key
                let payment_id = order
                    .payments
                    .last()
                    .map(|p| p.payment_id.clone())
                    .unwrap_or_default();
                return Err(OrderError::AlreadyPaid {
                    order_id: order.order_id.clone(),
                    payment_id,
                });
            }
            status => {
                return Err(OrderError::InvalidTransition {
                    status,
                    operation: "pay",
                });
            }
        }

        if self.input.amount <= Decimal::ZERO {
            return Err(OrderError::InvalidAmount(
                "payment amount must be positive".to_string(),
            ));
        }
        if self.input.amount < order.total {
            return Err(OrderError::InvalidAmount(format!(
                "payment {} does not cover total {}",
                self.input.amount, order.total
            )));
        }
        if let Some(tip) = self.input.tip
            && tip < Decimal::ZERO
        {
            return Err(OrderError::InvalidAmount("tip cannot be negative".to_string()));
        }
        Ok(())
    }

    fn apply(&self, order: &mut Order, ctx: &MutationCtx) -> OrderResult<Vec<OrderEventKind>> {
        let payment = Payment::new(
            self.input.idempotency_key.clone(),
            self.input.method.clone(),
            self.input.amount,
            self.input.tip.unwrap_or(Decimal::ZERO),
        );
        let payment_id = payment.payment_id.clone();
        let amount = payment.amount;

        order.payments.push(payment);
        order.tip = order.payments.iter().map(|p| p.tip).sum();
        order.status = OrderStatus::Paid;
        order.paid_at = Some(ctx.now);
        order.closed_at = Some(ctx.now);

        Ok(vec![OrderEventKind::PaymentProcessed { payment_id, amount }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> MutationCtx {
        MutationCtx {
            now: 1_700_000_000_000,
            tax_rate: Decimal::ZERO,
        }
    }

    fn payment(amount_cents: i64) -> PaymentInput {
        PaymentInput {
            idempotency_key: "key-1".to_string(),
            method: "CASH".to_string(),
            amount: Decimal::new(amount_cents, 2),
            tip: None,
        }
    }

    fn payable_order(total_cents: i64) -> Order {
        let mut order = Order::new("venue-1", None);
        order.status = OrderStatus::InProgress;
        order.total = Decimal::new(total_cents, 2);
        order
    }

    #[test]
    fn full_payment_closes_the_order() {
        let mut order = payable_order(4200);
        let op = PayOrderOp {
            input: payment(4200),
        };

        op.validate(&order).unwrap();
        let kinds = op.apply(&mut order, &ctx()).unwrap();

        assert_eq!(order.status, OrderStatus::Paid);
        assert!(order.paid_at.is_some());
        assert!(order.closed_at.is_some());
        assert_eq!(order.payments.len(), 1);
        assert!(matches!(
            kinds.as_slice(),
            [OrderEventKind::PaymentProcessed { .. }]
        ));
    }

    #[test]
    fn underpayment_is_rejected() {
        let order = payable_order(4200);
        let op = PayOrderOp {
            input: payment(4000),
        };
        assert!(matches!(
            op.validate(&order),
            Err(OrderError::InvalidAmount(_))
        ));
    }

    #[test]
    fn paying_a_paid_order_reports_already_paid() {
        let mut order = payable_order(4200);
        order.status = OrderStatus::Paid;
        order.payments.push(Payment::new(
            "earlier-key",
            "CARD",
            Decimal::new(4200, 2),
            Decimal::ZERO,
        ));

        let op = PayOrderOp {
            input: payment(4200),
        };
        match op.validate(&order) {
            Err(OrderError::AlreadyPaid { payment_id, .. }) => {
                assert_eq!(payment_id, order.payments[0].payment_id);
            }
            other => panic!("expected AlreadyPaid, got {other:?}"),
        }
    }

    #[test]
    fn paying_a_voided_order_is_an_invalid_transition() {
        let mut order = payable_order(4200);
        order.status = OrderStatus::Voided;
        let op = PayOrderOp {
            input: payment(4200),
        };
        assert!(matches!(
            op.validate(&order),
            Err(OrderError::InvalidTransition { .. })
        ));
    }
}
