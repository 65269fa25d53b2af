//! Mutation implementations, one file per operation.
//!
//! Each operation implements [`OrderMutation`]: `validate` is the state
//! machine guard, `apply` changes the aggregate and names the events to
//! broadcast. The service pipeline supplies locking, version discipline,
//! commit and dispatch around them, so an op file contains only the
//! operation's own rules.

use rust_decimal::Decimal;
use shared::{Order, OrderEventKind};

use super::error::OrderResult;

mod add_items;
mod pay_order;
mod reopen_order;
pub mod send_order;
mod void_item;
mod void_order;

pub use add_items::AddItemsOp;
pub use pay_order::PayOrderOp;
pub use reopen_order::ReopenOrderOp;
pub use send_order::SendOrderOp;
pub use void_item::VoidItemOp;
pub use void_order::VoidOrderOp;

/// Context handed to every mutation.
#[derive(Debug, Clone, Copy)]
pub struct MutationCtx {
    /// Wall clock at pipeline entry, epoch millis
    pub now: i64,
    /// Venue tax rate applied when totals are recomputed
    pub tax_rate: Decimal,
}

/// One mutation of an existing order.
pub trait OrderMutation: Send + Sync {
    /// Operation name for logs and error messages.
    fn name(&self) -> &'static str;

    /// State-machine guard; runs under the row lock before anything mutates.
    fn validate(&self, order: &Order) -> OrderResult<()>;

    /// Apply the change and name the events to broadcast after commit.
    /// Ops that touch money recompute totals here, so emitted event
    /// payloads always reflect the post-mutation aggregate.
    fn apply(&self, order: &mut Order, ctx: &MutationCtx) -> OrderResult<Vec<OrderEventKind>>;
}
