//! Server-side money recomputation.
//!
//! Totals are always derived from the full item set on the server; a
//! client-submitted total is never written. Item line values are snapshots
//! taken at add time, so recomputing is a pure fold over the aggregate.

use rust_decimal::Decimal;
use shared::Order;

/// Money is carried to two decimal places everywhere it is stored.
const MONEY_DP: u32 = 2;

/// Recompute subtotal/tax/tip/total from the live item set.
///
/// Voided items contribute nothing. Tip is the sum over accepted payments;
/// it rides on top of the total rather than into it.
pub fn recalculate_totals(order: &mut Order, tax_rate: Decimal) {
    let subtotal: Decimal = order.live_items().map(|i| i.line_total()).sum();
    let subtotal = subtotal.round_dp(MONEY_DP);
    let tax = (subtotal * tax_rate).round_dp(MONEY_DP);

    order.subtotal = subtotal;
    order.tax = tax;
    order.total = subtotal + tax;
    order.tip = order.payments.iter().map(|p| p.tip).sum();
}
