//! SendToKitchen mutation.
//!
//! Flushes the un-sent delta to the routing engine. Sending is not a
//! one-way door: further items may be added afterwards, and a later send
//! flushes only what arrived since.

use shared::{Order, OrderEventKind, OrderStatus, RoutingManifest, Station};

use crate::orders::error::{OrderError, OrderResult};
use crate::routing;

use super::{MutationCtx, OrderMutation};

pub struct SendOrderOp {
    /// Restrict the flush to these items; `None` flushes every un-sent item
    pub item_ids: Option<Vec<String>>,
    /// Station configuration captured when the op was built
    pub stations: Vec<Station>,
}

impl SendOrderOp {
    /// The un-sent delta this send will flush.
    fn delta_ids(&self, order: &Order) -> OrderResult<Vec<String>> {
        match &self.item_ids {
            None => Ok(order.unsent_items().map(|i| i.item_id.clone()).collect()),
            Some(requested) => {
                let mut ids = Vec::new();
                for id in requested {
                    let item = order
                        .item(id)
                        .ok_or_else(|| OrderError::ItemNotFound(id.clone()))?;
                    // Already-sent or voided items are simply not part of
                    // the delta again
                    if !item.sent && !item.voided {
                        ids.push(id.clone());
                    }
                }
                Ok(ids)
            }
        }
    }
}

impl OrderMutation for SendOrderOp {
    fn name(&self) -> &'static str {
        "send"
    }

    fn validate(&self, order: &Order) -> OrderResult<()> {
        match order.status {
            OrderStatus::InProgress | OrderStatus::Sent => Ok(()),
            status => Err(OrderError::InvalidTransition {
                status,
                operation: "send",
            }),
        }
    }

    fn apply(&self, order: &mut Order, ctx: &MutationCtx) -> OrderResult<Vec<OrderEventKind>> {
        let delta_ids = self.delta_ids(order)?;

        let delta: Vec<_> = order
            .items
            .iter()
            .filter(|i| delta_ids.contains(&i.item_id))
            .cloned()
            .collect();
        let manifest = routing::resolve_routing(&order.order_id, &delta, &self.stations);

        if !manifest.unrouted.is_empty() {
            tracing::warn!(
                order_id = %order.order_id,
                unrouted = ?manifest.unrouted,
                "Items matched no station; check station tag configuration"
            );
        }

        for id in &delta_ids {
            if let Some(item) = order.item_mut(id) {
                item.sent = true;
            }
        }
        if !delta_ids.is_empty() {
            order.sent_at = Some(ctx.now);
        }
        order.status = OrderStatus::Sent;

        Ok(vec![OrderEventKind::OrderSent { manifest }])
    }
}

/// Pull the manifest back out of the emitted event for the caller's
/// response. A send emits exactly one `OrderSent`.
pub fn manifest_from_events(kinds: &[OrderEventKind]) -> RoutingManifest {
    kinds
        .iter()
        .find_map(|k| match k {
            OrderEventKind::OrderSent { manifest } => Some(manifest.clone()),
            _ => None,
        })
        .unwrap_or_default()
}
