//! Routing engine: items → station manifests.
//!
//! Pure function over the items being flushed and the configured stations.
//! No IO, no clock, no station liveness — failover to a backup station is a
//! delivery-time concern and lives in the dispatcher, never here.
//!
//! # Tag resolution
//!
//! Strict precedence per item:
//!
//! 1. explicit tags on the item
//! 2. tags inherited from its catalog category
//! 3. class fallback: food → `kitchen`, drink → `bar`
//!
//! The resolved set is matched against every station's tag set; any overlap
//! routes the item there, and an item may land on several stations at once.
//! Expo stations receive every item unconditionally. Items matching nothing
//! go to the manifest's `unrouted` list so the caller can raise a
//! configuration warning instead of silently dropping them.

use shared::{ItemClass, OrderItem, RoutingManifest, Station, StationTicket};

/// Fallback tag for untagged food items.
pub const DEFAULT_KITCHEN_TAG: &str = "kitchen";
/// Fallback tag for untagged drink items.
pub const DEFAULT_BAR_TAG: &str = "bar";

/// Resolve the routing tags for one item, applying the precedence chain.
pub fn resolve_tags(item: &OrderItem) -> Vec<String> {
    if !item.tags.is_empty() {
        return item.tags.clone();
    }
    if !item.category_tags.is_empty() {
        return item.category_tags.clone();
    }
    match item.class {
        ItemClass::Food => vec![DEFAULT_KITCHEN_TAG.to_string()],
        ItemClass::Drink => vec![DEFAULT_BAR_TAG.to_string()],
        ItemClass::Other => vec![],
    }
}

/// Map the given items onto the configured stations.
///
/// `items` is the delta being flushed by this send; reference entries on
/// `show_reference_items` stations are drawn from the same delta (items
/// routed elsewhere in it), so every ticket is self-contained.
pub fn resolve_routing(order_id: &str, items: &[OrderItem], stations: &[Station]) -> RoutingManifest {
    let mut tickets: Vec<StationTicket> = stations
        .iter()
        .map(|s| StationTicket {
            station_id: s.station_id.clone(),
            station_name: s.name.clone(),
            item_ids: Vec::new(),
            reference_item_ids: Vec::new(),
        })
        .collect();
    let mut unrouted = Vec::new();

    for item in items {
        let tags = resolve_tags(item);
        let mut routed = false;

        for (station, ticket) in stations.iter().zip(tickets.iter_mut()) {
            if station.is_expo || station.serves_any(&tags) {
                ticket.item_ids.push(item.item_id.clone());
                routed = true;
            }
        }

        if !routed {
            unrouted.push(item.item_id.clone());
        }
    }

    // Reference entries: whatever the delta routed somewhere, minus what the
    // station already prepares itself
    for (station, ticket) in stations.iter().zip(tickets.iter_mut()) {
        if !station.show_reference_items {
            continue;
        }
        ticket.reference_item_ids = items
            .iter()
            .map(|i| i.item_id.clone())
            .filter(|id| !ticket.item_ids.contains(id) && !unrouted.contains(id))
            .collect();
    }

    // Drop stations this send never touched
    tickets.retain(|t| !t.item_ids.is_empty() || !t.reference_item_ids.is_empty());

    RoutingManifest {
        order_id: order_id.to_string(),
        tickets,
        unrouted,
    }
}
