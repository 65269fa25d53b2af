//! Local order cache.
//!
//! The terminal's working view of the venue's active orders. Mutated by
//! the sync agent only; reads come from the UI layer.

use dashmap::DashMap;
use shared::Order;

#[derive(Debug, Default)]
pub struct LocalOrderCache {
    orders: DashMap<String, Order>,
}

impl LocalOrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.get(order_id).map(|e| e.value().clone())
    }

    pub fn upsert(&self, order: Order) {
        self.orders.insert(order.order_id.clone(), order);
    }

    /// Delta update: drop the entity without any network call.
    pub fn remove(&self, order_id: &str) -> Option<Order> {
        self.orders.remove(order_id).map(|(_, o)| o)
    }

    /// Replace the whole view with the server's (full refresh).
    pub fn replace_all(&self, orders: Vec<Order>) {
        self.orders.clear();
        for order in orders {
            self.orders.insert(order.order_id.clone(), order);
        }
    }

    pub fn all(&self) -> Vec<Order> {
        self.orders.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_all_drops_stale_entries() {
        let cache = LocalOrderCache::new();
        cache.upsert(Order::new("v1", None));
        let kept = Order::new("v1", None);
        let kept_id = kept.order_id.clone();

        cache.replace_all(vec![kept]);

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&kept_id).is_some());
    }
}
