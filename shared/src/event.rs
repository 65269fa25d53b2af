//! Domain events broadcast after each committed mutation.
//!
//! Delivery is at-most-once and never replayed: a subscriber that is down
//! during a publish misses that event for good and reconciles with a full
//! refresh on reconnect. Events therefore carry enough scope (venue plus
//! station tags) for topic routing, but they are notifications, not a log.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::routing::RoutingManifest;

/// Subscription topic. Terminals subscribe to their venue, station displays
/// to their tags, and targeted messages address a single terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Topic {
    Venue(String),
    Station(String),
    Terminal(String),
}

/// What happened to an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventKind {
    OrderCreated {
        #[serde(skip_serializing_if = "Option::is_none")]
        table_id: Option<String>,
    },
    OrderTotalsUpdated {
        subtotal: Decimal,
        total: Decimal,
    },
    OrderSent {
        manifest: RoutingManifest,
    },
    PaymentProcessed {
        payment_id: String,
        amount: Decimal,
    },
    OrderVoided {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    OrderReopened {
        actor_id: String,
    },
}

/// A committed order mutation, as seen by subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderEvent {
    pub event_id: String,
    pub venue_id: String,
    pub order_id: String,
    /// Order version after the mutation that produced this event
    pub version: u64,
    pub timestamp: i64,
    /// Station tags this event should be mirrored to (order-sent only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub station_tags: Vec<String>,
    #[serde(flatten)]
    pub kind: OrderEventKind,
}

impl OrderEvent {
    pub fn new(
        venue_id: impl Into<String>,
        order_id: impl Into<String>,
        version: u64,
        kind: OrderEventKind,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            venue_id: venue_id.into(),
            order_id: order_id.into(),
            version,
            timestamp: crate::now_millis(),
            station_tags: Vec::new(),
            kind,
        }
    }

    pub fn with_station_tags(mut self, tags: Vec<String>) -> Self {
        self.station_tags = tags;
        self
    }

    /// Removal-class events: a terminal drops the order from local state
    /// directly, with no refetch.
    pub fn is_removal(&self) -> bool {
        matches!(
            self.kind,
            OrderEventKind::PaymentProcessed { .. } | OrderEventKind::OrderVoided { .. }
        )
    }

    /// Topics this event is published under.
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics = vec![Topic::Venue(self.venue_id.clone())];
        topics.extend(self.station_tags.iter().cloned().map(Topic::Station));
        topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_classification() {
        let paid = OrderEvent::new(
            "v1",
            "o1",
            3,
            OrderEventKind::PaymentProcessed {
                payment_id: "p1".to_string(),
                amount: Decimal::new(4200, 2),
            },
        );
        let voided = OrderEvent::new("v1", "o1", 4, OrderEventKind::OrderVoided { reason: None });
        let created = OrderEvent::new("v1", "o1", 1, OrderEventKind::OrderCreated { table_id: None });

        assert!(paid.is_removal());
        assert!(voided.is_removal());
        assert!(!created.is_removal());
    }

    #[test]
    fn topics_cover_venue_and_station_tags() {
        let event = OrderEvent::new("v1", "o1", 2, OrderEventKind::OrderCreated { table_id: None })
            .with_station_tags(vec!["kitchen".to_string(), "bar".to_string()]);
        let topics = event.topics();
        assert!(topics.contains(&Topic::Venue("v1".to_string())));
        assert!(topics.contains(&Topic::Station("kitchen".to_string())));
        assert!(topics.contains(&Topic::Station("bar".to_string())));
    }
}
