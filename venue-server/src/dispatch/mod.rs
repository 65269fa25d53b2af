//! Event dispatcher: committed mutations → connected subscribers.
//!
//! ```text
//! Order Service ──publish()──▶ EventDispatcher
//!                                  │  topic match (venue / station tag / terminal)
//!                     ┌────────────┼────────────┐
//!                     ▼            ▼            ▼
//!                terminal A    KDS "grill"   terminal B
//! ```
//!
//! Publication happens only after the originating mutation has committed,
//! and the caller never waits on delivery: sends are non-blocking, and a
//! subscriber whose channel is full or gone simply misses the event. There
//! is no replay — reconnecting subscribers reconcile with a full refresh.
//! That gap is a deliberate tradeoff, not a defect; see the sync agent.
//!
//! The one delivery-time decision made here is station failover: an
//! `OrderSent` event aimed at a station whose subscribers have been gone
//! longer than its configured timeout is mirrored to that station's backup.

mod stations;

pub use stations::StationRegistry;

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use shared::{OrderEvent, OrderEventKind, Topic};
use tokio::sync::mpsc;

/// Per-subscriber outbound queue length. A subscriber this far behind is
/// dropped rather than buffered further.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

struct Subscriber {
    topics: Vec<Topic>,
    /// Set when this subscriber is a station display, for liveness tracking
    station_id: Option<String>,
    tx: mpsc::Sender<OrderEvent>,
}

impl Subscriber {
    fn matches(&self, topics: &[Topic]) -> bool {
        self.topics.iter().any(|t| topics.contains(t))
    }
}

/// Topic-scoped fan-out of order events.
#[derive(Clone)]
pub struct EventDispatcher {
    subscribers: Arc<DashMap<String, Subscriber>>,
    stations: Arc<StationRegistry>,
    channel_capacity: usize,
}

impl EventDispatcher {
    pub fn new(stations: Arc<StationRegistry>) -> Self {
        Self::with_capacity(stations, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(stations: Arc<StationRegistry>, channel_capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
            stations,
            channel_capacity,
        }
    }

    pub fn station_registry(&self) -> &Arc<StationRegistry> {
        &self.stations
    }

    /// Register a subscriber for the given topics. A second subscribe under
    /// the same id replaces the first (latest connection wins).
    pub fn subscribe(&self, subscriber_id: &str, topics: Vec<Topic>) -> mpsc::Receiver<OrderEvent> {
        self.subscribe_inner(subscriber_id, topics, None)
    }

    /// Register a station display. Tracks liveness for failover decisions.
    pub fn subscribe_station(
        &self,
        subscriber_id: &str,
        station_id: &str,
        topics: Vec<Topic>,
    ) -> mpsc::Receiver<OrderEvent> {
        self.stations.mark_connected(station_id);
        self.subscribe_inner(subscriber_id, topics, Some(station_id.to_string()))
    }

    fn subscribe_inner(
        &self,
        subscriber_id: &str,
        topics: Vec<Topic>,
        station_id: Option<String>,
    ) -> mpsc::Receiver<OrderEvent> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        tracing::debug!(subscriber = %subscriber_id, topics = ?topics, "Subscriber connected");
        self.subscribers.insert(
            subscriber_id.to_string(),
            Subscriber {
                topics,
                station_id,
                tx,
            },
        );
        rx
    }

    pub fn unsubscribe(&self, subscriber_id: &str) {
        if let Some((_, sub)) = self.subscribers.remove(subscriber_id) {
            if let Some(station_id) = sub.station_id {
                self.stations.mark_disconnected(&station_id);
            }
            tracing::debug!(subscriber = %subscriber_id, "Subscriber disconnected");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Publish one committed event to everyone its topics reach.
    ///
    /// Fire-and-forget relative to the mutation response: non-blocking
    /// sends, at-most-once delivery, no replay.
    pub fn publish(&self, event: &OrderEvent) {
        let mut topics = event.topics();
        self.augment_with_failover(event, &mut topics);
        self.deliver(event, &topics);
    }

    /// Publish to an explicit tag set, ignoring the event's own scope.
    pub fn publish_to_tags(&self, tags: &[String], event: &OrderEvent) {
        let topics: Vec<Topic> = tags.iter().cloned().map(Topic::Station).collect();
        self.deliver(event, &topics);
    }

    /// For `OrderSent` events, mirror tickets aimed at dead stations to
    /// their backups. One hop only: a dead backup drops the ticket to the
    /// (already-logged) unrouted warning path.
    fn augment_with_failover(&self, event: &OrderEvent, topics: &mut Vec<Topic>) {
        let OrderEventKind::OrderSent { manifest } = &event.kind else {
            return;
        };
        let now = shared::now_millis();
        for ticket in &manifest.tickets {
            let Some(station) = self.stations.get(&ticket.station_id) else {
                continue;
            };
            let reachable = station
                .tags
                .iter()
                .any(|tag| self.has_live_subscriber(&Topic::Station(tag.clone())));
            if reachable {
                continue;
            }
            if !self
                .stations
                .dead_longer_than(&station.station_id, station.failover_timeout_ms, now)
            {
                continue;
            }
            let Some(backup_id) = &station.backup_station_id else {
                continue;
            };
            if let Some(backup) = self.stations.get(backup_id) {
                tracing::warn!(
                    station = %station.station_id,
                    backup = %backup.station_id,
                    order_id = %event.order_id,
                    "Station unreachable past failover timeout, mirroring to backup"
                );
                topics.extend(backup.tags.iter().cloned().map(Topic::Station));
            }
        }
    }

    fn has_live_subscriber(&self, topic: &Topic) -> bool {
        self.subscribers
            .iter()
            .any(|entry| entry.value().topics.contains(topic))
    }

    fn deliver(&self, event: &OrderEvent, topics: &[Topic]) {
        // Collect first so each matching subscriber gets exactly one copy
        // even when several topics hit it
        let mut targets: HashSet<String> = HashSet::new();
        for entry in self.subscribers.iter() {
            if entry.value().matches(topics) {
                targets.insert(entry.key().clone());
            }
        }

        let mut gone = Vec::new();
        for id in targets {
            let Some(sub) = self.subscribers.get(&id) else {
                continue;
            };
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // At-most-once: the slow subscriber misses this event
                    // and will reconcile on its next full refresh
                    tracing::warn!(subscriber = %id, event_id = %event.event_id, "Subscriber queue full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    gone.push(id.clone());
                }
            }
        }
        for id in gone {
            tracing::warn!(subscriber = %id, "Subscriber channel closed, removing");
            self.unsubscribe(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{RoutingManifest, Station, StationTicket};

    fn event(venue: &str) -> OrderEvent {
        OrderEvent::new(venue, "o1", 1, OrderEventKind::OrderCreated { table_id: None })
    }

    fn dispatcher_with(stations: Vec<Station>) -> EventDispatcher {
        EventDispatcher::new(Arc::new(StationRegistry::new(stations)))
    }

    #[tokio::test]
    async fn venue_subscribers_receive_their_venue_only() {
        let dispatcher = dispatcher_with(vec![]);
        let mut rx_a = dispatcher.subscribe("term-a", vec![Topic::Venue("v1".to_string())]);
        let mut rx_b = dispatcher.subscribe("term-b", vec![Topic::Venue("v2".to_string())]);

        dispatcher.publish(&event("v1"));

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn one_copy_per_subscriber_even_with_multiple_matching_topics() {
        let dispatcher = dispatcher_with(vec![]);
        let mut rx = dispatcher.subscribe(
            "kds",
            vec![
                Topic::Venue("v1".to_string()),
                Topic::Station("grill".to_string()),
            ],
        );

        let e = event("v1").with_station_tags(vec!["grill".to_string()]);
        dispatcher.publish(&e);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnected_subscriber_misses_events_for_good() {
        let dispatcher = dispatcher_with(vec![]);
        let rx = dispatcher.subscribe("term-a", vec![Topic::Venue("v1".to_string())]);
        drop(rx);

        // First publish discovers the closed channel and evicts
        dispatcher.publish(&event("v1"));
        assert_eq!(dispatcher.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let stations = Arc::new(StationRegistry::new(vec![]));
        let dispatcher = EventDispatcher::with_capacity(stations, 1);
        let mut rx = dispatcher.subscribe("term-a", vec![Topic::Venue("v1".to_string())]);

        dispatcher.publish(&event("v1"));
        dispatcher.publish(&event("v1")); // dropped, queue full

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_station_fails_over_to_backup_after_timeout() {
        let mut grill = Station::new("grill", "Grill", vec!["grill".to_string()]);
        grill.backup_station_id = Some("backup".to_string());
        grill.failover_timeout_ms = 0; // immediately eligible
        let backup = Station::new("backup", "Backup", vec!["backup-tag".to_string()]);
        let dispatcher = dispatcher_with(vec![grill, backup]);

        // Only the backup display is connected
        let mut backup_rx = dispatcher.subscribe_station(
            "kds-backup",
            "backup",
            vec![Topic::Station("backup-tag".to_string())],
        );

        let manifest = RoutingManifest {
            order_id: "o1".to_string(),
            tickets: vec![StationTicket {
                station_id: "grill".to_string(),
                station_name: "Grill".to_string(),
                item_ids: vec!["i1".to_string()],
                reference_item_ids: vec![],
            }],
            unrouted: vec![],
        };
        let e = OrderEvent::new("v1", "o1", 2, OrderEventKind::OrderSent { manifest })
            .with_station_tags(vec!["grill".to_string()]);
        dispatcher.publish(&e);

        assert!(backup_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn live_station_does_not_fail_over() {
        let mut grill = Station::new("grill", "Grill", vec!["grill".to_string()]);
        grill.backup_station_id = Some("backup".to_string());
        grill.failover_timeout_ms = 0;
        let backup = Station::new("backup", "Backup", vec!["backup-tag".to_string()]);
        let dispatcher = dispatcher_with(vec![grill, backup]);

        let mut grill_rx = dispatcher.subscribe_station(
            "kds-grill",
            "grill",
            vec![Topic::Station("grill".to_string())],
        );
        let mut backup_rx = dispatcher.subscribe_station(
            "kds-backup",
            "backup",
            vec![Topic::Station("backup-tag".to_string())],
        );

        let manifest = RoutingManifest {
            order_id: "o1".to_string(),
            tickets: vec![StationTicket {
                station_id: "grill".to_string(),
                station_name: "Grill".to_string(),
                item_ids: vec!["i1".to_string()],
                reference_item_ids: vec![],
            }],
            unrouted: vec![],
        };
        let e = OrderEvent::new("v1", "o1", 2, OrderEventKind::OrderSent { manifest })
            .with_station_tags(vec!["grill".to_string()]);
        dispatcher.publish(&e);

        assert!(grill_rx.try_recv().is_ok());
        assert!(backup_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_to_tags_reaches_tag_subscribers_only() {
        let dispatcher = dispatcher_with(vec![]);
        let mut kds = dispatcher.subscribe("kds", vec![Topic::Station("grill".to_string())]);
        let mut term = dispatcher.subscribe("term", vec![Topic::Venue("v1".to_string())]);

        dispatcher.publish_to_tags(&["grill".to_string()], &event("v1"));

        assert!(kds.try_recv().is_ok());
        assert!(term.try_recv().is_err());
    }
}
