//! Terminal-to-server synchronization, wired in-process.
//!
//! The terminal client subscribes to the dispatcher directly and refetches
//! through the service, exercising the whole realtime path without a
//! network in between.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use shared::{ItemClass, NewItemInput, Order, OrderEvent, PaymentInput, TableRef, Topic};
use terminal_client::{
    ClientError, ConnectionManager, EventSource, LocalOrderCache, OrderFeed, RecoveryQueue,
    SyncAgent, SyncConfig,
};
use venue_server::dispatch::{EventDispatcher, StationRegistry};
use venue_server::effects::{EffectHooks, EffectsWorker, MenuItemInfo, StaticCatalog};
use venue_server::orders::{OrderService, OrderStore};

struct InProcessSource {
    dispatcher: EventDispatcher,
    terminal_id: String,
    venue_id: String,
}

impl EventSource for InProcessSource {
    fn connect(&self) -> Result<mpsc::Receiver<OrderEvent>, ClientError> {
        Ok(self.dispatcher.subscribe(
            &self.terminal_id,
            vec![Topic::Venue(self.venue_id.clone())],
        ))
    }
}

struct InProcessFeed {
    service: OrderService,
}

#[async_trait]
impl OrderFeed for InProcessFeed {
    async fn fetch_order(&self, order_id: &str) -> Result<Option<Order>, ClientError> {
        match self.service.get_order(order_id) {
            Ok(order) => Ok(Some(order)),
            Err(venue_server::orders::OrderError::OrderNotFound(_)) => Ok(None),
            Err(e) => Err(ClientError::Feed(e.to_string())),
        }
    }

    async fn fetch_active_orders(&self) -> Result<Vec<Order>, ClientError> {
        self.service
            .get_active_orders()
            .map_err(|e| ClientError::Feed(e.to_string()))
    }
}

fn service() -> OrderService {
    let store = OrderStore::open_in_memory(16, Duration::from_millis(500)).unwrap();
    let dispatcher = EventDispatcher::new(Arc::new(StationRegistry::new(vec![])));
    let (effects, worker) = EffectsWorker::new(64, EffectHooks::null(), CancellationToken::new());
    tokio::spawn(worker.run());

    let catalog = StaticCatalog::new(vec![MenuItemInfo {
        menu_item_id: "m-pizza".to_string(),
        name: "Margherita".to_string(),
        price: Decimal::new(1200, 2),
        tags: vec![],
        category_tags: vec![],
        class: ItemClass::Food,
    }]);
    OrderService::new(store, dispatcher, effects, Arc::new(catalog), Decimal::ZERO)
}

fn terminal(service: &OrderService, terminal_id: &str) -> (Arc<LocalOrderCache>, SyncAgent) {
    let cache = Arc::new(LocalOrderCache::new());
    let source = Arc::new(InProcessSource {
        dispatcher: service.dispatcher().clone(),
        terminal_id: terminal_id.to_string(),
        venue_id: "v1".to_string(),
    });
    let agent = SyncAgent::new(
        cache.clone(),
        Arc::new(InProcessFeed {
            service: service.clone(),
        }),
        ConnectionManager::new(source),
        SyncConfig {
            debounce: Duration::from_millis(30),
            poll_interval: Duration::from_secs(10),
        },
    );
    (cache, agent)
}

fn item(menu_item_id: &str, client_ref: Option<&str>) -> NewItemInput {
    NewItemInput {
        menu_item_id: menu_item_id.to_string(),
        quantity: 1,
        modifiers: vec![],
        seat: None,
        course: None,
        note: None,
        client_ref: client_ref.map(|r| r.to_string()),
    }
}

#[tokio::test]
async fn terminal_view_follows_create_update_and_pay() {
    let service = service();
    let (cache, agent) = terminal(&service, "term-1");
    let agent = Arc::new(agent);

    let shutdown = CancellationToken::new();
    let run = {
        let agent = agent.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { agent.run(shutdown).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Create + add: the terminal converges through debounced refetch
    let order = service
        .create_order(
            "v1",
            Some(TableRef {
                table_id: "T5".to_string(),
                table_name: None,
            }),
        )
        .await
        .unwrap();
    service
        .add_items(&order.order_id, None, vec![item("m-pizza", None)])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    let local = cache.get(&order.order_id).expect("terminal sees the order");
    assert_eq!(local.version, 2);
    assert_eq!(local.items.len(), 1);

    // Pay: removal class, applied locally with no refetch
    service
        .pay(
            &order.order_id,
            PaymentInput {
                idempotency_key: "k1".to_string(),
                method: "CASH".to_string(),
                amount: Decimal::new(1200, 2),
                tip: None,
            },
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(cache.get(&order.order_id).is_none());

    shutdown.cancel();
    run.await.unwrap();
}

#[tokio::test]
async fn crash_recovery_replays_only_what_the_server_is_missing() {
    let service = service();
    let queue = RecoveryQueue::open_in_memory().unwrap();

    let order = service.create_order("v1", None).await.unwrap();

    // Terminal rings up two items and buffers them before committing
    queue
        .buffer(
            &order.order_id,
            &[item("m-pizza", Some("ref-a")), item("m-pizza", Some("ref-b"))],
        )
        .unwrap();

    // One of the two made it to the server before the crash
    service
        .add_items(&order.order_id, None, vec![item("m-pizza", Some("ref-a"))])
        .await
        .unwrap();

    // Next load: merge the buffer against authoritative state
    let server_order = service.get_order(&order.order_id).unwrap();
    let recovered = queue
        .recover(&order.order_id, &server_order.items)
        .unwrap();
    assert_eq!(recovered.recovered, 1, "one item to report to the user");
    assert_eq!(recovered.already_committed, 1);

    // Resubmit the survivors
    service
        .add_items(&order.order_id, None, recovered.items)
        .await
        .unwrap();
    let final_order = service.get_order(&order.order_id).unwrap();
    assert_eq!(final_order.items.len(), 2);
}
