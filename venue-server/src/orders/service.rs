//! OrderService - the mutation pipeline.
//!
//! # Mutation Flow
//!
//! ```text
//! add_items / send / pay / void / reopen
//!     ├─ 1. load_for_mutation (row lock + optimistic version check)
//!     ├─ 2. op.validate  (state machine guard)
//!     ├─ 3. op.apply     (aggregate change + server-side totals)
//!     ├─ 4. version += 1
//!     ├─ 5. commit       (one redb write transaction)
//!     ├─ 6. publish events  (fire-and-forget, post-commit)
//!     └─ 7. submit side effects to the bounded worker
//! ```
//!
//! Read paths never enter this pipeline and never block on a row lock.
//! Side effects and event delivery are fully isolated from the mutation's
//! outcome: once step 5 returns, the order state is settled no matter what
//! the hooks or subscribers do.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use shared::{
    NewItemInput, Order, OrderEvent, OrderEventKind, Payment, PaymentInput, RoutingManifest,
    TableRef,
};

use crate::dispatch::EventDispatcher;
use crate::effects::{Catalog, EffectsQueue, SaleLine, SideEffect};

use super::error::{OrderError, OrderResult};
use super::ops::{
    AddItemsOp, MutationCtx, OrderMutation, PayOrderOp, ReopenOrderOp, SendOrderOp, VoidItemOp,
    VoidOrderOp, send_order,
};
use super::store::{MutationGuard, OrderStore};

/// Order service over a shared store, dispatcher and effects queue.
///
/// Stateless between requests: every mutation loads through the store, so
/// any number of clones can serve concurrently.
#[derive(Clone)]
pub struct OrderService {
    store: OrderStore,
    dispatcher: EventDispatcher,
    effects: EffectsQueue,
    catalog: Arc<dyn Catalog>,
    tax_rate: Decimal,
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("store", &self.store)
            .field("tax_rate", &self.tax_rate)
            .finish()
    }
}

impl OrderService {
    pub fn new(
        store: OrderStore,
        dispatcher: EventDispatcher,
        effects: EffectsQueue,
        catalog: Arc<dyn Catalog>,
        tax_rate: Decimal,
    ) -> Self {
        Self {
            store,
            dispatcher,
            effects,
            catalog,
            tax_rate,
        }
    }

    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    // ========== Operations ==========

    /// Open a new order, claiming the table when one is given.
    ///
    /// The existence check here is the fast path; the storage layer holds
    /// the real constraint, so a race between two creates resolves to one
    /// winner and one `TableOccupied` no matter what.
    pub async fn create_order(
        &self,
        venue_id: &str,
        table_ref: Option<TableRef>,
    ) -> OrderResult<Order> {
        if let Some(table) = &table_ref
            && let Some(existing) = self.store.find_active_order_for_table(&table.table_id)?
        {
            return Err(OrderError::TableOccupied {
                table_id: table.table_id.clone(),
                existing_order_id: existing,
            });
        }

        let order = Order::new(venue_id, table_ref);
        let order = self.store.create_order(&order)?;
        tracing::info!(order_id = %order.order_id, table = ?order.table_ref, "Order created");

        let event = OrderEvent::new(
            &order.venue_id,
            &order.order_id,
            order.version,
            OrderEventKind::OrderCreated {
                table_id: order.table_ref.as_ref().map(|t| t.table_id.clone()),
            },
        );
        self.dispatcher.publish(&event);

        Ok(order)
    }

    /// Add items, snapshotting prices and routing tags from the catalog.
    pub async fn add_items(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
        items: Vec<NewItemInput>,
    ) -> OrderResult<Order> {
        let mut catalog_info = HashMap::new();
        for input in &items {
            if let Some(info) = self.catalog.get_menu_item(&input.menu_item_id) {
                catalog_info.insert(input.menu_item_id.clone(), info);
            }
        }

        let op = AddItemsOp {
            items,
            catalog_info,
        };
        let (order, _) = self.mutate(order_id, expected_version, &op).await?;
        Ok(order)
    }

    /// Flush the un-sent delta to the kitchen and return its manifest.
    pub async fn send_to_kitchen(
        &self,
        order_id: &str,
        item_ids: Option<Vec<String>>,
    ) -> OrderResult<(Order, RoutingManifest)> {
        let op = SendOrderOp {
            item_ids,
            stations: self.dispatcher.station_registry().all(),
        };
        let (order, events) = self.mutate(order_id, None, &op).await?;

        let manifest =
            send_order::manifest_from_events(&events.iter().map(|e| e.kind.clone()).collect::<Vec<_>>());
        if !manifest.is_empty() {
            self.effects.submit(SideEffect::EmitTicket {
                manifest: manifest.clone(),
            });
            self.effects.submit(SideEffect::DeductForSale {
                lines: manifest_sale_lines(&order, &manifest),
            });
        }

        Ok((order, manifest))
    }

    /// Take payment. A replayed idempotency key returns the original
    /// payment without re-charging and without firing side effects again.
    pub async fn pay(&self, order_id: &str, input: PaymentInput) -> OrderResult<Payment> {
        let guard = self.store.load_for_mutation(order_id, None).await?;

        // Replay check under the lock: the same key can never race itself
        // into two charges
        if let Some(existing) = guard.order.payment_by_key(&input.idempotency_key) {
            tracing::info!(
                order_id = %order_id,
                payment_id = %existing.payment_id,
                "Duplicate payment request, returning original"
            );
            return Ok(existing.clone());
        }

        let op = PayOrderOp { input };
        let (order, _) = self.run_pipeline(guard, &op)?;

        let payment = order
            .payments
            .last()
            .cloned()
            .expect("pay always appends a payment");

        // Pre-deducted (sent) items are skipped; only the never-sent
        // remainder deducts at payment time
        let lines: Vec<SaleLine> = order
            .live_items()
            .filter(|i| !i.sent)
            .map(|i| SaleLine {
                menu_item_id: i.menu_item_id.clone(),
                quantity: i.quantity,
            })
            .collect();
        if !lines.is_empty() {
            self.effects.submit(SideEffect::DeductForSale { lines });
        }
        self.effects.submit(SideEffect::AllocateTips {
            payment_id: payment.payment_id.clone(),
        });

        Ok(payment)
    }

    /// Void a single item; the order survives unless this empties it.
    pub async fn void_item(
        &self,
        order_id: &str,
        item_id: &str,
        reason: &str,
        approver_id: &str,
    ) -> OrderResult<Order> {
        let op = VoidItemOp {
            item_id: item_id.to_string(),
            reason: reason.to_string(),
            approver_id: approver_id.to_string(),
        };
        let (order, _) = self.mutate(order_id, None, &op).await?;
        Ok(order)
    }

    /// Void the whole order.
    pub async fn void_order(
        &self,
        order_id: &str,
        reason: &str,
        approver_id: &str,
    ) -> OrderResult<Order> {
        let op = VoidOrderOp {
            reason: reason.to_string(),
            approver_id: approver_id.to_string(),
        };
        let (order, _) = self.mutate(order_id, None, &op).await?;
        Ok(order)
    }

    /// Reopen a paid order into a new mutable lifecycle.
    pub async fn reopen(
        &self,
        order_id: &str,
        actor_id: &str,
        reason: &str,
    ) -> OrderResult<Order> {
        let op = ReopenOrderOp {
            actor_id: actor_id.to_string(),
            reason: reason.to_string(),
        };
        let (order, _) = self.mutate(order_id, None, &op).await?;
        Ok(order)
    }

    // ========== Queries (lock-free) ==========

    pub fn get_order(&self, order_id: &str) -> OrderResult<Order> {
        self.store
            .get_order(order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))
    }

    pub fn get_active_orders(&self) -> OrderResult<Vec<Order>> {
        Ok(self.store.get_active_orders()?)
    }

    // ========== Pipeline ==========

    async fn mutate(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
        op: &dyn OrderMutation,
    ) -> OrderResult<(Order, Vec<OrderEvent>)> {
        let guard = self.store.load_for_mutation(order_id, expected_version).await?;
        self.run_pipeline(guard, op)
    }

    fn run_pipeline(
        &self,
        mut guard: MutationGuard,
        op: &dyn OrderMutation,
    ) -> OrderResult<(Order, Vec<OrderEvent>)> {
        op.validate(&guard.order)?;

        let ctx = MutationCtx {
            now: shared::now_millis(),
            tax_rate: self.tax_rate,
        };
        let kinds = op.apply(&mut guard.order, &ctx)?;

        guard.order.version += 1;
        guard.order.updated_at = ctx.now;

        let order = self.store.commit(guard)?;
        tracing::info!(
            order_id = %order.order_id,
            operation = %op.name(),
            version = order.version,
            "Mutation committed"
        );

        let events: Vec<OrderEvent> = kinds
            .into_iter()
            .map(|kind| {
                let tags = self.station_tags_for(&kind);
                OrderEvent::new(&order.venue_id, &order.order_id, order.version, kind)
                    .with_station_tags(tags)
            })
            .collect();
        for event in &events {
            self.dispatcher.publish(event);
        }

        Ok((order, events))
    }

    /// Station tags an event should mirror to: the union of tag sets of the
    /// stations its manifest touches.
    fn station_tags_for(&self, kind: &OrderEventKind) -> Vec<String> {
        let OrderEventKind::OrderSent { manifest } = kind else {
            return Vec::new();
        };
        let registry = self.dispatcher.station_registry();
        let mut tags = Vec::new();
        for ticket in &manifest.tickets {
            if let Some(station) = registry.get(&ticket.station_id) {
                for tag in station.tags {
                    if !tags.contains(&tag) {
                        tags.push(tag);
                    }
                }
            }
        }
        tags
    }
}

/// Deduction lines for the items a manifest flushed.
fn manifest_sale_lines(order: &Order, manifest: &RoutingManifest) -> Vec<SaleLine> {
    let mut flushed: Vec<&str> = manifest
        .tickets
        .iter()
        .flat_map(|t| t.item_ids.iter().map(String::as_str))
        .collect();
    flushed.sort_unstable();
    flushed.dedup();

    order
        .items
        .iter()
        .filter(|i| flushed.binary_search(&i.item_id.as_str()).is_ok())
        .map(|i| SaleLine {
            menu_item_id: i.menu_item_id.clone(),
            quantity: i.quantity,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::StationRegistry;
    use crate::effects::{EffectHooks, EffectsWorker, MenuItemInfo, StaticCatalog};
    use shared::{ItemClass, OrderStatus, Station, Topic};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn test_catalog() -> StaticCatalog {
        StaticCatalog::new(vec![
            MenuItemInfo {
                menu_item_id: "m-pizza".to_string(),
                name: "Margherita".to_string(),
                price: Decimal::new(1200, 2),
                tags: vec!["pizza".to_string()],
                category_tags: vec![],
                class: ItemClass::Food,
            },
            MenuItemInfo {
                menu_item_id: "m-beer".to_string(),
                name: "Lager".to_string(),
                price: Decimal::new(600, 2),
                tags: vec![],
                category_tags: vec![],
                class: ItemClass::Drink,
            },
        ])
    }

    fn test_service(stations: Vec<Station>) -> OrderService {
        let store = OrderStore::open_in_memory(16, Duration::from_millis(500)).unwrap();
        let dispatcher = EventDispatcher::new(Arc::new(StationRegistry::new(stations)));
        let (effects, _worker) = EffectsWorker::new(64, EffectHooks::null(), CancellationToken::new());
        OrderService::new(store, dispatcher, effects, Arc::new(test_catalog()), Decimal::ZERO)
    }

    fn table(table_id: &str) -> Option<TableRef> {
        Some(TableRef {
            table_id: table_id.to_string(),
            table_name: None,
        })
    }

    fn item(menu_item_id: &str, quantity: u32) -> NewItemInput {
        NewItemInput {
            menu_item_id: menu_item_id.to_string(),
            quantity,
            modifiers: vec![],
            seat: None,
            course: None,
            note: None,
            client_ref: None,
        }
    }

    fn payment(key: &str, amount_cents: i64) -> PaymentInput {
        PaymentInput {
            idempotency_key: key.to_string(),
            method: "CASH".to_string(),
            amount: Decimal::new(amount_cents, 2),
            tip: None,
        }
    }

    #[tokio::test]
    async fn create_then_add_bumps_version_by_one() {
        let service = test_service(vec![]);
        let order = service.create_order("v1", table("T5")).await.unwrap();
        assert_eq!(order.version, 1);

        let order = service
            .add_items(&order.order_id, Some(1), vec![item("m-pizza", 2)])
            .await
            .unwrap();
        assert_eq!(order.version, 2);
        assert_eq!(order.status, OrderStatus::InProgress);
        assert_eq!(order.subtotal, Decimal::new(2400, 2));
    }

    #[tokio::test]
    async fn stale_version_is_rejected_with_current() {
        let service = test_service(vec![]);
        let order = service.create_order("v1", table("T5")).await.unwrap();
        service
            .add_items(&order.order_id, Some(1), vec![item("m-pizza", 2)])
            .await
            .unwrap();

        // A terminal still holding version 1 is told where the row is now
        let err = service
            .add_items(&order.order_id, Some(1), vec![item("m-beer", 1)])
            .await
            .unwrap_err();
        match err {
            OrderError::VersionConflict { current_version } => assert_eq!(current_version, 2),
            other => panic!("expected VersionConflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_create_on_a_table_reports_the_first_order() {
        let service = test_service(vec![]);
        let first = service.create_order("v1", table("T5")).await.unwrap();

        let err = service.create_order("v1", table("T5")).await.unwrap_err();
        match err {
            OrderError::TableOccupied {
                existing_order_id, ..
            } => assert_eq!(existing_order_id, first.order_id),
            other => panic!("expected TableOccupied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn paying_twice_with_one_key_returns_the_same_payment() {
        let service = test_service(vec![]);
        let order = service.create_order("v1", table("T5")).await.unwrap();
        service
            .add_items(&order.order_id, None, vec![item("m-pizza", 1)])
            .await
            .unwrap();

        let first = service.pay(&order.order_id, payment("abc123", 1200)).await.unwrap();
        let second = service.pay(&order.order_id, payment("abc123", 1200)).await.unwrap();

        assert_eq!(first.payment_id, second.payment_id);
        let order = service.get_order(&order.order_id).unwrap();
        assert_eq!(order.payments.len(), 1);
        assert_eq!(order.status, OrderStatus::Paid);
        // Replay did not advance the version either
        assert_eq!(order.version, 3);
    }

    #[tokio::test]
    async fn paying_under_a_second_key_reports_already_paid() {
        let service = test_service(vec![]);
        let order = service.create_order("v1", table("T5")).await.unwrap();
        service
            .add_items(&order.order_id, None, vec![item("m-pizza", 1)])
            .await
            .unwrap();
        service.pay(&order.order_id, payment("key-1", 1200)).await.unwrap();

        let err = service
            .pay(&order.order_id, payment("key-2", 1200))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::AlreadyPaid { .. }));
    }

    #[tokio::test]
    async fn send_then_send_again_flushes_nothing() {
        let station = Station::new("kds", "Kitchen", vec!["pizza".to_string()]);
        let service = test_service(vec![station]);
        let order = service.create_order("v1", table("T5")).await.unwrap();
        service
            .add_items(&order.order_id, None, vec![item("m-pizza", 1)])
            .await
            .unwrap();

        let (order, manifest) = service.send_to_kitchen(&order.order_id, None).await.unwrap();
        assert_eq!(order.status, OrderStatus::Sent);
        assert_eq!(manifest.ticket_for("kds").unwrap().item_ids.len(), 1);

        let (_, manifest) = service.send_to_kitchen(&order.order_id, None).await.unwrap();
        assert!(manifest.is_empty());
    }

    #[tokio::test]
    async fn items_added_after_send_flush_as_a_delta() {
        let station = Station::new("kds", "Kitchen", vec!["pizza".to_string(), "bar".to_string()]);
        let service = test_service(vec![station]);
        let order = service.create_order("v1", table("T5")).await.unwrap();
        service
            .add_items(&order.order_id, None, vec![item("m-pizza", 1)])
            .await
            .unwrap();
        service.send_to_kitchen(&order.order_id, None).await.unwrap();

        service
            .add_items(&order.order_id, None, vec![item("m-beer", 1)])
            .await
            .unwrap();
        let (_, manifest) = service.send_to_kitchen(&order.order_id, None).await.unwrap();

        let ticket = manifest.ticket_for("kds").unwrap();
        assert_eq!(ticket.item_ids.len(), 1, "only the new item flushes");
    }

    #[tokio::test]
    async fn void_then_pay_is_an_invalid_transition() {
        let service = test_service(vec![]);
        let order = service.create_order("v1", table("T5")).await.unwrap();
        service
            .add_items(&order.order_id, None, vec![item("m-pizza", 1)])
            .await
            .unwrap();
        service
            .void_order(&order.order_id, "changed mind", "mgr-1")
            .await
            .unwrap();

        let err = service
            .pay(&order.order_id, payment("k", 1200))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn reopen_returns_a_paid_order_to_the_floor() {
        let service = test_service(vec![]);
        let order = service.create_order("v1", table("T5")).await.unwrap();
        service
            .add_items(&order.order_id, None, vec![item("m-pizza", 1)])
            .await
            .unwrap();
        service.pay(&order.order_id, payment("k", 1200)).await.unwrap();

        let order = service
            .reopen(&order.order_id, "mgr-1", "forgot dessert")
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::InProgress);

        // The table is claimed again
        let err = service.create_order("v1", table("T5")).await.unwrap_err();
        assert!(matches!(err, OrderError::TableOccupied { .. }));
    }

    #[tokio::test]
    async fn mutations_are_announced_to_venue_subscribers() {
        let service = test_service(vec![]);
        let mut rx = service
            .dispatcher
            .subscribe("term-1", vec![Topic::Venue("v1".to_string())]);

        let order = service.create_order("v1", table("T5")).await.unwrap();
        service
            .add_items(&order.order_id, None, vec![item("m-pizza", 1)])
            .await
            .unwrap();

        let created = rx.try_recv().unwrap();
        assert!(matches!(created.kind, OrderEventKind::OrderCreated { .. }));
        let updated = rx.try_recv().unwrap();
        assert!(matches!(updated.kind, OrderEventKind::OrderTotalsUpdated { .. }));
        assert_eq!(updated.version, 2);
    }
}
