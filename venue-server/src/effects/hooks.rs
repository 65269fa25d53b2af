//! Collaborator contracts consumed by the order core.
//!
//! None of these are part of the core: the core only defines when they are
//! invoked and that their failure must never affect committed order state.
//! The catalog is the one synchronous seam (item resolution happens inside
//! the mutation path); the rest run fire-and-forget on the effects worker.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{ItemClass, RoutingManifest};

/// What the catalog knows about a menu item at add time. Everything here is
/// snapshotted onto the order item; later catalog edits never reach
/// historical items.
#[derive(Debug, Clone)]
pub struct MenuItemInfo {
    pub menu_item_id: String,
    pub name: String,
    pub price: Decimal,
    /// Explicit routing tags on the item itself
    pub tags: Vec<String>,
    /// Tags inherited from the item's category
    pub category_tags: Vec<String>,
    pub class: ItemClass,
}

/// Catalog lookup.
pub trait Catalog: Send + Sync {
    fn get_menu_item(&self, menu_item_id: &str) -> Option<MenuItemInfo>;
}

/// A deduction line handed to inventory.
#[derive(Debug, Clone)]
pub struct SaleLine {
    pub menu_item_id: String,
    pub quantity: u32,
}

#[async_trait]
pub trait InventoryHook: Send + Sync {
    async fn deduct_for_sale(&self, lines: Vec<SaleLine>) -> anyhow::Result<()>;
}

#[async_trait]
pub trait TipsHook: Send + Sync {
    async fn allocate_tips(&self, payment_id: String) -> anyhow::Result<()>;
}

#[async_trait]
pub trait TicketHook: Send + Sync {
    async fn emit_ticket(&self, manifest: RoutingManifest) -> anyhow::Result<()>;
}

/// In-memory catalog backed by a fixed item list. Used by tests and by
/// single-venue deployments that load the menu at startup.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    items: dashmap::DashMap<String, MenuItemInfo>,
}

impl StaticCatalog {
    pub fn new(items: impl IntoIterator<Item = MenuItemInfo>) -> Self {
        let map = dashmap::DashMap::new();
        for item in items {
            map.insert(item.menu_item_id.clone(), item);
        }
        Self { items: map }
    }

    pub fn insert(&self, item: MenuItemInfo) {
        self.items.insert(item.menu_item_id.clone(), item);
    }
}

impl Catalog for StaticCatalog {
    fn get_menu_item(&self, menu_item_id: &str) -> Option<MenuItemInfo> {
        self.items.get(menu_item_id).map(|e| e.value().clone())
    }
}

/// Hooks that do nothing. Default wiring until real collaborators are
/// attached, and the baseline for tests.
#[derive(Debug, Default, Clone)]
pub struct NullHooks;

#[async_trait]
impl InventoryHook for NullHooks {
    async fn deduct_for_sale(&self, _lines: Vec<SaleLine>) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl TipsHook for NullHooks {
    async fn allocate_tips(&self, _payment_id: String) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl TicketHook for NullHooks {
    async fn emit_ticket(&self, _manifest: RoutingManifest) -> anyhow::Result<()> {
        Ok(())
    }
}
