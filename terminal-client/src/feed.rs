//! Server read interface used for refetches.

use async_trait::async_trait;
use shared::Order;

use crate::error::ClientError;

/// Read access to the server's authoritative order state. Transport-
/// agnostic: an HTTP client in production, an in-process handle in tests.
#[async_trait]
pub trait OrderFeed: Send + Sync {
    async fn fetch_order(&self, order_id: &str) -> Result<Option<Order>, ClientError>;

    async fn fetch_active_orders(&self) -> Result<Vec<Order>, ClientError>;
}
