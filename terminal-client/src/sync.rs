//! The sync agent: keeps the local cache honest against the server.
//!
//! # Protocol
//!
//! 1. Acquire the shared connection and do one unconditional full refresh
//!    (missed events are never replayed, so reconnect always starts clean)
//! 2. While connected: removal events apply locally with zero network;
//!    anything else schedules a debounced refetch of the affected order
//! 3. When the transport drops: fall back to polling full refreshes at a
//!    cadence an order of magnitude slower than the realtime debounce,
//!    and keep trying to reconnect
//!
//! The agent never polls while the subscription is healthy.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use shared::OrderEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::connection::{ConnectionHandle, ConnectionManager};
use crate::error::ClientError;
use crate::feed::OrderFeed;
use crate::state::LocalOrderCache;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Trailing-edge window for coalescing refetches of the same scope
    pub debounce: Duration,
    /// Fallback polling cadence while disconnected
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// What one event did to local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Entity dropped from the cache directly, no network
    RemovedLocally(String),
    /// Order queued for a debounced refetch
    RefetchScheduled(String),
}

pub struct SyncAgent {
    cache: Arc<LocalOrderCache>,
    feed: Arc<dyn OrderFeed>,
    connection: Arc<ConnectionManager>,
    config: SyncConfig,
}

impl SyncAgent {
    pub fn new(
        cache: Arc<LocalOrderCache>,
        feed: Arc<dyn OrderFeed>,
        connection: Arc<ConnectionManager>,
        config: SyncConfig,
    ) -> Self {
        Self {
            cache,
            feed,
            connection,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<LocalOrderCache> {
        &self.cache
    }

    /// Apply one event to local state. Removal-class events are the delta
    /// fast path; everything else is reconciled by refetch because events
    /// are notifications, not state.
    pub fn apply_event(&self, event: &OrderEvent) -> SyncAction {
        if event.is_removal() {
            self.cache.remove(&event.order_id);
            tracing::debug!(order_id = %event.order_id, "Removed locally on event");
            SyncAction::RemovedLocally(event.order_id.clone())
        } else {
            SyncAction::RefetchScheduled(event.order_id.clone())
        }
    }

    /// Replace the local view with the server's.
    pub async fn full_refresh(&self) -> Result<usize, ClientError> {
        let orders = self.feed.fetch_active_orders().await?;
        let count = orders.len();
        self.cache.replace_all(orders);
        tracing::debug!(count, "Full refresh complete");
        Ok(count)
    }

    async fn refetch(&self, order_id: &str) {
        match self.feed.fetch_order(order_id).await {
            Ok(Some(order)) => self.cache.upsert(order),
            Ok(None) => {
                self.cache.remove(order_id);
            }
            Err(e) => {
                // Leave the stale entry; the next event or poll catches up
                tracing::warn!(order_id = %order_id, error = %e, "Refetch failed");
            }
        }
    }

    /// Run until cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                return;
            }

            match self.connection.clone().acquire() {
                Ok(mut handle) => {
                    // Missed events are gone for good; start from scratch
                    if let Err(e) = self.full_refresh().await {
                        tracing::warn!(error = %e, "Initial refresh failed");
                    }
                    self.connected_loop(&mut handle, &shutdown).await;
                    if shutdown.is_cancelled() {
                        return;
                    }
                    tracing::warn!("Realtime connection lost, falling back to polling");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Connect failed");
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(e) = self.full_refresh().await {
                        tracing::warn!(error = %e, "Poll refresh failed");
                    }
                }
            }
        }
    }

    async fn connected_loop(&self, handle: &mut ConnectionHandle, shutdown: &CancellationToken) {
        let mut pending: HashSet<String> = HashSet::new();
        let mut deadline: Option<Instant> = None;

        loop {
            let flush_at = deadline;
            let flush_timer = async move {
                match flush_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => return,
                result = handle.recv() => match result {
                    Ok(event) => {
                        if let SyncAction::RefetchScheduled(order_id) = self.apply_event(&event) {
                            pending.insert(order_id);
                            deadline = Some(Instant::now() + self.config.debounce);
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Fell behind the event stream, refreshing");
                        pending.clear();
                        deadline = None;
                        if let Err(e) = self.full_refresh().await {
                            tracing::warn!(error = %e, "Refresh after lag failed");
                        }
                    }
                    Err(RecvError::Closed) => return,
                },
                _ = flush_timer => {
                    deadline = None;
                    let batch: Vec<String> = pending.drain().collect();
                    for order_id in batch {
                        self.refetch(&order_id).await;
                    }
                }
            }
        }
    }
}
