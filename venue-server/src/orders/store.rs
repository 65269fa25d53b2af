//! redb-based persistence for order aggregates.
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Aggregate rows |
//! | `active_tables` | `table_id` | `order_id` | Active table claims |
//! | `active_orders` | `order_id` | `()` | Active order index |
//!
//! # Concurrency
//!
//! Two layers, and both are load-bearing:
//!
//! - **Row lock** (pessimistic): [`OrderStore::load_for_mutation`] takes an
//!   exclusive per-order async mutex, so concurrent writers to the same
//!   order are serialized for the whole load → mutate → commit window.
//! - **Version check** (optimistic): a caller that loaded its copy before
//!   the lock window supplies `expected_version`; a mismatch fails with
//!   [`StoreError::VersionConflict`] carrying the current version, so stale
//!   readers are rejected even though writers never interleave.
//!
//! Table-claim uniqueness is enforced again inside the `create_order` write
//! transaction: a claim row that already exists fails the create atomically,
//! so a race that slips past the service-level existence check still cannot
//! produce two live orders on one table.
//!
//! Lock acquisition is gated by a bounded permit pool. Exhaustion surfaces
//! as [`StoreError::Busy`] after a bounded wait, which callers treat as
//! retryable.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::Order;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};

/// Table for aggregate rows: key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Table for active table claims: key = table_id, value = order_id
const ACTIVE_TABLES_TABLE: TableDefinition<&str, &str> = TableDefinition::new("active_tables");

/// Table for the active order index: key = order_id, value = empty
const ACTIVE_ORDERS_TABLE: TableDefinition<&str, ()> = TableDefinition::new("active_orders");

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Stale version: current version is {current_version}")]
    VersionConflict { current_version: u64 },

    #[error("Table {table_id} is already occupied by order {existing_order_id}")]
    TableOccupied {
        table_id: String,
        existing_order_id: String,
    },

    #[error("Store is at capacity, retry shortly")]
    Busy,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Exclusive, request-scoped hold on one order row.
///
/// Carries the loaded aggregate, the row lock and a store permit; dropping
/// it releases both. There is no cancellation once acquired — the mutation
/// runs to completion or the guard is dropped on the error path.
#[derive(Debug)]
pub struct MutationGuard {
    pub order: Order,
    loaded_version: u64,
    _row: OwnedMutexGuard<()>,
    _permit: OwnedSemaphorePermit,
}

impl MutationGuard {
    /// Version of the row as loaded, before the mutation touched it.
    pub fn loaded_version(&self) -> u64 {
        self.loaded_version
    }
}

/// Order storage backed by redb.
#[derive(Clone)]
pub struct OrderStore {
    db: Arc<Database>,
    /// Per-order row locks, created on first use
    row_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    /// Bounded permit pool in front of the row locks
    permits: Arc<Semaphore>,
    permit_wait: Duration,
}

impl OrderStore {
    /// Open or create the database at the given path.
    ///
    /// redb commits with immediate durability by default; a committed order
    /// survives power loss, which is what makes soft-close (rather than
    /// delete) a safe lifecycle model for money-bearing rows.
    pub fn open(path: impl AsRef<Path>, pool_size: usize, permit_wait: Duration) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db, pool_size, permit_wait)
    }

    /// Open an in-memory database (tests and in-process clients).
    pub fn open_in_memory(pool_size: usize, permit_wait: Duration) -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db, pool_size, permit_wait)
    }

    fn init(db: Database, pool_size: usize, permit_wait: Duration) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ACTIVE_TABLES_TABLE)?;
            let _ = write_txn.open_table(ACTIVE_ORDERS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            row_locks: Arc::new(DashMap::new()),
            permits: Arc::new(Semaphore::new(pool_size)),
            permit_wait,
        })
    }

    // ========== Mutation Path ==========

    /// Insert a freshly created order and claim its table.
    ///
    /// The existence check on `active_tables` and the insert happen in one
    /// write transaction; redb serializes writers, so the worst concurrent
    /// outcome is one rejected duplicate, never two live claims.
    pub fn create_order(&self, order: &Order) -> StoreResult<Order> {
        let txn = self.db.begin_write()?;
        {
            if let Some(table_ref) = &order.table_ref {
                let mut claims = txn.open_table(ACTIVE_TABLES_TABLE)?;
                if let Some(existing) = claims.get(table_ref.table_id.as_str())? {
                    return Err(StoreError::TableOccupied {
                        table_id: table_ref.table_id.clone(),
                        existing_order_id: existing.value().to_string(),
                    });
                }
                claims.insert(table_ref.table_id.as_str(), order.order_id.as_str())?;
            }

            let encoded = serde_json::to_vec(order)?;
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            orders.insert(order.order_id.as_str(), encoded.as_slice())?;

            let mut active = txn.open_table(ACTIVE_ORDERS_TABLE)?;
            active.insert(order.order_id.as_str(), ())?;
        }
        txn.commit()?;
        Ok(order.clone())
    }

    /// Acquire the exclusive row lock for one order and load it.
    ///
    /// `expected_version` is compared against the stored version before the
    /// lock is taken (fast rejection for stale readers) and again after
    /// (the row may have moved while this caller waited on the lock).
    pub async fn load_for_mutation(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
    ) -> StoreResult<MutationGuard> {
        if let Some(expected) = expected_version {
            let current = self
                .get_order(order_id)?
                .ok_or_else(|| StoreError::OrderNotFound(order_id.to_string()))?
                .version;
            if expected != current {
                return Err(StoreError::VersionConflict {
                    current_version: current,
                });
            }
        }

        let permit = tokio::time::timeout(self.permit_wait, self.permits.clone().acquire_owned())
            .await
            .map_err(|_| StoreError::Busy)?
            .map_err(|_| StoreError::Busy)?;

        let lock = self
            .row_locks
            .entry(order_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let row = lock.lock_owned().await;

        let order = self
            .get_order(order_id)?
            .ok_or_else(|| StoreError::OrderNotFound(order_id.to_string()))?;

        if let Some(expected) = expected_version
            && expected != order.version
        {
            return Err(StoreError::VersionConflict {
                current_version: order.version,
            });
        }

        let loaded_version = order.version;
        Ok(MutationGuard {
            order,
            loaded_version,
            _row: row,
            _permit: permit,
        })
    }

    /// Persist a mutated aggregate and maintain the active indices.
    pub fn commit(&self, guard: MutationGuard) -> StoreResult<Order> {
        let MutationGuard {
            order,
            loaded_version,
            _row,
            _permit,
        } = guard;
        debug_assert_eq!(order.version, loaded_version + 1, "version must advance by exactly one");

        let txn = self.db.begin_write()?;
        {
            let encoded = serde_json::to_vec(&order)?;
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            orders.insert(order.order_id.as_str(), encoded.as_slice())?;

            let mut active = txn.open_table(ACTIVE_ORDERS_TABLE)?;
            let mut claims = txn.open_table(ACTIVE_TABLES_TABLE)?;
            if order.status.is_active() {
                active.insert(order.order_id.as_str(), ())?;
                if let Some(table_ref) = &order.table_ref {
                    // A reopen re-claims the table; reject if someone else
                    // took it in the meantime
                    let holder = claims
                        .get(table_ref.table_id.as_str())?
                        .map(|g| g.value().to_string());
                    if let Some(other) = holder
                        && other != order.order_id
                    {
                        return Err(StoreError::TableOccupied {
                            table_id: table_ref.table_id.clone(),
                            existing_order_id: other,
                        });
                    }
                    claims.insert(table_ref.table_id.as_str(), order.order_id.as_str())?;
                }
            } else {
                active.remove(order.order_id.as_str())?;
                if let Some(table_ref) = &order.table_ref {
                    // Only release a claim this order actually holds
                    let held = claims
                        .get(table_ref.table_id.as_str())?
                        .map(|g| g.value() == order.order_id);
                    if held == Some(true) {
                        claims.remove(table_ref.table_id.as_str())?;
                    }
                }
            }
        }
        txn.commit()?;
        Ok(order)
    }

    // ========== Read Path (never touches row locks) ==========

    pub fn get_order(&self, order_id: &str) -> StoreResult<Option<Order>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_active_orders(&self) -> StoreResult<Vec<Order>> {
        let txn = self.db.begin_read()?;
        let index = txn.open_table(ACTIVE_ORDERS_TABLE)?;
        let orders = txn.open_table(ORDERS_TABLE)?;

        let mut result = Vec::new();
        for entry in index.iter()? {
            let (key, _) = entry?;
            if let Some(row) = orders.get(key.value())? {
                result.push(serde_json::from_slice(row.value())?);
            }
        }
        Ok(result)
    }

    /// Which active order, if any, currently claims this table.
    pub fn find_active_order_for_table(&self, table_id: &str) -> StoreResult<Option<String>> {
        let txn = self.db.begin_read()?;
        let claims = txn.open_table(ACTIVE_TABLES_TABLE)?;
        Ok(claims.get(table_id)?.map(|g| g.value().to_string()))
    }
}

impl std::fmt::Debug for OrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStore")
            .field("db", &"<redb::Database>")
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}
