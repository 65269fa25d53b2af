//! Durable recovery queue for unsent item mutations.
//!
//! Items a waiter has rung up but not yet committed to the server live
//! here until the commit succeeds. If the terminal crashes or loses its
//! session first, the buffer survives in redb and is replayed on the next
//! load: entries are merged against the server's authoritative item list
//! (anything the server already has is dropped) and the caller is told how
//! many items were recovered so it can show a notice.
//!
//! This is a first-class recovery log keyed by order id, not a cache. A
//! buffered mutation over the size ceiling is rejected outright rather
//! than letting local state grow without bound.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::{NewItemInput, OrderItem};

use crate::error::ClientError;

/// Table for buffered item mutations: key = order_id, value = JSON Vec<NewItemInput>
const PENDING_ITEMS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("pending_items");

/// Safety ceiling per buffered entry, serialized bytes.
pub const MAX_ENTRY_BYTES: usize = 64 * 1024;

/// What a recovery pass produced for one order.
#[derive(Debug, Clone)]
pub struct RecoveredItems {
    /// Buffered items the server does not have yet, ready to resubmit
    pub items: Vec<NewItemInput>,
    /// Count for the user-visible recovery notice
    pub recovered: usize,
    /// Buffered items dropped because the server already has them
    pub already_committed: usize,
}

pub struct RecoveryQueue {
    db: Arc<Database>,
}

impl RecoveryQueue {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    pub fn open_in_memory() -> Result<Self, ClientError> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self, ClientError> {
        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(PENDING_ITEMS_TABLE)?;
        }
        txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Buffer the unsent items for one order, replacing any earlier buffer.
    ///
    /// Oversized buffers are refused: the caller keeps its in-memory copy
    /// and the durable state stays bounded.
    pub fn buffer(&self, order_id: &str, items: &[NewItemInput]) -> Result<(), ClientError> {
        let encoded = serde_json::to_vec(items)?;
        if encoded.len() > MAX_ENTRY_BYTES {
            tracing::warn!(
                order_id = %order_id,
                bytes = encoded.len(),
                "Refusing to buffer oversized mutation"
            );
            return Err(ClientError::BufferTooLarge {
                bytes: encoded.len(),
                limit: MAX_ENTRY_BYTES,
            });
        }

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PENDING_ITEMS_TABLE)?;
            table.insert(order_id, encoded.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Drop the buffer for an order (called once its items committed).
    pub fn clear(&self, order_id: &str) -> Result<(), ClientError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PENDING_ITEMS_TABLE)?;
            table.remove(order_id)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Orders that still have a buffered mutation.
    pub fn pending_orders(&self) -> Result<Vec<String>, ClientError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PENDING_ITEMS_TABLE)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            out.push(key.value().to_string());
        }
        Ok(out)
    }

    /// Merge an order's buffer against the server's authoritative items.
    ///
    /// Buffered entries whose `client_ref` already appears on a server item
    /// were committed before the crash and are dropped; the rest come back
    /// for resubmission. The buffer itself is consumed either way.
    pub fn recover(
        &self,
        order_id: &str,
        server_items: &[OrderItem],
    ) -> Result<RecoveredItems, ClientError> {
        let buffered = self.take(order_id)?;

        let (already, fresh): (Vec<_>, Vec<_>) = buffered.into_iter().partition(|input| {
            input.client_ref.as_ref().is_some_and(|r| {
                server_items
                    .iter()
                    .any(|i| i.client_ref.as_deref() == Some(r.as_str()))
            })
        });

        let result = RecoveredItems {
            recovered: fresh.len(),
            already_committed: already.len(),
            items: fresh,
        };
        if result.recovered > 0 {
            tracing::info!(
                order_id = %order_id,
                recovered = result.recovered,
                already_committed = result.already_committed,
                "Recovered buffered items"
            );
        }
        Ok(result)
    }

    fn take(&self, order_id: &str) -> Result<Vec<NewItemInput>, ClientError> {
        let txn = self.db.begin_write()?;
        let buffered = {
            let mut table = txn.open_table(PENDING_ITEMS_TABLE)?;
            match table.remove(order_id)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => Vec::new(),
            }
        };
        txn.commit()?;
        Ok(buffered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::{ItemClass, ItemStatus};

    fn input(menu_item_id: &str, client_ref: &str) -> NewItemInput {
        NewItemInput {
            menu_item_id: menu_item_id.to_string(),
            quantity: 1,
            modifiers: vec![],
            seat: None,
            course: None,
            note: None,
            client_ref: Some(client_ref.to_string()),
        }
    }

    fn server_item(client_ref: &str) -> OrderItem {
        OrderItem {
            item_id: uuid::Uuid::new_v4().to_string(),
            menu_item_id: "m1".to_string(),
            name: "Item".to_string(),
            quantity: 1,
            unit_price: Decimal::new(1000, 2),
            modifiers: vec![],
            seat: None,
            course: None,
            tags: vec![],
            category_tags: vec![],
            class: ItemClass::Food,
            sent: false,
            status: ItemStatus::Queued,
            voided: false,
            void_reason: None,
            note: None,
            client_ref: Some(client_ref.to_string()),
            added_at: 0,
        }
    }

    #[test]
    fn buffer_survives_and_recovers() {
        let queue = RecoveryQueue::open_in_memory().unwrap();
        queue
            .buffer("o1", &[input("m1", "ref-a"), input("m2", "ref-b")])
            .unwrap();

        assert_eq!(queue.pending_orders().unwrap(), vec!["o1".to_string()]);

        let recovered = queue.recover("o1", &[]).unwrap();
        assert_eq!(recovered.recovered, 2);
        assert_eq!(recovered.already_committed, 0);

        // Consumed: a second pass finds nothing
        let recovered = queue.recover("o1", &[]).unwrap();
        assert_eq!(recovered.recovered, 0);
    }

    #[test]
    fn items_the_server_already_has_are_dropped() {
        let queue = RecoveryQueue::open_in_memory().unwrap();
        queue
            .buffer("o1", &[input("m1", "ref-a"), input("m2", "ref-b")])
            .unwrap();

        let recovered = queue.recover("o1", &[server_item("ref-a")]).unwrap();
        assert_eq!(recovered.recovered, 1);
        assert_eq!(recovered.already_committed, 1);
        assert_eq!(recovered.items[0].client_ref.as_deref(), Some("ref-b"));
    }

    #[test]
    fn oversized_buffers_are_refused() {
        let queue = RecoveryQueue::open_in_memory().unwrap();
        let mut big = input("m1", "ref-a");
        big.note = Some("x".repeat(MAX_ENTRY_BYTES));

        let err = queue.buffer("o1", &[big]).unwrap_err();
        assert!(matches!(err, ClientError::BufferTooLarge { .. }));
        assert!(queue.pending_orders().unwrap().is_empty());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recovery.redb");
        {
            let queue = RecoveryQueue::open(&path).unwrap();
            queue.buffer("o1", &[input("m1", "ref-a")]).unwrap();
        }
        let queue = RecoveryQueue::open(&path).unwrap();
        assert_eq!(queue.pending_orders().unwrap(), vec!["o1".to_string()]);
    }
}
