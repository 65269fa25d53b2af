//! Shared event connection with explicit reference counting.
//!
//! One terminal holds one realtime subscription no matter how many UI
//! consumers watch it. Consumers `acquire()` a handle and get a fan-out
//! receiver; dropping the last handle tears the transport down. The
//! manager is passed in wherever it is needed — there is no ambient
//! module-level singleton.

use std::sync::Arc;

use parking_lot::Mutex;
use shared::OrderEvent;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::ClientError;

/// Fan-out capacity for in-process consumers of one connection.
const FANOUT_CAPACITY: usize = 256;

/// The underlying transport. In production an HTTP/TCP stream subscriber,
/// in tests an in-process channel to the dispatcher.
pub trait EventSource: Send + Sync {
    fn connect(&self) -> Result<mpsc::Receiver<OrderEvent>, ClientError>;
}

struct ActiveConnection {
    refcount: usize,
    fanout: broadcast::Sender<OrderEvent>,
    pump: JoinHandle<()>,
}

/// Ref-counted owner of the terminal's one realtime connection.
pub struct ConnectionManager {
    source: Arc<dyn EventSource>,
    active: Mutex<Option<ActiveConnection>>,
}

impl ConnectionManager {
    pub fn new(source: Arc<dyn EventSource>) -> Arc<Self> {
        Arc::new(Self {
            source,
            active: Mutex::new(None),
        })
    }

    /// Acquire a handle on the shared connection, establishing it on the
    /// first acquire and reusing it afterwards.
    pub fn acquire(self: Arc<Self>) -> Result<ConnectionHandle, ClientError> {
        let mut active = self.active.lock();

        if let Some(conn) = active.as_mut() {
            conn.refcount += 1;
            let events = conn.fanout.subscribe();
            drop(active);
            return Ok(ConnectionHandle {
                manager: self,
                events,
            });
        }

        let mut transport = self.source.connect()?;
        let (fanout, events) = broadcast::channel(FANOUT_CAPACITY);
        let pump_tx = fanout.clone();
        let weak = Arc::downgrade(&self);
        let pump = tokio::spawn(async move {
            while let Some(event) = transport.recv().await {
                // No receivers just means nobody is watching right now
                let _ = pump_tx.send(event);
            }
            tracing::debug!("Event transport closed");
            // Tear the shared state down so every consumer sees Closed
            // and falls back to polling until it reconnects
            if let Some(manager) = weak.upgrade() {
                *manager.active.lock() = None;
            }
        });

        *active = Some(ActiveConnection {
            refcount: 1,
            fanout,
            pump,
        });
        drop(active);
        tracing::debug!("Realtime connection established");

        Ok(ConnectionHandle {
            manager: self,
            events,
        })
    }

    /// Whether a connection is currently held open.
    pub fn is_connected(&self) -> bool {
        self.active.lock().is_some()
    }

    fn release(&self) {
        let mut active = self.active.lock();
        let Some(conn) = active.as_mut() else { return };
        conn.refcount -= 1;
        if conn.refcount == 0 {
            let conn = active.take().expect("checked above");
            conn.pump.abort();
            tracing::debug!("Last consumer released, connection closed");
        }
    }
}

/// One consumer's hold on the shared connection. Dropping it releases the
/// reference; the last drop closes the transport.
pub struct ConnectionHandle {
    manager: Arc<ConnectionManager>,
    events: broadcast::Receiver<OrderEvent>,
}

impl ConnectionHandle {
    /// Receive the next event. `Closed` means the transport dropped and
    /// the caller should fall back to polling and later reconnect.
    pub async fn recv(&mut self) -> Result<OrderEvent, broadcast::error::RecvError> {
        self.events.recv().await
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.manager.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::OrderEventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        connects: AtomicUsize,
        senders: Mutex<Vec<mpsc::Sender<OrderEvent>>>,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                connects: AtomicUsize::new(0),
                senders: Mutex::new(Vec::new()),
            })
        }

        async fn emit(&self, event: OrderEvent) {
            let senders = self.senders.lock().clone();
            for tx in senders {
                let _ = tx.send(event.clone()).await;
            }
        }
    }

    impl EventSource for CountingSource {
        fn connect(&self) -> Result<mpsc::Receiver<OrderEvent>, ClientError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(16);
            self.senders.lock().push(tx);
            Ok(rx)
        }
    }

    fn event() -> OrderEvent {
        OrderEvent::new("v1", "o1", 1, OrderEventKind::OrderCreated { table_id: None })
    }

    #[tokio::test]
    async fn consumers_share_one_transport_connection() {
        let source = CountingSource::new();
        let manager = ConnectionManager::new(source.clone());

        let mut a = manager.clone().acquire().unwrap();
        let mut b = manager.clone().acquire().unwrap();
        assert_eq!(source.connects.load(Ordering::SeqCst), 1);

        source.emit(event()).await;
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn last_release_closes_and_next_acquire_reconnects() {
        let source = CountingSource::new();
        let manager = ConnectionManager::new(source.clone());

        let a = manager.clone().acquire().unwrap();
        let b = manager.clone().acquire().unwrap();
        drop(a);
        assert!(manager.is_connected());
        drop(b);
        assert!(!manager.is_connected());

        let _c = manager.clone().acquire().unwrap();
        assert_eq!(source.connects.load(Ordering::SeqCst), 2);
    }
}
