//! Terminal client - per-terminal synchronization against the venue server.
//!
//! Each terminal keeps a local view of the venue's active orders and keeps
//! it honest three ways:
//!
//! - **realtime**: one shared, ref-counted event subscription; removal
//!   events apply locally with zero network, everything else schedules a
//!   debounced refetch
//! - **fallback**: when the subscription is down, periodic polling at a
//!   much slower cadence
//! - **recovery**: item mutations buffered locally before a crash are
//!   replayed from a durable queue and merged against server state on the
//!   next load
//!
//! Missed events are never replayed by the server, so every reconnect
//! starts with one unconditional full refresh.

pub mod connection;
pub mod error;
pub mod feed;
pub mod recovery;
pub mod state;
pub mod sync;

pub use connection::{ConnectionHandle, ConnectionManager, EventSource};
pub use error::ClientError;
pub use feed::OrderFeed;
pub use recovery::{RecoveredItems, RecoveryQueue};
pub use state::LocalOrderCache;
pub use sync::{SyncAgent, SyncAction, SyncConfig};
