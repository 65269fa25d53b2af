//! Venue server - the authoritative order engine for one venue.
//!
//! Accepts concurrent mutations to in-progress orders from many terminals,
//! serializes writers per order while rejecting stale readers, routes sent
//! items to preparation stations, and broadcasts committed changes to every
//! connected subscriber.
//!
//! # Architecture
//!
//! ```text
//! Terminal ──HTTP──▶ api ──▶ OrderService ──▶ OrderStore (redb)
//!                                 │ on commit
//!                    ┌────────────┴────────────┐
//!                    ▼                         ▼
//!             EventDispatcher           EffectsWorker
//!            (venue / station /      (tickets, inventory,
//!             terminal topics)          tip allocation)
//! ```

pub mod api;
pub mod core;
pub mod dispatch;
pub mod effects;
pub mod orders;
pub mod routing;
pub mod utils;
