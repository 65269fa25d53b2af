//! Types shared between the venue server and terminal clients.
//!
//! Everything here crosses a process or network boundary at some point:
//! the order aggregate and its children, the domain events broadcast after
//! each committed mutation, the station/routing types consumed by kitchen
//! displays, and the validated wire inputs terminals submit.

pub mod event;
pub mod input;
pub mod order;
pub mod routing;

pub use event::{OrderEvent, OrderEventKind, Topic};
pub use input::{ModifierInput, NewItemInput, PaymentInput};
pub use order::{
    ItemClass, ItemStatus, ModifierSelection, Order, OrderItem, OrderStatus, Payment, TableRef,
};
pub use routing::{RoutingManifest, Station, StationTicket};

/// Current timestamp in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
