//! Domain errors surfaced by the order service.

use shared::OrderStatus;
use thiserror::Error;

use super::store::StoreError;

/// Errors returned to callers of the mutation pipeline.
///
/// `VersionConflict` and `TableOccupied` are expected, retryable conditions
/// and carry what the caller needs to retry correctly (the current version,
/// the existing order). `AlreadyPaid` and `InvalidTransition` are terminal
/// for the request and meant to be shown to the user. `Busy` is pool
/// exhaustion after a bounded wait — retryable, never fatal.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Stale write: current version is {current_version}")]
    VersionConflict { current_version: u64 },

    #[error("Table {table_id} is already occupied by order {existing_order_id}")]
    TableOccupied {
        table_id: String,
        existing_order_id: String,
    },

    #[error("Order {order_id} is already paid (payment {payment_id})")]
    AlreadyPaid {
        order_id: String,
        payment_id: String,
    },

    #[error("Cannot {operation} an order in {status:?} status")]
    InvalidTransition {
        status: OrderStatus,
        operation: &'static str,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Unknown menu item: {0}")]
    UnknownMenuItem(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Order store is at capacity, retry shortly")]
    Busy,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl OrderError {
    /// Whether the caller should retry (possibly after refreshing state).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrderError::VersionConflict { .. } | OrderError::Busy
        )
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { current_version } => {
                OrderError::VersionConflict { current_version }
            }
            StoreError::TableOccupied {
                table_id,
                existing_order_id,
            } => OrderError::TableOccupied {
                table_id,
                existing_order_id,
            },
            StoreError::OrderNotFound(id) => OrderError::OrderNotFound(id),
            StoreError::Busy => OrderError::Busy,
            other => OrderError::Storage(other.to_string()),
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;
