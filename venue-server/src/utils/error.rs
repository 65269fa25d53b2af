//! Unified HTTP error handling.
//!
//! Domain errors ([`OrderError`]) are transport-agnostic; this module maps
//! them onto HTTP responses in a single envelope:
//!
//! ```json
//! {
//!   "code": "VERSION_CONFLICT",
//!   "message": "Stale write: current version is 4",
//!   "data": { "current_version": 4 }
//! }
//! ```
//!
//! Retryable conditions carry the data a terminal needs to retry correctly:
//! the current version on a stale write, the existing order id on an
//! occupied table.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::orders::OrderError;

/// API response envelope. `code` is `"OK"` on success.
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> AppResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: "OK".to_string(),
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Application error as seen by HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Stale write: current version is {current_version}")]
    VersionConflict { current_version: u64 },

    #[error("Table {table_id} is already occupied by order {existing_order_id}")]
    TableOccupied {
        table_id: String,
        existing_order_id: String,
    },

    #[error("Order {order_id} is already paid")]
    AlreadyPaid {
        order_id: String,
        payment_id: String,
    },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Service busy, retry shortly")]
    Busy,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::VersionConflict { current_version } => {
                AppError::VersionConflict { current_version }
            }
            OrderError::TableOccupied {
                table_id,
                existing_order_id,
            } => AppError::TableOccupied {
                table_id,
                existing_order_id,
            },
            OrderError::AlreadyPaid {
                order_id,
                payment_id,
            } => AppError::AlreadyPaid {
                order_id,
                payment_id,
            },
            OrderError::OrderNotFound(id) | OrderError::ItemNotFound(id) => AppError::NotFound(id),
            OrderError::UnknownMenuItem(id) => {
                AppError::Validation(format!("unknown menu item: {id}"))
            }
            e @ OrderError::InvalidTransition { .. } => AppError::InvalidTransition(e.to_string()),
            OrderError::InvalidAmount(msg) | OrderError::InvalidOperation(msg) => {
                AppError::Validation(msg)
            }
            OrderError::Busy => AppError::Busy,
            OrderError::Storage(msg) => AppError::Internal(msg),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, data) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            AppError::VersionConflict { current_version } => (
                StatusCode::CONFLICT,
                "VERSION_CONFLICT",
                Some(json!({ "current_version": current_version })),
            ),
            AppError::TableOccupied {
                existing_order_id, ..
            } => (
                StatusCode::CONFLICT,
                "TABLE_OCCUPIED",
                Some(json!({ "existing_order_id": existing_order_id })),
            ),
            AppError::AlreadyPaid { payment_id, .. } => (
                StatusCode::CONFLICT,
                "ALREADY_PAID",
                Some(json!({ "payment_id": payment_id })),
            ),
            AppError::InvalidTransition(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_TRANSITION", None)
            }
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION", None),
            AppError::Busy => (StatusCode::SERVICE_UNAVAILABLE, "BUSY", None),
            AppError::Internal(msg) => {
                error!(error = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", None)
            }
        };

        let body = AppResponse::<serde_json::Value> {
            code: code.to_string(),
            message: self.to_string(),
            data,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors_carry_retry_data() {
        let err = AppError::from(OrderError::VersionConflict { current_version: 4 });
        match err {
            AppError::VersionConflict { current_version } => assert_eq!(current_version, 4),
            other => panic!("unexpected mapping: {other:?}"),
        }

        let err = AppError::from(OrderError::TableOccupied {
            table_id: "T5".to_string(),
            existing_order_id: "o-1".to_string(),
        });
        match err {
            AppError::TableOccupied {
                existing_order_id, ..
            } => assert_eq!(existing_order_id, "o-1"),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
