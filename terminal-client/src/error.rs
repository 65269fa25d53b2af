//! Client-side errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Buffered mutation of {bytes} bytes exceeds the {limit} byte ceiling")]
    BufferTooLarge { bytes: usize, limit: usize },

    #[error("Not connected")]
    Disconnected,
}

impl From<redb::DatabaseError> for ClientError {
    fn from(e: redb::DatabaseError) -> Self {
        ClientError::Storage(e.to_string())
    }
}

impl From<redb::TransactionError> for ClientError {
    fn from(e: redb::TransactionError) -> Self {
        ClientError::Storage(e.to_string())
    }
}

impl From<redb::TableError> for ClientError {
    fn from(e: redb::TableError) -> Self {
        ClientError::Storage(e.to_string())
    }
}

impl From<redb::StorageError> for ClientError {
    fn from(e: redb::StorageError) -> Self {
        ClientError::Storage(e.to_string())
    }
}

impl From<redb::CommitError> for ClientError {
    fn from(e: redb::CommitError) -> Self {
        ClientError::Storage(e.to_string())
    }
}
