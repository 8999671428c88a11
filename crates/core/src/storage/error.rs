use thiserror::Error;

use super::KeyPair;

/// Errors that can occur during table store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{table} entity not found: ({partition_key}, {row_key})")]
    NotFound {
        table: String,
        partition_key: String,
        row_key: String,
    },
    #[error("{table} entity already exists: ({partition_key}, {row_key})")]
    Conflict {
        table: String,
        partition_key: String,
        row_key: String,
    },
    #[error("Table not found: {0}")]
    TableNotFound(String),
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Backend failure: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    pub fn not_found(table: impl Into<String>, key: &KeyPair) -> Self {
        Self::NotFound {
            table: table.into(),
            partition_key: key.partition_key.clone(),
            row_key: key.row_key.clone(),
        }
    }

    pub fn conflict(table: impl Into<String>, key: &KeyPair) -> Self {
        Self::Conflict {
            table: table.into(),
            partition_key: key.partition_key.clone(),
            row_key: key.row_key.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type for table store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
