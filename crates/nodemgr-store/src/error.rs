//! Error types for the storage layer.

use nodemgr_core::{FrontAddr, FrontId, GroupId};
use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("record not found")]
    NotFound,

    /// The (front, group) association already exists.
    #[error("mapping already exists: front {front_id} -> group {group_id}")]
    DuplicateMapping {
        /// Front side of the pair.
        front_id: FrontId,
        /// Group side of the pair.
        group_id: GroupId,
    },

    /// A front is already registered at this address.
    #[error("front already registered at {0}")]
    DuplicateFront(FrontAddr),

    /// An index key could not be decoded.
    #[error("corrupt key in {0}")]
    CorruptKey(&'static str),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Database(err.to_string())
    }
}
