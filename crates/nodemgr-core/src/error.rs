//! Common error types for the node manager.
//!
//! This module provides shared error types that are used across multiple crates.

use crate::ids::{FrontAddr, FrontId};
use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout the node manager.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A front with the specified ID was not found.
    #[error("front not found: {0}")]
    FrontNotFound(FrontId),

    /// No front is registered at the specified address.
    #[error("no front registered at {0}")]
    UnknownFrontAddr(FrontAddr),

    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),
}
