//! Core types and utilities for the node manager.
//!
//! This crate provides the foundational types used throughout the node manager:
//!
//! - **Identifiers**: Strongly-typed IDs for groups and fronts
//! - **Addresses**: The `host:port` pair a front agent is reached at
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use nodemgr_core::{FrontAddr, GroupId};
//!
//! let group_id: GroupId = "7".parse().unwrap();
//! assert_eq!(group_id.get(), 7);
//!
//! let addr: FrontAddr = "10.0.0.1:8081".parse().unwrap();
//! assert_eq!(addr.port, 8081);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;

pub use error::{CoreError, Result};
pub use ids::{FrontAddr, FrontId, GroupId, IdError};
