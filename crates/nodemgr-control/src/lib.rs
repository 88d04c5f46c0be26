//! Control layer for node manager group management.
//!
//! This crate provides the business logic for managing consensus groups
//! across front agents: remote generate and start calls, the reset sweep
//! that reconciles local state against what fronts report, daily transaction
//! aggregation, and the per-group consistency view.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Gateway (HTTP)                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   GroupManagerService                       │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │ Orchestrator│ │ Reconciler  │ │  Trans Aggregator   │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │        Reset worker (bounded queue, one sweep)        │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                ┌─────────────┴─────────────┐
//!                ▼                           ▼
//!         ┌──────────┐                ┌──────────┐
//!         │  Store   │                │  Fronts  │
//!         │ (RocksDB)│                │  (HTTP)  │
//!         └──────────┘                └──────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use nodemgr_control::{
//!     ControlConfig, GenerateGroupRequest, GroupId, GroupManager, GroupManagerService,
//!     HttpFrontClient,
//! };
//! use nodemgr_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/nodemgr")?);
//! let config = ControlConfig::default();
//! let fronts = Arc::new(HttpFrontClient::new(&config)?);
//! let manager = GroupManagerService::new(store, fronts, config);
//!
//! manager.add_front("10.0.0.1", 8081).await?;
//! let request = GenerateGroupRequest::new(GroupId::new(2)?, 1_700_000_000_000, vec!["ab12".into()]);
//! let group = manager.generate_group(request, "10.0.0.1", 8081).await?;
//! println!("Generated group {}", group.group_id);
//! # Ok(())
//! # }
//! ```
//!
//! # Consistency
//!
//! Group, front and mapping rows are eventually consistent. The reset sweep
//! ends with [`nodemgr_store::Store::remove_invalid_maps`], which prunes
//! mappings that reference a missing front or a missing or invalid group.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod front_client;
pub mod orchestrator;
pub mod reconciler;
pub mod reset;
pub mod service;
pub mod trans_daily;
pub mod types;

pub use error::{ControlError, Result};
pub use front_client::{FrontClient, HttpFrontClient, TransactionTotal};
pub use orchestrator::{GroupOrchestrator, ResetReport};
pub use reconciler::{GroupReconciler, MAX_REFRESH_ATTEMPTS};
pub use reset::{ResetEvent, ResetWorker};
pub use service::{GroupManager, GroupManagerService};
pub use trans_daily::{FrontTransAggregator, TransAggregator};
pub use types::{ControlConfig, DayTrans, GenerateGroupRequest, GroupGeneral, SevenDaysTrans};

#[cfg(any(test, feature = "test-utils"))]
pub use front_client::MockFrontClient;

// Re-export commonly used types from dependencies for convenience
pub use nodemgr_core::{FrontAddr, FrontId, GroupId};
pub use nodemgr_store::{Front, FrontGroup, Group, GroupStatus};
