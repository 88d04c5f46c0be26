//! HTTP gateway for the node manager.
//!
//! This crate exposes the group management API over HTTP using Axum. It
//! forwards every request to a [`nodemgr_control::GroupManager`] and runs
//! the periodic aggregation and reset tasks alongside the server.
//!
//! # Routes
//!
//! - `GET /health` - Health check
//! - `POST /group/generate/:front_ip/:front_port` - Generate a group on a front
//! - `POST /group/start/:group_id/:front_ip/:front_port` - Start a group on a front
//! - `GET /group/general/:group_id` - Group consistency view
//! - `GET /group/all` - Normal groups, triggers a background reset
//! - `GET /group/transDaily/:group_id` - Seven-day transaction series
//! - `GET /front`, `POST /front`, `DELETE /front/:front_id` - Front registry

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod tasks;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
pub use tasks::spawn_background_tasks;
