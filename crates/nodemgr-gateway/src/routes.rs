//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use nodemgr_control::GroupManager;

use crate::handlers::{fronts, groups, health};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// See the crate documentation for the route list.
pub fn create_router<M>(state: GatewayState<M>) -> Router
where
    M: GroupManager + 'static,
{
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health::health))
        // Groups
        .route(
            "/group/generate/:front_ip/:front_port",
            post(groups::generate_group::<M>),
        )
        .route(
            "/group/start/:group_id/:front_ip/:front_port",
            post(groups::start_group::<M>),
        )
        .route(
            "/group/general/:group_id",
            get(groups::get_group_general::<M>),
        )
        .route("/group/all", get(groups::list_groups::<M>))
        .route(
            "/group/transDaily/:group_id",
            get(groups::get_trans_daily::<M>),
        )
        // Fronts
        .route(
            "/front",
            get(fronts::list_fronts::<M>).post(fronts::add_front::<M>),
        )
        .route("/front/:front_id", delete(fronts::remove_front::<M>))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
