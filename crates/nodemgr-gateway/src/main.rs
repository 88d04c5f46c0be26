//! Node manager gateway.
//!
//! Serves the group management API and runs the periodic aggregation and
//! reset tasks. Configuration comes from the environment: `LISTEN_ADDR`,
//! `DATA_DIR`, plus the front and scheduling settings read by
//! [`ControlConfig::from_env`].

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nodemgr_control::{ControlConfig, GroupManagerService, HttpFrontClient};
use nodemgr_gateway::{create_router, spawn_background_tasks, GatewayConfig, GatewayState};
use nodemgr_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,nodemgr=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting node manager gateway");

    let mut gateway_config = GatewayConfig::default();
    if let Ok(addr) = std::env::var("LISTEN_ADDR") {
        gateway_config.listen_addr = addr;
    }
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/nodemgr".into());
    let control_config = ControlConfig::from_env();

    tracing::info!(
        listen_addr = %gateway_config.listen_addr,
        data_dir = %data_dir,
        front_base_path = %control_config.front_base_path,
        front_timeout_secs = control_config.front_timeout_seconds,
        "Gateway configuration loaded"
    );

    tracing::info!(path = %data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&data_dir)?);

    let fronts = Arc::new(HttpFrontClient::new(&control_config)?);
    let manager = Arc::new(GroupManagerService::new(
        store,
        fronts,
        control_config.clone(),
    ));
    let _tasks = spawn_background_tasks(&manager, &control_config);

    let listen_addr = gateway_config.listen_addr.clone();
    let app = create_router(GatewayState::new(manager, gateway_config));

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
