//! # Live Lane Group Server
//!
//! HTTP front door over the [`LiveStatusManager`]. Every
//! `GET /lane-group/{laneGroupId}` returns the latest known lane states of
//! that group immediately and keeps (or starts) a background subscription
//! for it, so a client polling the endpoint keeps the data fresh.
//!
//! ## Endpoints
//! - `GET /lane-group/{laneGroupId}`: JSON array of
//!   `[laneId, signalState, timeLeft, timestamp]` tuples, `[]` until the first
//!   batch arrives.
//! - `GET /health`: returns `OK`.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use clap::Parser;
use tokio::signal;

use lib_signal::configs::{Config, load_config};
use lib_signal::loggers::setup_logging;
use lib_signal::{LaneEvent, LiveStatusManager, SpatStreamClient};

/// Command line of `server_live`.
#[derive(Parser, Debug)]
#[command(about = "HTTP server for live traffic-signal lane states", version)]
struct Cli {
    #[command(flatten)]
    config: Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = load_config(Cli::parse().config);
    setup_logging(&settings.log_dir, &settings.log_level, "server_live", true)?;

    let credentials = settings.credentials()?;
    let source = Arc::new(SpatStreamClient::new(settings.api_client()?, credentials));
    let manager = Arc::new(LiveStatusManager::new(source, settings.initial_lease));

    let addr: SocketAddr = format!("{}:{}", settings.bind_address, settings.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Live lane group server listening on http://{}", addr);

    axum::serve(listener, app(manager))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Shutdown complete.");
    Ok(())
}

/// Routes of the server, over a shared manager.
fn app(manager: Arc<LiveStatusManager>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/lane-group/{lane_group_id}", get(lane_group_handler))
        .with_state(manager)
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Latest cached batch for the lane group; also renews or starts its worker.
async fn lane_group_handler(
    Path(lane_group_id): Path<String>,
    State(manager): State<Arc<LiveStatusManager>>,
) -> Json<Vec<LaneEvent>> {
    log::debug!("Status requested for lane group {}", lane_group_id);
    Json(manager.request(&lane_group_id).events)
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => log::info!("SIGTERM received, initiating shutdown."),
    }
}
