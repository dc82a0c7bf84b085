//! Stockwatch - ticker watching service
//!
//! Serves ticker detail and dashboard view-models, cached live quotes,
//! daily movers and news. Stale ticker data is refreshed lazily: viewing a
//! ticker queues background work that a worker task drains.

pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod market;
pub mod providers;
pub mod queue;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod state;
pub mod util;
pub mod web;

use config::AppConfig;
use scheduler::{MaintenanceScheduler, RefreshWorker};
use state::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use web::WebServer;

fn init_tracing(debugging: bool) {
    let default_filter = if debugging {
        "stockwatch=debug,stockwatch_lib=debug,tower_http=debug"
    } else {
        "stockwatch=info,stockwatch_lib=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load configuration, start the background tasks and serve until Ctrl-C
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(config.debugging);

    tracing::info!("Starting stockwatch...");

    let (state, receiver) = AppState::new(config)?;
    let state = Arc::new(state);

    let worker = RefreshWorker::new(state.clone(), receiver).start();
    let maintenance = MaintenanceScheduler::new(state.clone()).start();

    let mut server = WebServer::new(state.clone());
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    server.stop();
    maintenance.abort();
    worker.abort();
    Ok(())
}
