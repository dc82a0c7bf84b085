//! HTTP server
//!
//! Provides:
//! - Dashboard and ticker pages as JSON view-models (/desktop, /view/{symbol})
//! - Quote API (/api/v1/{endpoint})
//! - Manual refreshes (/update/{action})

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::web::handlers;
use crate::web::session_layer::session_middleware;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    // Routes that read or write the visitor's session
    let pages = Router::new()
        .route("/desktop", get(handlers::desktop))
        .route("/view/:symbol", get(handlers::view_ticker))
        .route("/view/:symbol/:date", get(handlers::view_intraday))
        .route("/search/:kind", get(handlers::search))
        .route("/update/:action", post(handlers::update))
        .route_layer(middleware::from_fn_with_state(state.clone(), session_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ping", get(handlers::ping))
        .route("/api/v1/:endpoint", get(handlers::api_v1))
        .merge(pages)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server manager
pub struct WebServer {
    state: Arc<AppState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl WebServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            shutdown_tx: None,
        }
    }

    /// Bind the configured address and serve in the background
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let host = &self.state.config.listen_host;
        let port = self.state.config.listen_port;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid listen address {}:{}: {}", host, port, e)))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let app = router(self.state.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("HTTP server shutting down");
            });

            if let Err(e) = server.await {
                error!("HTTP server error: {}", e);
            }
        });

        info!("stockwatch listening on http://{}", local_addr);
        info!("  GET  /health, /ping");
        info!("  GET  /desktop");
        info!("  GET  /view/{{symbol}}?ts={{days}}");
        info!("  GET  /api/v1/version, /api/v1/quotes?symbols=A,B");
        info!("  POST /update/movers, /update/news?q={{query}}");

        Ok(local_addr)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("HTTP server stop signal sent");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Drop for WebServer {
    fn drop(&mut self) {
        self.stop();
    }
}
