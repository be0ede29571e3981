//! Local stand-in for the Lambda runtime API.
//!
//! The function runtime is pointed at this server instead of the real runtime
//! API. It exposes the same four routes under `/2018-06-01/runtime`:
//!
//! - `GET  /invocation/next`: relayed, processed marker added
//! - `POST /invocation/{requestId}/response`: body scanned and redacted, then relayed
//! - `POST /init/error`: relayed verbatim
//! - `POST /invocation/{requestId}/error`: relayed verbatim
//!
//! Everything else is `404 Not Found`.

pub mod envelope;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info};

use crate::config::{AppConfig, DEFAULT_SCAN_FILENAME, RUNTIME_API_PREFIX};
use crate::error::{Result, ExtensionError};
use crate::pipeline::ScanPipeline;

/// Shared state for all proxy handlers.
pub struct AppState {
    /// Base URL of the real runtime API, including the version prefix.
    pub runtime_api_url: String,
    pub client: reqwest::Client,
    pub pipeline: Arc<ScanPipeline>,
    /// Document name used when scanning response bodies.
    pub scan_filename: String,
    pub mark_processed: bool,
    /// Signalled when the real runtime API cannot be reached.
    pub fatal: Arc<Notify>,
}

/// Build the axum router with the four runtime API routes.
pub fn router(state: Arc<AppState>) -> Router {
    let runtime = Router::new()
        .route("/invocation/next", get(routes::handle_next))
        .route(
            "/invocation/{request_id}/response",
            post(routes::handle_response),
        )
        .route("/init/error", post(routes::handle_init_error))
        .route(
            "/invocation/{request_id}/error",
            post(routes::handle_invocation_error),
        );

    Router::new()
        .nest(RUNTIME_API_PREFIX, runtime)
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn(routes::log_incoming_request))
        .with_state(state)
}

pub struct ProxyServer {
    listen_addr: String,
    runtime_api_url: String,
    pipeline: Arc<ScanPipeline>,
    scan_filename: String,
    mark_processed: bool,
    fatal: Arc<Notify>,
}

impl ProxyServer {
    pub fn new(listen_addr: String, runtime_api_url: String, pipeline: Arc<ScanPipeline>) -> Self {
        Self {
            listen_addr,
            runtime_api_url,
            pipeline,
            scan_filename: DEFAULT_SCAN_FILENAME.to_string(),
            mark_processed: true,
            fatal: Arc::new(Notify::new()),
        }
    }

    pub fn from_config(config: &AppConfig, pipeline: Arc<ScanPipeline>) -> Self {
        Self::new(
            config.proxy.listen_addr(),
            config.proxy.runtime_api_url(),
            pipeline,
        )
        .with_scan_filename(config.scanner.filename.clone())
        .with_processed_marker(config.proxy.mark_processed)
    }

    pub fn with_scan_filename(mut self, filename: String) -> Self {
        self.scan_filename = filename;
        self
    }

    pub fn with_processed_marker(mut self, enabled: bool) -> Self {
        self.mark_processed = enabled;
        self
    }

    /// Share a notifier that fires when the runtime API is unreachable.
    pub fn with_fatal_notifier(mut self, fatal: Arc<Notify>) -> Self {
        self.fatal = fatal;
        self
    }

    fn state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            runtime_api_url: self.runtime_api_url.clone(),
            client: reqwest::Client::new(),
            pipeline: self.pipeline.clone(),
            scan_filename: self.scan_filename.clone(),
            mark_processed: self.mark_processed,
            fatal: self.fatal.clone(),
        })
    }

    /// Start the proxy server and return the actual bound address.
    pub async fn start(&self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "Runtime API proxy listening on {} (upstream {})",
            local_addr, self.runtime_api_url
        );

        let app = router(self.state());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Runtime API proxy stopped: {}", ExtensionError::Io(e));
            }
        });

        Ok(local_addr)
    }
}
