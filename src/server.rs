//! # Ingestion Server
//!
//! An `axum` router accepting Alertmanager webhooks on `POST /` and handing
//! each parsed batch to the [`Dispatcher`]. It also serves `/metrics` for
//! Prometheus when the recorder is installed, and `/healthz`.
//!
//! The caller gets one verdict per batch: 400 for an unparsable body, 500 if
//! the sink failed, 200 otherwise. Broker acknowledgments are not awaited.

use crate::core::AlertBatch;
use crate::dispatcher::Dispatcher;
use crate::error::DeliveryError;
use crate::internal_metrics::Metrics;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, trace, warn};

/// Why an ingestion request did not succeed.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid alert payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to deliver alert batch: {0}")]
    Delivery(#[from] DeliveryError),
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match self {
            IngestError::Parse(_) => StatusCode::BAD_REQUEST,
            IngestError::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Shared state for the ingestion handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Metrics,
    /// Log raw request bodies.
    pub debug: bool,
}

/// Builds the ingestion router.
pub fn router(state: AppState, prom_handle: Option<PrometheusHandle>) -> Router {
    let mut router = Router::new()
        .route("/", post(ingest))
        .route("/healthz", get(|| async { "ok" }));
    if let Some(handle) = prom_handle {
        router = router.route("/metrics", get(move || async move { handle.render() }));
    }
    router.with_state(state)
}

async fn ingest(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, IngestError> {
    if state.debug {
        debug!(body = %String::from_utf8_lossy(&body), "Received webhook");
    }
    state.metrics.received_messages_total.increment(1);

    let batch = AlertBatch::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Rejecting malformed alert payload");
        e
    })?;
    state.dispatcher.dispatch(&batch).await?;
    Ok(StatusCode::OK)
}

/// The ingestion listener and its shutdown signal.
pub struct IngestServer {
    listener: TcpListener,
    router: Router,
    shutdown_rx: watch::Receiver<bool>,
}

impl IngestServer {
    /// Creates a new `IngestServer` but does not spawn it.
    pub fn new(listener: TcpListener, router: Router, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            listener,
            router,
            shutdown_rx,
        }
    }

    /// Returns a future that serves requests until a shutdown signal is
    /// received, letting in-progress requests finish.
    pub fn run(self) -> impl Future<Output = ()> {
        let mut shutdown_rx = self.shutdown_rx;
        async move {
            let shutdown = async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
                trace!("Ingestion server received shutdown signal.");
            };
            if let Err(e) = axum::serve(self.listener, self.router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("Ingestion server error: {}", e);
            }
            trace!("Ingestion server task finished.");
        }
    }
}
