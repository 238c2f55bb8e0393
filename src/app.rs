//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::Sink,
    dispatcher::{build_sink, Dispatcher},
    internal_metrics::{Metrics, MetricsBuilder},
    server::{router, AppState, IngestServer},
};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

/// A handle to the running application.
pub struct App {
    local_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    server_task: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the ingestion server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the listener, waits for in-progress requests, then closes the
    /// sink so every enqueued broker message is resolved before returning.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down: stopping ingestion server...");
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.server_task.await {
            error!("Ingestion server task panicked: {:?}", e);
        }

        self.dispatcher.shutdown().await;
        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them, and lets tests
/// swap the configured sink and metrics for their own.
pub struct AppBuilder {
    config: Config,
    sink_override: Option<Arc<dyn Sink>>,
    metrics_override: Option<Metrics>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sink_override: None,
            metrics_override: None,
        }
    }

    /// Overrides the configured sink for testing.
    pub fn sink_override(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink_override = Some(sink);
        self
    }

    /// Overrides the metrics system for testing.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Builds all components, binds the listener and starts serving.
    ///
    /// Fails if the sink cannot be constructed (e.g., unreadable TLS
    /// material or an unreachable broker).
    #[instrument(skip_all)]
    pub async fn build(self) -> Result<App> {
        let config = self.config;

        let (metrics, prom_handle) = match self.metrics_override {
            Some(metrics) => (metrics, None),
            None => MetricsBuilder::new(config.metrics.clone()).build(),
        };

        let sink = match self.sink_override {
            Some(sink) => sink,
            None => build_sink(&config.sink, metrics.clone()).await?,
        };
        let dispatcher = Arc::new(Dispatcher::new(sink, metrics.clone()));

        let listener = TcpListener::bind(config.server.listen_address).await?;
        let local_addr = listener.local_addr()?;

        let state = AppState {
            dispatcher: dispatcher.clone(),
            metrics,
            debug: config.debug,
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = IngestServer::new(listener, router(state, prom_handle), shutdown_rx);
        let server_task = tokio::spawn(server.run());

        info!(
            address = %local_addr,
            sink = dispatcher.sink_name(),
            "Listening for alert webhooks"
        );
        Ok(App {
            local_addr,
            dispatcher,
            server_task,
            shutdown_tx,
        })
    }
}
