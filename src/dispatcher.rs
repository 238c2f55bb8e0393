//! Routes each inbound alert batch to the one sink selected at startup.

use crate::config::{SinkConfig, SinkKind};
use crate::core::{AlertBatch, Sink};
use crate::error::{ConfigError, DeliveryError};
use crate::internal_metrics::Metrics;
use crate::sinks::{ConsoleSink, KafkaSink, NrdpSink, TeamsSink};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Constructs the sink named by the configuration.
pub async fn build_sink(config: &SinkConfig, metrics: Metrics) -> Result<Arc<dyn Sink>, ConfigError> {
    let sink: Arc<dyn Sink> = match config.kind {
        SinkKind::Console => Arc::new(ConsoleSink::new()),
        SinkKind::Kafka => Arc::new(KafkaSink::connect(&config.kafka, metrics).await?),
        SinkKind::Teams => Arc::new(TeamsSink::new(&config.teams)?),
        SinkKind::Nrdp => Arc::new(NrdpSink::new(&config.nrdp)?),
    };
    Ok(sink)
}

/// Forwards batches to the selected sink and records send metrics.
pub struct Dispatcher {
    sink: Arc<dyn Sink>,
    metrics: Metrics,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn Sink>, metrics: Metrics) -> Self {
        info!(sink = sink.name(), "Dispatcher using sink");
        Self { sink, metrics }
    }

    /// Builds the configured sink and wraps it.
    pub async fn from_config(config: &SinkConfig, metrics: Metrics) -> Result<Self, ConfigError> {
        let sink = build_sink(config, metrics.clone()).await?;
        Ok(Self::new(sink, metrics))
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Hands one batch to the sink. Failures are logged and returned; the
    /// dispatcher never re-attempts a send.
    pub async fn dispatch(&self, batch: &AlertBatch) -> Result<(), DeliveryError> {
        let start = Instant::now();
        let result = self.sink.send(batch).await;
        let elapsed = start.elapsed();
        let alerts = batch.alerts.len() as u64;

        match &result {
            Ok(()) => self.metrics.record_send(true, alerts, elapsed),
            Err(e) => {
                self.metrics.record_send(false, alerts, elapsed);
                error!(
                    sink = self.sink.name(),
                    kind = e.kind(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "Failed to deliver alert batch"
                );
            }
        }
        result
    }

    /// Closes the sink, draining any in-flight deliveries.
    pub async fn shutdown(&self) {
        info!(sink = self.sink.name(), "Shutting down sink");
        self.sink.close().await;
    }
}
