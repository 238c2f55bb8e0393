//! # Internal Metrics Module
//!
//! This module provides the infrastructure for collecting and exposing
//! delivery metrics.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: The entry point for initializing the metrics system.
//!   It installs the Prometheus recorder and hands back the render handle that
//!   the ingestion server exposes at `/metrics`.
//!
//! - **`Metrics`**: A lightweight, cloneable struct that serves as the public
//!   API for the rest of the application to interact with the metrics system.

use crate::config::MetricsConfig;
use metrics::{Counter, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing::error;

/// The public API for the metrics system.
///
/// This struct holds cloneable handles to the metrics collectors, one per
/// label combination, registered once against the global recorder.
#[derive(Clone)]
pub struct Metrics {
    pub received_messages_total: Counter,
    sent_success: Counter,
    sent_error: Counter,
    send_duration_success: Histogram,
    send_duration_error: Histogram,
    broker_delivered: Counter,
    broker_failed: Counter,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// supported metrics with the global recorder.
    pub fn new() -> Self {
        metrics::describe_counter!("received_messages_total", Unit::Count, "Total number of alert batches received by the ingestion endpoint.");
        metrics::describe_counter!("sent_messages_total", Unit::Count, "Total number of alert messages handed to the sink, labeled by the status of their batch.");
        metrics::describe_histogram!("message_send_duration_seconds", Unit::Seconds, "Time spent in the sink's send call, labeled by status.");
        metrics::describe_counter!("broker_deliveries_total", Unit::Count, "Broker acknowledgments observed by the result loops, labeled by outcome.");

        Self {
            received_messages_total: metrics::counter!("received_messages_total"),
            sent_success: metrics::counter!("sent_messages_total", "status" => "success"),
            sent_error: metrics::counter!("sent_messages_total", "status" => "error"),
            send_duration_success: metrics::histogram!("message_send_duration_seconds", "status" => "success"),
            send_duration_error: metrics::histogram!("message_send_duration_seconds", "status" => "error"),
            broker_delivered: metrics::counter!("broker_deliveries_total", "outcome" => "success"),
            broker_failed: metrics::counter!("broker_deliveries_total", "outcome" => "failure"),
        }
    }

    /// Creates a `Metrics` instance that performs no operations.
    /// Used when metrics are disabled in the configuration.
    pub fn disabled() -> Self {
        Self {
            received_messages_total: Counter::noop(),
            sent_success: Counter::noop(),
            sent_error: Counter::noop(),
            send_duration_success: Histogram::noop(),
            send_duration_error: Histogram::noop(),
            broker_delivered: Counter::noop(),
            broker_failed: Counter::noop(),
        }
    }

    /// Records one sink send of `alerts` messages and how long it took.
    pub fn record_send(&self, succeeded: bool, alerts: u64, duration: Duration) {
        let (counter, histogram) = if succeeded {
            (&self.sent_success, &self.send_duration_success)
        } else {
            (&self.sent_error, &self.send_duration_error)
        };
        counter.increment(alerts);
        histogram.record(duration.as_secs_f64());
    }

    /// Records one outcome observed on a broker result stream.
    pub fn record_broker_delivery(&self, delivered: bool) {
        if delivered {
            self.broker_delivered.increment(1);
        } else {
            self.broker_failed.increment(1);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    /// Creates a new `MetricsBuilder` with the given configuration.
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Installs the Prometheus recorder and returns a `Metrics` handle plus
    /// the handle used to render the scrape output.
    ///
    /// If metrics are disabled, or the recorder cannot be installed, a
    /// disabled `Metrics` instance and `None` are returned.
    pub fn build(self) -> (Metrics, Option<PrometheusHandle>) {
        if !self.config.enabled {
            return (Metrics::disabled(), None);
        }

        let builder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        ) {
            Ok(builder) => builder,
            Err(e) => {
                error!("Invalid histogram buckets for Prometheus recorder: {}", e);
                return (Metrics::disabled(), None);
            }
        };
        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::disabled(), None);
        }

        (Metrics::new(), Some(handle))
    }
}
