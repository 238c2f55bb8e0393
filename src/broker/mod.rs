//! Asynchronous message-broker producer.
//!
//! Submission and acknowledgment are decoupled: [`BrokerProducer::send_message`]
//! only enqueues into the transport's input queue, while two long-lived
//! background loops consume the success and failure streams the transport
//! reports into. [`BrokerProducer::close`] flushes the transport, drops it
//! (closing both streams) and waits for both loops to finish, so every
//! accepted message is observed exactly once before it returns.

use crate::error::{ConfigError, SubmitError};
use crate::internal_metrics::Metrics;
use async_channel::{Receiver, Sender};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

pub mod kafka;
pub mod tls;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// A message handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// A message the broker acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// A message the transport gave up on after its internal retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelivery {
    pub topic: String,
    pub payload: Vec<u8>,
    pub error: String,
}

/// The sending half of the two result streams, owned by the transport.
///
/// Both streams close once the transport (and every clone of its reporter)
/// has been dropped.
#[derive(Debug, Clone)]
pub struct DeliveryReporter {
    delivered: Sender<Delivered>,
    failed: Sender<FailedDelivery>,
}

impl DeliveryReporter {
    pub async fn delivered(&self, record: Delivered) {
        if self.delivered.send(record).await.is_err() {
            warn!("Success stream closed before a delivery could be recorded");
        }
    }

    pub async fn failed(&self, record: FailedDelivery) {
        if self.failed.send(record).await.is_err() {
            warn!("Failure stream closed before a delivery failure could be recorded");
        }
    }

    /// Variant of [`Self::delivered`] for callbacks running on client threads.
    pub fn delivered_blocking(&self, record: Delivered) {
        if self.delivered.send_blocking(record).is_err() {
            warn!("Success stream closed before a delivery could be recorded");
        }
    }

    /// Variant of [`Self::failed`] for callbacks running on client threads.
    pub fn failed_blocking(&self, record: FailedDelivery) {
        if self.failed.send_blocking(record).is_err() {
            warn!("Failure stream closed before a delivery failure could be recorded");
        }
    }
}

/// The broker client underneath a [`BrokerProducer`].
///
/// Every message accepted by `enqueue` must eventually be reported on exactly
/// one of the reporter's streams, at the latest while the transport is dropped.
pub trait DeliveryTransport: Send + Sync + 'static {
    /// Hands a message to the client's input queue without waiting for the broker.
    fn enqueue(&self, message: OutboundMessage) -> Result<(), SubmitError>;

    /// Blocks until in-flight messages are resolved or `timeout` elapses.
    fn flush(&self, timeout: Duration) -> Result<(), SubmitError>;
}

/// Producer-level settings independent of the transport.
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub topic: String,
    /// Bound on each of the two result streams.
    pub result_channel_capacity: usize,
    pub flush_timeout: Duration,
}

/// Outcome counts observed by the background loops over the producer lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: u64,
    pub failed: u64,
}

impl DrainReport {
    pub fn total(&self) -> u64 {
        self.delivered + self.failed
    }
}

struct ResultLoops {
    successes: JoinHandle<u64>,
    failures: JoinHandle<u64>,
}

/// A TLS-authenticated, fire-and-forget producer bound to one topic.
pub struct BrokerProducer {
    topic: String,
    flush_timeout: Duration,
    transport: RwLock<Option<Box<dyn DeliveryTransport>>>,
    loops: Mutex<Option<ResultLoops>>,
}

impl BrokerProducer {
    /// Starts the result loops, then builds the transport with their reporter.
    ///
    /// `connect` runs on the blocking pool since broker clients probe the
    /// cluster synchronously. If it fails the reporter is dropped and both
    /// loops exit on their own.
    pub async fn start<T, F>(
        settings: ProducerSettings,
        metrics: Metrics,
        connect: F,
    ) -> Result<Self, ConfigError>
    where
        T: DeliveryTransport,
        F: FnOnce(DeliveryReporter) -> Result<T, ConfigError> + Send + 'static,
    {
        let capacity = settings.result_channel_capacity.max(1);
        let (delivered_tx, delivered_rx) = async_channel::bounded(capacity);
        let (failed_tx, failed_rx) = async_channel::bounded(capacity);

        let loops = ResultLoops {
            successes: tokio::spawn(run_success_loop(delivered_rx, metrics.clone())),
            failures: tokio::spawn(run_failure_loop(failed_rx, metrics)),
        };

        let reporter = DeliveryReporter {
            delivered: delivered_tx,
            failed: failed_tx,
        };
        let transport = tokio::task::spawn_blocking(move || connect(reporter))
            .await
            .map_err(|e| ConfigError::Broker(format!("broker connect task failed: {e}")))??;

        info!(topic = %settings.topic, "Broker producer started");
        Ok(Self {
            topic: settings.topic,
            flush_timeout: settings.flush_timeout,
            transport: RwLock::new(Some(Box::new(transport))),
            loops: Mutex::new(Some(loops)),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Enqueues one message for the configured topic.
    ///
    /// Returns as soon as the transport accepts the message; the broker
    /// acknowledgment is observed later by the background loops.
    pub fn send_message(&self, payload: Vec<u8>) -> Result<(), SubmitError> {
        let guard = self.transport.read().unwrap_or_else(PoisonError::into_inner);
        let transport = guard.as_ref().ok_or(SubmitError::Closed)?;
        transport.enqueue(OutboundMessage {
            topic: self.topic.clone(),
            payload,
        })
    }

    /// Stops accepting input, drains in-flight messages and joins both loops.
    ///
    /// Returns `None` if the producer was already closed.
    #[instrument(skip(self), fields(topic = %self.topic))]
    pub async fn close(&self) -> Option<DrainReport> {
        let transport = self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let loops = self
            .loops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(transport) = transport {
            info!("Closing broker producer, flushing in-flight messages...");
            let timeout = self.flush_timeout;
            let flushed = tokio::task::spawn_blocking(move || {
                let result = transport.flush(timeout);
                // Dropping the transport releases the reporter and closes both streams.
                drop(transport);
                result
            })
            .await;
            match flushed {
                Ok(Ok(())) => debug!("Broker producer flushed"),
                Ok(Err(e)) => warn!(error = %e, "Broker producer flush did not complete"),
                Err(e) => error!(error = %e, "Broker producer flush task panicked"),
            }
        }

        let loops = loops?;
        let delivered = loops.successes.await.unwrap_or_else(|e| {
            error!(error = %e, "Success loop panicked");
            0
        });
        let failed = loops.failures.await.unwrap_or_else(|e| {
            error!(error = %e, "Failure loop panicked");
            0
        });

        let report = DrainReport { delivered, failed };
        info!(delivered, failed, "Broker producer closed");
        Some(report)
    }
}

async fn run_success_loop(stream: Receiver<Delivered>, metrics: Metrics) -> u64 {
    debug!("Success loop started");
    let mut observed = 0;
    while let Ok(record) = stream.recv().await {
        observed += 1;
        metrics.record_broker_delivery(true);
        debug!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            "Message acknowledged by broker"
        );
    }
    debug!(observed, "Success stream closed");
    observed
}

async fn run_failure_loop(stream: Receiver<FailedDelivery>, metrics: Metrics) -> u64 {
    debug!("Failure loop started");
    let mut observed = 0;
    while let Ok(record) = stream.recv().await {
        observed += 1;
        metrics.record_broker_delivery(false);
        error!(
            topic = %record.topic,
            payload = %String::from_utf8_lossy(&record.payload),
            error = %record.error,
            "Message delivery failed"
        );
    }
    debug!(observed, "Failure stream closed");
    observed
}
