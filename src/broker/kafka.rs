//! Kafka transport for [`BrokerProducer`](super::BrokerProducer), backed by librdkafka.
//!
//! librdkafka owns the bounded input queue and the internal retry budget.
//! Delivery reports arrive on the client's polling thread and are forwarded
//! onto the producer's success and failure streams.

use crate::broker::tls::TlsMaterial;
use crate::broker::{
    Delivered, DeliveryReporter, DeliveryTransport, FailedDelivery, OutboundMessage,
};
use crate::error::{ConfigError, SubmitError};
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::{ClientContext, Message};
use std::time::Duration;
use tracing::info;

/// Connection parameters for [`KafkaTransport::connect`].
#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
    pub topic: String,
    pub send_max_retries: u32,
    pub retry_backoff: Duration,
    pub message_timeout: Duration,
    pub queue_capacity: usize,
    pub metadata_timeout: Duration,
}

/// Client context forwarding per-message delivery reports.
struct ReportingContext {
    reporter: DeliveryReporter,
}

impl ClientContext for ReportingContext {}

impl ProducerContext for ReportingContext {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        match result {
            Ok(message) => self.reporter.delivered_blocking(Delivered {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            }),
            Err((error, message)) => self.reporter.failed_blocking(FailedDelivery {
                topic: message.topic().to_string(),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                error: error.to_string(),
            }),
        }
    }
}

pub struct KafkaTransport {
    producer: ThreadedProducer<ReportingContext>,
}

impl KafkaTransport {
    /// Builds a mutually authenticated producer and verifies the broker is
    /// reachable by fetching the topic metadata. Blocks the calling thread.
    pub fn connect(
        settings: &KafkaSettings,
        tls: &TlsMaterial,
        reporter: DeliveryReporter,
    ) -> Result<Self, ConfigError> {
        let producer: ThreadedProducer<ReportingContext> = ClientConfig::new()
            .set("bootstrap.servers", &settings.brokers)
            .set("security.protocol", "ssl")
            .set("ssl.certificate.pem", &tls.certificate_pem)
            .set("ssl.key.pem", &tls.key_pem)
            .set("ssl.ca.pem", &tls.ca_pem)
            .set("acks", "all")
            .set("message.send.max.retries", settings.send_max_retries.to_string())
            .set("retry.backoff.ms", settings.retry_backoff.as_millis().to_string())
            .set("message.timeout.ms", settings.message_timeout.as_millis().to_string())
            .set("queue.buffering.max.messages", settings.queue_capacity.to_string())
            .create_with_context(ReportingContext { reporter })
            .map_err(|e| ConfigError::Broker(e.to_string()))?;

        let metadata = producer
            .client()
            .fetch_metadata(Some(&settings.topic), settings.metadata_timeout)
            .map_err(|e| {
                ConfigError::Broker(format!("broker {} unreachable: {e}", settings.brokers))
            })?;
        info!(
            brokers = metadata.brokers().len(),
            topic = %settings.topic,
            "Connected to Kafka cluster"
        );

        Ok(Self { producer })
    }
}

impl DeliveryTransport for KafkaTransport {
    fn enqueue(&self, message: OutboundMessage) -> Result<(), SubmitError> {
        let record = BaseRecord::<(), [u8]>::to(&message.topic).payload(&message.payload);
        self.producer
            .send(record)
            .map_err(|(error, _record)| submit_error(error))
    }

    fn flush(&self, timeout: Duration) -> Result<(), SubmitError> {
        self.producer.flush(timeout).map_err(submit_error)
    }
}

fn submit_error(error: KafkaError) -> SubmitError {
    match error.rdkafka_error_code() {
        Some(RDKafkaErrorCode::QueueFull) => SubmitError::QueueFull,
        _ => SubmitError::Transport(error.to_string()),
    }
}
