//! A sink publishing one Kafka message per alert entry.

use crate::broker::kafka::{KafkaSettings, KafkaTransport};
use crate::broker::tls::TlsMaterial;
use crate::broker::{BrokerProducer, ProducerSettings};
use crate::config::{KafkaConfig, MessageFormat};
use crate::core::{AlertBatch, AlertEntry, Sink};
use crate::error::{ConfigError, DeliveryError};
use crate::internal_metrics::Metrics;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub struct KafkaSink {
    producer: BrokerProducer,
    format: MessageFormat,
}

impl KafkaSink {
    /// Wraps an already started producer.
    pub fn new(producer: BrokerProducer, format: MessageFormat) -> Self {
        Self { producer, format }
    }

    /// Loads the TLS material, connects to the broker and starts the producer.
    ///
    /// Any failure here is fatal: without its broker the relay has nowhere
    /// to deliver.
    pub async fn connect(config: &KafkaConfig, metrics: Metrics) -> Result<Self, ConfigError> {
        let tls = TlsMaterial::load(
            config
                .client_cert_path
                .as_deref()
                .ok_or(ConfigError::Missing("sink.kafka.client_cert_path"))?,
            config
                .client_key_path
                .as_deref()
                .ok_or(ConfigError::Missing("sink.kafka.client_key_path"))?,
            config
                .ca_cert_path
                .as_deref()
                .ok_or(ConfigError::Missing("sink.kafka.ca_cert_path"))?,
        )?;

        let settings = KafkaSettings {
            brokers: config.broker_url.clone(),
            topic: config.topic.clone(),
            send_max_retries: config.send_max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            message_timeout: Duration::from_millis(config.message_timeout_ms),
            queue_capacity: config.queue_capacity,
            metadata_timeout: Duration::from_millis(config.metadata_timeout_ms),
        };
        let producer_settings = ProducerSettings {
            topic: config.topic.clone(),
            result_channel_capacity: config.result_channel_capacity,
            flush_timeout: config.flush_timeout(),
        };

        let producer = BrokerProducer::start(producer_settings, metrics, move |reporter| {
            KafkaTransport::connect(&settings, &tls, reporter)
        })
        .await?;
        Ok(Self::new(producer, config.message_format))
    }

    fn encode(&self, entry: &AlertEntry) -> Result<Vec<u8>, DeliveryError> {
        match self.format {
            MessageFormat::Summary => Ok(entry.summary_line().into_bytes()),
            MessageFormat::Json => serde_json::to_vec(entry)
                .map_err(|e| DeliveryError::MalformedInput(e.to_string())),
        }
    }
}

#[async_trait]
impl Sink for KafkaSink {
    fn name(&self) -> &str {
        "kafka"
    }

    /// Enqueues every entry in order; stops at the first rejected enqueue.
    /// Entries enqueued before the failure are still delivered.
    #[instrument(skip(self, batch), fields(topic = %self.producer.topic(), count = batch.alerts.len()))]
    async fn send(&self, batch: &AlertBatch) -> Result<(), DeliveryError> {
        for (index, entry) in batch.alerts.iter().enumerate() {
            let payload = self.encode(entry)?;
            if let Err(e) = self.producer.send_message(payload) {
                warn!(index, error = %e, "Broker producer rejected alert");
                return Err(e.into());
            }
        }
        debug!("Alert batch enqueued");
        Ok(())
    }

    async fn close(&self) {
        if let Some(report) = self.producer.close().await {
            info!(
                delivered = report.delivered,
                failed = report.failed,
                "Kafka sink drained"
            );
        }
    }
}
