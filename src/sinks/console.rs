//! A sink that writes alert batches to the structured log.
//!
//! This is the default backend and is handy for debugging the ingestion path.

use crate::core::{AlertBatch, Sink};
use crate::error::DeliveryError;
use async_trait::async_trait;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, batch: &AlertBatch) -> Result<(), DeliveryError> {
        match serde_json::to_string(batch) {
            Ok(payload) => info!(alerts = batch.alerts.len(), %payload, "Alert batch received"),
            Err(e) => warn!(error = %e, ?batch, "Alert batch could not be serialized"),
        }
        Ok(())
    }
}
