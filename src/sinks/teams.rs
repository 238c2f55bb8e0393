//! A client for posting alert batches to a Microsoft Teams workflow webhook.

use crate::config::TeamsConfig;
use crate::core::{AlertBatch, AlertEntry, AlertStatus, Sink};
use crate::error::{ConfigError, DeliveryError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Response header carrying the id of the workflow run started by a 202.
pub const WORKFLOW_RUN_ID_HEADER: &str = "x-ms-workflow-run-id";

#[derive(Debug, Serialize)]
struct TeamsPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    team: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    receiver: &'a str,
    status: &'a AlertStatus,
    alerts: &'a [AlertEntry],
}

pub struct TeamsSink {
    client: reqwest::Client,
    webhook_url: String,
    team: Option<String>,
    channel: Option<String>,
}

impl TeamsSink {
    pub fn new(config: &TeamsConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            webhook_url: config.webhook_url.clone(),
            team: config.team.clone(),
            channel: config.channel.clone(),
        })
    }
}

#[async_trait]
impl Sink for TeamsSink {
    fn name(&self) -> &str {
        "teams"
    }

    #[instrument(skip(self, batch), fields(count = batch.alerts.len()))]
    async fn send(&self, batch: &AlertBatch) -> Result<(), DeliveryError> {
        if batch.is_empty() {
            debug!("Empty alert batch, nothing to post to Teams.");
            return Ok(());
        }

        let payload = TeamsPayload {
            team: self.team.as_deref(),
            channel: self.channel.as_deref(),
            receiver: &batch.receiver,
            status: &batch.status,
            alerts: &batch.alerts,
        };

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request to Teams failed");
                DeliveryError::Unavailable(e.to_string())
            })?;

        match response.status() {
            StatusCode::OK => {
                info!("Successfully sent batch to Teams.");
                Ok(())
            }
            StatusCode::ACCEPTED => {
                let run_id = response
                    .headers()
                    .get(WORKFLOW_RUN_ID_HEADER)
                    .and_then(|value| value.to_str().ok());
                match run_id {
                    Some(run_id) => info!(run_id, "Teams accepted batch, workflow started."),
                    None => warn!("Teams accepted batch without a workflow run id."),
                }
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                error!(status = %status, body = %body, "Teams rejected alert batch");
                Err(DeliveryError::Rejected(format!(
                    "unexpected status {status}: {body}"
                )))
            }
        }
    }
}
