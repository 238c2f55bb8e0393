//! Core domain types and the sink capability for alert-relay
//!
//! This module defines the normalized alert batch that every sink consumes
//! and the trait contract each delivery backend implements.

use crate::error::DeliveryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The label that identifies an alert by name.
pub const ALERT_NAME_LABEL: &str = "alertname";

/// Lifecycle state of an alert batch or entry.
///
/// Alertmanager only ever sends `firing` and `resolved`; anything else is
/// preserved verbatim so backends with finer states can still see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
    #[serde(untagged)]
    Other(String),
}

impl AlertStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AlertStatus::Firing => "firing",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Other(status) => status,
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound notification: a group of alerts sharing a delivery transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBatch {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub group_key: String,
    #[serde(default)]
    pub truncated_alerts: u64,
    pub status: AlertStatus,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub group_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub common_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub common_annotations: BTreeMap<String, String>,
    #[serde(default, rename = "externalURL")]
    pub external_url: String,
    pub alerts: Vec<AlertEntry>,
}

impl AlertBatch {
    /// Parses a batch from the raw webhook body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

/// A single alert inside a batch.
///
/// `labels` and `annotations` may be empty but must be present in the payload;
/// a missing map is a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEntry {
    pub status: AlertStatus,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl AlertEntry {
    /// The identifying name of the alert, if the `alertname` label is set.
    pub fn name(&self) -> Option<&str> {
        self.labels
            .get(ALERT_NAME_LABEL)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Returns the first non-empty annotation among `keys`.
    pub fn annotation<'a>(&'a self, keys: &[&str]) -> Option<&'a str> {
        keys.iter()
            .filter_map(|key| self.annotations.get(*key))
            .map(String::as_str)
            .find(|value| !value.is_empty())
    }

    /// The short textual form used as a broker message value.
    pub fn summary_line(&self) -> String {
        format!(
            "Alert: {}, Status: {}",
            self.name().unwrap_or_default(),
            self.status
        )
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// A delivery backend for alert batches.
#[async_trait]
pub trait Sink: Send + Sync {
    /// A short, stable name for the backend (e.g., "console", "kafka").
    /// Used for logging and metrics.
    fn name(&self) -> &str;

    /// Attempts delivery of one alert batch.
    ///
    /// Implementations must not hold on to `batch` after returning.
    ///
    /// # Returns
    /// * `Ok(())` if the batch was delivered (or, for asynchronous backends,
    ///   accepted for delivery)
    /// * `Err(DeliveryError)` classified as malformed, unavailable or rejected
    async fn send(&self, batch: &AlertBatch) -> Result<(), DeliveryError>;

    /// Releases backend resources, draining anything still in flight.
    async fn close(&self) {}
}
