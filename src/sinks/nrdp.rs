//! A client submitting alerts as passive check results over NRDP.
//!
//! Each alert entry becomes one service check result on the configured host.
//! The batch is encoded as JSON or XML (a deployment-time choice) and posted
//! as a form field together with the shared-secret token.

use crate::config::{NrdpConfig, NrdpFormat};
use crate::core::{AlertBatch, AlertEntry, AlertStatus, Sink};
use crate::error::{ConfigError, DeliveryError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Service name used when an alert carries no `alertname` label.
pub const FALLBACK_SERVICE_NAME: &str = "unnamed-alert";
/// Output used when an alert has neither a summary nor a description.
pub const FALLBACK_OUTPUT: &str = "No description provided";
/// Message the NRDP endpoint returns for an accepted submission.
pub const SUCCESS_MARKER: &str = "OK";
/// Status code the NRDP endpoint returns for an accepted submission.
const SUCCESS_STATUS: &str = "0";

const SUBMIT_COMMAND: &str = "submitcheck";
const SERVICE_CHECK: &str = "service";
const PASSIVE_CHECK_TYPE: &str = "1";

/// Nagios-style check state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl CheckState {
    /// Resolved alerts clear the check; every other status is critical.
    pub fn from_status(status: &AlertStatus) -> Self {
        match status {
            AlertStatus::Resolved => CheckState::Ok,
            _ => CheckState::Critical,
        }
    }

    pub fn code(self) -> String {
        (self as u8).to_string()
    }
}

/// One passive check result derived from an alert entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub hostname: String,
    pub servicename: String,
    pub state: CheckState,
    pub output: String,
}

impl CheckResult {
    pub fn from_alert(hostname: &str, alert: &AlertEntry) -> Self {
        Self {
            hostname: hostname.to_string(),
            servicename: alert.name().unwrap_or(FALLBACK_SERVICE_NAME).to_string(),
            state: CheckState::from_status(&alert.status),
            output: alert
                .annotation(&["summary", "description"])
                .unwrap_or(FALLBACK_OUTPUT)
                .to_string(),
        }
    }
}

// JSON envelope: {"checkresults": [{"checkresult": {"type": "service"}, ...}]}

#[derive(Serialize)]
struct JsonCheckResults<'a> {
    checkresults: Vec<JsonCheckResult<'a>>,
}

#[derive(Serialize)]
struct JsonCheckType {
    #[serde(rename = "type")]
    check_type: &'static str,
}

#[derive(Serialize)]
struct JsonCheckResult<'a> {
    checkresult: JsonCheckType,
    hostname: &'a str,
    servicename: &'a str,
    state: String,
    output: &'a str,
}

// XML envelope: <checkresults><checkresult type="service" checktype="1">...</checkresult></checkresults>

#[derive(Serialize)]
#[serde(rename = "checkresults")]
struct XmlCheckResults<'a> {
    checkresult: Vec<XmlCheckResult<'a>>,
}

#[derive(Serialize)]
struct XmlCheckResult<'a> {
    #[serde(rename = "@type")]
    check_type: &'static str,
    #[serde(rename = "@checktype")]
    checktype: &'static str,
    hostname: &'a str,
    servicename: &'a str,
    state: String,
    output: &'a str,
}

/// Encodes check results in the configured wire format.
///
/// Returns the form field name and the encoded document.
pub fn encode(format: NrdpFormat, results: &[CheckResult]) -> Result<(&'static str, String), DeliveryError> {
    match format {
        NrdpFormat::Json => {
            let envelope = JsonCheckResults {
                checkresults: results
                    .iter()
                    .map(|r| JsonCheckResult {
                        checkresult: JsonCheckType {
                            check_type: SERVICE_CHECK,
                        },
                        hostname: &r.hostname,
                        servicename: &r.servicename,
                        state: r.state.code(),
                        output: &r.output,
                    })
                    .collect(),
            };
            let json = serde_json::to_string(&envelope)
                .map_err(|e| DeliveryError::MalformedInput(e.to_string()))?;
            Ok(("json", json))
        }
        NrdpFormat::Xml => {
            let envelope = XmlCheckResults {
                checkresult: results
                    .iter()
                    .map(|r| XmlCheckResult {
                        check_type: SERVICE_CHECK,
                        checktype: PASSIVE_CHECK_TYPE,
                        hostname: &r.hostname,
                        servicename: &r.servicename,
                        state: r.state.code(),
                        output: &r.output,
                    })
                    .collect(),
            };
            let body = quick_xml::se::to_string(&envelope)
                .map_err(|e| DeliveryError::MalformedInput(e.to_string()))?;
            Ok(("xml", format!("<?xml version='1.0'?>{body}")))
        }
    }
}

pub struct NrdpSink {
    client: reqwest::Client,
    url: String,
    token: String,
    hostname: String,
    format: NrdpFormat,
}

impl NrdpSink {
    pub fn new(config: &NrdpConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            token: config.token.clone(),
            hostname: config.hostname.clone(),
            format: config.format,
        })
    }
}

/// The `<result>` element (or `result` object) of an NRDP response.
#[derive(Debug, Default, Deserialize)]
struct NrdpResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl NrdpResponse {
    fn from_json(value: &serde_json::Value) -> Self {
        let result = value.get("result").unwrap_or(value);
        let field = |name: &str| {
            result.get(name).map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        };
        Self {
            status: field("status"),
            message: field("message"),
        }
    }

    /// Every reported field must signal success, and at least one must be present.
    fn is_success(&self) -> bool {
        let status_ok = self.status.as_deref().map(|s| s.trim() == SUCCESS_STATUS);
        let message_ok = self.message.as_deref().map(|m| m.trim() == SUCCESS_MARKER);
        match (status_ok, message_ok) {
            (None, None) => false,
            (status, message) => status.unwrap_or(true) && message.unwrap_or(true),
        }
    }
}

/// Decides whether an NRDP response body reports an accepted submission.
///
/// Accepts a bare `OK`, a JSON `result` object or an XML `<result>` element.
/// Error replies such as `<message>BAD TOKEN</message>` are not successes.
pub fn is_success_response(body: &str) -> bool {
    let body = body.trim();
    if body == SUCCESS_MARKER {
        return true;
    }
    if body.starts_with('{') {
        return serde_json::from_str::<serde_json::Value>(body)
            .map(|value| NrdpResponse::from_json(&value).is_success())
            .unwrap_or(false);
    }
    quick_xml::de::from_str::<NrdpResponse>(body)
        .map(|response| response.is_success())
        .unwrap_or(false)
}

#[async_trait]
impl Sink for NrdpSink {
    fn name(&self) -> &str {
        "nrdp"
    }

    /// Submits the whole batch in one request; there is no partial success.
    #[instrument(skip(self, batch), fields(count = batch.alerts.len()))]
    async fn send(&self, batch: &AlertBatch) -> Result<(), DeliveryError> {
        if batch.is_empty() {
            debug!("Empty alert batch, nothing to submit over NRDP.");
            return Ok(());
        }

        let results: Vec<CheckResult> = batch
            .alerts
            .iter()
            .map(|alert| CheckResult::from_alert(&self.hostname, alert))
            .collect();
        let (field, document) = encode(self.format, &results)?;

        let form = [
            ("token", self.token.as_str()),
            ("cmd", SUBMIT_COMMAND),
            (field, document.as_str()),
        ];
        let response = self
            .client
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send NRDP request");
                DeliveryError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Unavailable(e.to_string()))?;
        if status != StatusCode::OK || !is_success_response(&body) {
            error!(status = %status, body = %body, "NRDP response error");
            return Err(DeliveryError::Rejected(format!(
                "NRDP responded {status}: {body}"
            )));
        }

        info!("NRDP submission successful: {} alert(s) sent", results.len());
        Ok(())
    }
}
