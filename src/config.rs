//! Configuration management for alert-relay
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer defaults, an optional TOML file, environment variables and
//! command-line arguments.

use crate::cli::Cli;
use crate::error::ConfigError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Debug mode: verbose logging, including raw inbound payloads.
    #[serde(default)]
    pub debug: bool,
    /// Configuration for the ingestion HTTP server.
    pub server: ServerConfig,
    /// Configuration for the metrics system.
    pub metrics: MetricsConfig,
    /// Configuration for the delivery backend.
    pub sink: SinkConfig,
}

/// Configuration for the ingestion HTTP server.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// The address to listen on for alert webhooks.
    pub listen_address: SocketAddr,
}

/// Configuration for the metrics system.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder and serve `/metrics`.
    pub enabled: bool,
}

/// The delivery backend selected at startup.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    #[serde(alias = "stdout")]
    Console,
    Kafka,
    #[serde(alias = "msteams")]
    Teams,
    #[serde(alias = "centreon")]
    Nrdp,
}

impl FromStr for SinkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "stdout" => Ok(SinkKind::Console),
            "kafka" => Ok(SinkKind::Kafka),
            "teams" | "msteams" => Ok(SinkKind::Teams),
            "nrdp" | "centreon" => Ok(SinkKind::Nrdp),
            other => Err(ConfigError::Invalid {
                key: "sink.kind",
                reason: format!("unknown sink `{other}`"),
            }),
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SinkKind::Console => "console",
            SinkKind::Kafka => "kafka",
            SinkKind::Teams => "teams",
            SinkKind::Nrdp => "nrdp",
        };
        f.write_str(name)
    }
}

/// Configuration for the delivery backend.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SinkConfig {
    /// Which backend receives the alert batches.
    pub kind: SinkKind,
    pub kafka: KafkaConfig,
    pub teams: TeamsConfig,
    pub nrdp: NrdpConfig,
}

/// The value written for each alert entry on the broker.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// `Alert: <name>, Status: <status>`
    Summary,
    /// The alert entry serialized as JSON.
    Json,
}

/// Configuration for the Kafka sink.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct KafkaConfig {
    /// Bootstrap broker address, e.g. `kafka-1:9093`.
    pub broker_url: String,
    pub topic: String,
    pub client_cert_path: Option<PathBuf>,
    pub client_key_path: Option<PathBuf>,
    pub ca_cert_path: Option<PathBuf>,
    pub message_format: MessageFormat,
    /// Retries librdkafka performs before reporting a message as failed.
    pub send_max_retries: u32,
    pub retry_backoff_ms: u64,
    pub message_timeout_ms: u64,
    /// Maximum number of messages waiting in the producer input queue.
    pub queue_capacity: usize,
    /// Bound on each of the success and failure streams.
    pub result_channel_capacity: usize,
    pub flush_timeout_ms: u64,
    /// How long the startup reachability probe may take.
    pub metadata_timeout_ms: u64,
}

impl KafkaConfig {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

/// Configuration for the Microsoft Teams workflow webhook sink.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TeamsConfig {
    pub webhook_url: String,
    /// Team display name added to every payload.
    pub team: Option<String>,
    /// Channel display name added to every payload.
    pub channel: Option<String>,
    pub timeout_ms: u64,
}

/// Wire encoding of NRDP check results, chosen per deployment.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NrdpFormat {
    Json,
    Xml,
}

/// Configuration for the NRDP passive-check sink.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NrdpConfig {
    pub url: String,
    pub token: String,
    /// Host the check results are attached to.
    pub hostname: String,
    pub format: NrdpFormat,
    /// Accept invalid TLS certificates from the NRDP endpoint.
    pub insecure_skip_verify: bool,
    pub timeout_ms: u64,
}

/// Maps the unprefixed variables of existing deployments onto config keys.
fn legacy_env_key(name: &str) -> Option<&'static str> {
    let key = match name.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "RECEIVER" => "sink.kind",
        "KAFKA_BROKER_URL" => "sink.kafka.broker_url",
        "KAFKA_TOPIC" => "sink.kafka.topic",
        "KAFKA_CLIENT_CERT" => "sink.kafka.client_cert_path",
        "KAFKA_CLIENT_KEY" => "sink.kafka.client_key_path",
        "KAFKA_CA_CERT" => "sink.kafka.ca_cert_path",
        "MSTEAMS_WEBHOOK_URL" => "sink.teams.webhook_url",
        "CENTREON_NRDP_URL" => "sink.nrdp.url",
        "CENTREON_NRDP_TOKEN" => "sink.nrdp.token",
        "CENTREON_MONITORING_HOSTNAME" => "sink.nrdp.hostname",
        "INSECURE_SKIP_VERIFY" => "sink.nrdp.insecure_skip_verify",
        _ => return None,
    };
    Some(key)
}

impl Config {
    /// Loads the application configuration by layering defaults, the TOML
    /// file given on the command line, `ALERT_RELAY_*` variables, the legacy
    /// unprefixed variables and CLI flags, in increasing precedence.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            // e.g. ALERT_RELAY_SINK__KAFKA__TOPIC=alerts
            .merge(Env::prefixed("ALERT_RELAY_").split("__"))
            // Variables of existing deployments take precedence over prefixed ones.
            .merge(Env::raw().filter_map(|key| legacy_env_key(key.as_str()).map(Into::into)))
            .merge(cli)
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the selected sink has everything it needs to start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.sink.kind {
            SinkKind::Console => {}
            SinkKind::Kafka => {
                let kafka = &self.sink.kafka;
                require(&kafka.broker_url, "sink.kafka.broker_url")?;
                require(&kafka.topic, "sink.kafka.topic")?;
                if kafka.client_cert_path.is_none() {
                    return Err(ConfigError::Missing("sink.kafka.client_cert_path"));
                }
                if kafka.client_key_path.is_none() {
                    return Err(ConfigError::Missing("sink.kafka.client_key_path"));
                }
                if kafka.ca_cert_path.is_none() {
                    return Err(ConfigError::Missing("sink.kafka.ca_cert_path"));
                }
            }
            SinkKind::Teams => require(&self.sink.teams.webhook_url, "sink.teams.webhook_url")?,
            SinkKind::Nrdp => {
                require(&self.sink.nrdp.url, "sink.nrdp.url")?;
                require(&self.sink.nrdp.token, "sink.nrdp.token")?;
                require(&self.sink.nrdp.hostname, "sink.nrdp.hostname")?;
            }
        }
        Ok(())
    }

    /// The effective tracing filter directive.
    pub fn log_filter(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }
}

fn require(value: &str, key: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(key));
    }
    Ok(())
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug: false,
            server: ServerConfig {
                listen_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            },
            metrics: MetricsConfig { enabled: true },
            sink: SinkConfig {
                kind: SinkKind::Console,
                kafka: KafkaConfig {
                    broker_url: String::new(),
                    topic: String::new(),
                    client_cert_path: None,
                    client_key_path: None,
                    ca_cert_path: None,
                    message_format: MessageFormat::Summary,
                    send_max_retries: 3,
                    retry_backoff_ms: 100,
                    message_timeout_ms: 30_000,
                    queue_capacity: 100_000,
                    result_channel_capacity: 1024,
                    flush_timeout_ms: 10_000,
                    metadata_timeout_ms: 5_000,
                },
                teams: TeamsConfig {
                    webhook_url: String::new(),
                    team: None,
                    channel: None,
                    timeout_ms: 10_000,
                },
                nrdp: NrdpConfig {
                    url: String::new(),
                    token: String::new(),
                    hostname: String::new(),
                    format: NrdpFormat::Json,
                    insecure_skip_verify: false,
                    timeout_ms: 5_000,
                },
            },
        }
    }
}
