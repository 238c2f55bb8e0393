//! Error taxonomy shared by the sinks, the broker producer and startup.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal startup errors. The process cannot run without a valid sink.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("invalid TLS material at {}: {reason}", path.display())]
    TlsMaterial { path: PathBuf, reason: String },

    #[error("broker client error: {0}")]
    Broker(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// The broker producer refused to accept a message into its input queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("producer is closed")]
    Closed,

    #[error("producer input queue is full")]
    QueueFull,

    #[error("producer rejected message: {0}")]
    Transport(String),
}

/// Outcome of a failed delivery attempt, classified by who is at fault.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The batch cannot be encoded for this backend. Never retried.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The backend could not be reached. Safe to retry.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend was reached but declined the message. Not retried.
    #[error("backend rejected the message: {0}")]
    Rejected(String),

    /// The broker producer would not enqueue a message.
    #[error("failed to enqueue message: {0}")]
    Submit(#[from] SubmitError),
}

impl DeliveryError {
    /// Whether the embedding caller may re-attempt the same batch.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::Unavailable(_) => true,
            DeliveryError::Submit(SubmitError::QueueFull) => true,
            DeliveryError::MalformedInput(_)
            | DeliveryError::Rejected(_)
            | DeliveryError::Submit(_) => false,
        }
    }

    /// A short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::MalformedInput(_) => "malformed_input",
            DeliveryError::Unavailable(_) => "unavailable",
            DeliveryError::Rejected(_) => "rejected",
            DeliveryError::Submit(_) => "submit",
        }
    }
}
