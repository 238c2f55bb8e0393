/// alert-relay - Alertmanager webhook relay
///
/// This library provides the alert model, the sink abstraction with its four
/// backends (console, Kafka, Teams, NRDP), the asynchronous broker producer
/// and the ingestion server that ties them together.
pub mod app;
pub mod broker;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod error;
pub mod internal_metrics;
pub mod server;
pub mod sinks;

// Re-export core types for convenience
pub use crate::core::*;
pub use crate::error::{ConfigError, DeliveryError, SubmitError};
