//! Delivery backends implementing [`Sink`](crate::core::Sink).
//!
//! Exactly one of these is selected at startup by the dispatcher.

pub mod console;
pub mod kafka;
pub mod nrdp;
pub mod teams;

pub use console::ConsoleSink;
pub use kafka::KafkaSink;
pub use nrdp::NrdpSink;
pub use teams::TeamsSink;
