//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged on top
//! of the configuration file and environment variables.

use crate::config::SinkKind;
use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Relays Alertmanager webhooks to Kafka, Teams, NRDP or the console.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address the webhook listener binds to.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Delivery backend: console, kafka, teams or nrdp.
    #[arg(long, value_name = "SINK")]
    pub sink: Option<String>,

    /// Enable debug logging, including raw inbound payloads.
    #[arg(long)]
    pub debug: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(listen) = self.listen {
            dict.insert("server".into(), nested("listen_address", listen.to_string()));
        }

        if let Some(sink) = &self.sink {
            let kind: SinkKind = sink.parse().map_err(|e| Error::from(format!("{e}")))?;
            dict.insert("sink".into(), nested("kind", kind.to_string()));
        }

        // Only an explicit flag overrides; absence leaves lower layers untouched.
        if self.debug {
            dict.insert("debug".into(), Value::from(true));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

fn nested(key: &str, value: String) -> Value {
    let mut inner = Dict::new();
    inner.insert(key.into(), Value::from(value));
    Value::from(inner)
}
