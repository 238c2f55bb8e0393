//! Integration tests for layered configuration loading.

use alert_relay::cli::Cli;
use alert_relay::config::{Config, MessageFormat, NrdpFormat, SinkKind};
use alert_relay::error::ConfigError;
use figment::Jail;
use std::net::SocketAddr;
use std::path::PathBuf;

fn cli_with_file(path: &str) -> Cli {
    Cli {
        config: Some(PathBuf::from(path)),
        ..Default::default()
    }
}

#[test]
fn test_defaults_without_any_source() {
    Jail::expect_with(|_jail| {
        let config = Config::load(&Cli::default()).map_err(|e| e.to_string())?;
        assert_eq!(config, Config::default());
        Ok(())
    });
}

#[test]
fn test_toml_file_selects_kafka_sink() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "relay.toml",
            r#"
            log_level = "warn"

            [server]
            listen_address = "127.0.0.1:9095"

            [sink]
            kind = "kafka"

            [sink.kafka]
            broker_url = "kafka-1:9093"
            topic = "alerts"
            client_cert_path = "/etc/relay/client.pem"
            client_key_path = "/etc/relay/client.key"
            ca_cert_path = "/etc/relay/ca.pem"
            message_format = "json"
            "#,
        )?;

        let config = Config::load(&cli_with_file("relay.toml")).map_err(|e| e.to_string())?;

        assert_eq!(config.log_level, "warn");
        assert_eq!(config.server.listen_address, "127.0.0.1:9095".parse::<SocketAddr>().unwrap());
        assert_eq!(config.sink.kind, SinkKind::Kafka);
        assert_eq!(config.sink.kafka.topic, "alerts");
        assert_eq!(config.sink.kafka.message_format, MessageFormat::Json);
        // Unset tuning keys keep their defaults.
        assert_eq!(config.sink.kafka.send_max_retries, 3);
        assert_eq!(config.sink.kafka.queue_capacity, 100_000);
        Ok(())
    });
}

#[test]
fn test_prefixed_env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "relay.toml",
            r#"
            [sink]
            kind = "nrdp"

            [sink.nrdp]
            url = "https://centreon.example/nrdp/"
            token = "from-file"
            hostname = "relay-host"
            "#,
        )?;
        jail.set_env("ALERT_RELAY_SINK__NRDP__TOKEN", "from-env");
        jail.set_env("ALERT_RELAY_SINK__NRDP__FORMAT", "xml");

        let config = Config::load(&cli_with_file("relay.toml")).map_err(|e| e.to_string())?;

        assert_eq!(config.sink.kind, SinkKind::Nrdp);
        assert_eq!(config.sink.nrdp.token, "from-env");
        assert_eq!(config.sink.nrdp.format, NrdpFormat::Xml);
        assert_eq!(config.sink.nrdp.hostname, "relay-host");
        Ok(())
    });
}

#[test]
fn test_legacy_env_variables_are_honored() {
    Jail::expect_with(|jail| {
        jail.set_env("RECEIVER", "kafka");
        jail.set_env("KAFKA_BROKER_URL", "kafka-1:9093");
        jail.set_env("KAFKA_TOPIC", "legacy-alerts");
        jail.set_env("KAFKA_CLIENT_CERT", "/certs/client.pem");
        jail.set_env("KAFKA_CLIENT_KEY", "/certs/client.key");
        jail.set_env("KAFKA_CA_CERT", "/certs/ca.pem");

        let config = Config::load(&Cli::default()).map_err(|e| e.to_string())?;

        assert_eq!(config.sink.kind, SinkKind::Kafka);
        assert_eq!(config.sink.kafka.broker_url, "kafka-1:9093");
        assert_eq!(config.sink.kafka.topic, "legacy-alerts");
        assert_eq!(config.sink.kafka.ca_cert_path, Some(PathBuf::from("/certs/ca.pem")));
        Ok(())
    });
}

#[test]
fn test_legacy_receiver_aliases() {
    Jail::expect_with(|jail| {
        jail.set_env("RECEIVER", "msteams");
        jail.set_env("MSTEAMS_WEBHOOK_URL", "https://example.webhook.office.com/flow");

        let config = Config::load(&Cli::default()).map_err(|e| e.to_string())?;

        assert_eq!(config.sink.kind, SinkKind::Teams);
        assert_eq!(config.sink.teams.webhook_url, "https://example.webhook.office.com/flow");
        Ok(())
    });
}

#[test]
fn test_cli_overrides_env_and_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "relay.toml",
            r#"
            [server]
            listen_address = "127.0.0.1:9000"
            "#,
        )?;
        jail.set_env("ALERT_RELAY_SINK__KIND", "teams");

        let cli = Cli {
            config: Some(PathBuf::from("relay.toml")),
            listen: Some("127.0.0.1:9100".parse().unwrap()),
            sink: Some("stdout".to_string()),
            debug: true,
        };
        let config = Config::load(&cli).map_err(|e| e.to_string())?;

        assert_eq!(config.server.listen_address.port(), 9100);
        assert_eq!(config.sink.kind, SinkKind::Console);
        assert!(config.debug);
        assert_eq!(config.log_filter(), "debug");
        Ok(())
    });
}

#[test]
fn test_selected_sink_missing_settings_fails_validation() {
    Jail::expect_with(|jail| {
        jail.set_env("ALERT_RELAY_SINK__KIND", "nrdp");
        jail.set_env("ALERT_RELAY_SINK__NRDP__URL", "https://centreon.example/nrdp/");

        let err = Config::load(&Cli::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("sink.nrdp.token")));
        Ok(())
    });
}

#[test]
fn test_unknown_sink_is_a_load_error() {
    Jail::expect_with(|jail| {
        jail.set_env("ALERT_RELAY_SINK__KIND", "pager");

        let err = Config::load(&Cli::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
        Ok(())
    });
}

#[test]
fn test_legacy_env_takes_precedence_over_prefixed_env() {
    Jail::expect_with(|jail| {
        jail.set_env("KAFKA_TOPIC", "legacy");
        jail.set_env("ALERT_RELAY_SINK__KAFKA__TOPIC", "prefixed");
        jail.set_env("ALERT_RELAY_SINK__KAFKA__BROKER_URL", "kafka-1:9093");

        let config = Config::load(&Cli::default()).map_err(|e| e.to_string())?;

        assert_eq!(config.sink.kafka.topic, "legacy");
        assert_eq!(config.sink.kafka.broker_url, "kafka-1:9093");
        Ok(())
    });
}
