pub mod mock_sink;

use alert_relay::config::Config;
use std::net::SocketAddr;

/// A config bound to an ephemeral localhost port with metrics disabled.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.listen_address = SocketAddr::from(([127, 0, 0, 1], 0));
    config.metrics.enabled = false;
    config
}

pub const FIRING_BATCH: &str = r#"{
    "version": "4",
    "status": "firing",
    "receiver": "relay",
    "alerts": [
        {
            "status": "firing",
            "labels": {"alertname": "DiskFull", "instance": "db-1"},
            "annotations": {"summary": "Disk is 97% full"},
            "startsAt": "2024-05-01T10:00:00Z",
            "endsAt": "0001-01-01T00:00:00Z"
        },
        {
            "status": "firing",
            "labels": {"alertname": "HighLoad", "instance": "db-1"},
            "annotations": {},
            "startsAt": "2024-05-01T10:01:00Z",
            "endsAt": "0001-01-01T00:00:00Z"
        }
    ]
}"#;
