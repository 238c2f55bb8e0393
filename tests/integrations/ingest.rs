//! Integration tests for the ingestion endpoint.

use alert_relay::app::App;
use alert_relay::broker::test_utils::FakeBroker;
use alert_relay::broker::{BrokerProducer, ProducerSettings};
use alert_relay::config::MessageFormat;
use alert_relay::dispatcher::Dispatcher;
use alert_relay::internal_metrics::Metrics;
use alert_relay::server::{router, AppState};
use alert_relay::sinks::KafkaSink;
use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::{mock_sink::RecordingSink, test_config, FIRING_BATCH};

async fn start_app(sink: Arc<dyn alert_relay::core::Sink>) -> Result<App> {
    App::builder(test_config())
        .sink_override(sink)
        .metrics_override(Metrics::disabled())
        .build()
        .await
}

async fn post(app: &App, body: &'static str) -> Result<reqwest::StatusCode> {
    let response = reqwest::Client::new()
        .post(format!("http://{}/", app.local_addr()))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await?;
    Ok(response.status())
}

#[tokio::test]
async fn test_valid_batch_is_dispatched() -> Result<()> {
    let sink = RecordingSink::new();
    let app = start_app(Arc::new(sink.clone())).await?;

    let status = post(&app, FIRING_BATCH).await?;

    assert_eq!(status, reqwest::StatusCode::OK);
    let received = sink.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].alerts.len(), 2);
    assert_eq!(received[0].alerts[0].name(), Some("DiskFull"));

    app.shutdown().await?;
    assert!(sink.closed.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn test_malformed_json_is_rejected_without_invoking_sink() -> Result<()> {
    let sink = RecordingSink::new();
    let app = start_app(Arc::new(sink.clone())).await?;

    assert_eq!(post(&app, "{not json").await?, reqwest::StatusCode::BAD_REQUEST);
    // Present but without the mandatory per-alert maps.
    let missing_labels = r#"{"status": "firing", "alerts": [{"status": "firing"}]}"#;
    assert_eq!(post(&app, missing_labels).await?, reqwest::StatusCode::BAD_REQUEST);

    assert!(sink.received().is_empty());
    app.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_empty_batch_is_accepted() -> Result<()> {
    let sink = RecordingSink::new();
    let app = start_app(Arc::new(sink.clone())).await?;

    let status = post(&app, r#"{"status": "resolved", "alerts": []}"#).await?;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(sink.received().len(), 1);
    assert!(sink.received()[0].alerts.is_empty());
    app.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_sink_failure_maps_to_500() -> Result<()> {
    let sink = RecordingSink::new();
    sink.set_fail_on_send(true);
    let app = start_app(Arc::new(sink.clone())).await?;

    let status = post(&app, FIRING_BATCH).await?;
    assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    // The sink recovers; the next batch goes through.
    sink.set_fail_on_send(false);
    assert_eq!(post(&app, FIRING_BATCH).await?, reqwest::StatusCode::OK);
    assert_eq!(sink.received().len(), 1);

    app.shutdown().await?;
    Ok(())
}

async fn kafka_sink(broker: &FakeBroker) -> Result<KafkaSink> {
    let broker = broker.clone();
    let settings = ProducerSettings {
        topic: "alerts".to_string(),
        result_channel_capacity: 16,
        flush_timeout: Duration::from_secs(5),
    };
    let producer = BrokerProducer::start(settings, Metrics::disabled(), move |reporter| {
        Ok(broker.transport(reporter))
    })
    .await?;
    Ok(KafkaSink::new(producer, MessageFormat::Summary))
}

#[tokio::test]
async fn test_broker_sink_publishes_one_message_per_alert() -> Result<()> {
    let broker = FakeBroker::new().with_delay(Duration::from_millis(100));
    let app = start_app(Arc::new(kafka_sink(&broker).await?)).await?;

    // Returns before any acknowledgment has arrived.
    assert_eq!(post(&app, FIRING_BATCH).await?, reqwest::StatusCode::OK);
    assert_eq!(broker.in_flight(), 2);

    app.shutdown().await?;
    assert_eq!(broker.in_flight(), 0);
    let payloads: Vec<String> = broker
        .sent()
        .into_iter()
        .map(|m| String::from_utf8(m.payload).unwrap())
        .collect();
    assert_eq!(
        payloads,
        vec!["Alert: DiskFull, Status: firing", "Alert: HighLoad, Status: firing"]
    );
    Ok(())
}

#[tokio::test]
async fn test_broker_enqueue_failure_maps_to_500() -> Result<()> {
    let broker = FakeBroker::new().accepting_at_most(1);
    let app = start_app(Arc::new(kafka_sink(&broker).await?)).await?;

    let status = post(&app, FIRING_BATCH).await?;

    assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    app.shutdown().await?;
    // The entry enqueued before the rejection is still published.
    assert_eq!(broker.sent().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_router_health_and_metrics_routes() -> Result<()> {
    let sink = RecordingSink::new();
    let state = AppState {
        dispatcher: Arc::new(Dispatcher::new(Arc::new(sink), Metrics::disabled())),
        metrics: Metrics::disabled(),
        debug: true,
    };
    let app = router(state, None);

    let response = app
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // Without a Prometheus handle there is no metrics route.
    let response = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(Request::post("/").body(Body::from("[]"))?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
