//! Integration tests for broker producer drain semantics under concurrency.

use alert_relay::broker::test_utils::FakeBroker;
use alert_relay::broker::{BrokerProducer, ProducerSettings};
use alert_relay::error::SubmitError;
use alert_relay::internal_metrics::Metrics;
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn settings() -> ProducerSettings {
    ProducerSettings {
        topic: "alerts".to_string(),
        result_channel_capacity: 2,
        flush_timeout: Duration::from_secs(10),
    }
}

async fn start(broker: &FakeBroker) -> Result<Arc<BrokerProducer>> {
    let broker = broker.clone();
    let producer = BrokerProducer::start(settings(), Metrics::disabled(), move |reporter| {
        Ok(broker.transport(reporter))
    })
    .await?;
    Ok(Arc::new(producer))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submitters_all_outcomes_observed() -> Result<()> {
    const SUBMITTERS: usize = 8;
    const PER_SUBMITTER: usize = 25;

    let broker = FakeBroker::new()
        .failing_when(|i| i % 7 == 0)
        .with_delay_fn(|i| Duration::from_millis((i % 5) as u64 * 3));
    let producer = start(&broker).await?;

    let mut handles = Vec::new();
    for s in 0..SUBMITTERS {
        let producer = producer.clone();
        handles.push(tokio::spawn(async move {
            for m in 0..PER_SUBMITTER {
                producer
                    .send_message(format!("{s}-{m}").into_bytes())
                    .expect("enqueue should succeed while open");
                tokio::task::yield_now().await;
            }
        }));
    }
    for handle in handles {
        handle.await?;
    }

    let total = SUBMITTERS * PER_SUBMITTER;
    let expected_failures = (0..total).filter(|i| i % 7 == 0).count() as u64;

    let report = producer.close().await.expect("first close returns a report");
    assert_eq!(report.total(), total as u64);
    assert_eq!(report.failed, expected_failures);
    assert_eq!(broker.sent().len(), total);
    Ok(())
}

#[tokio::test]
async fn test_close_blocks_until_delayed_outcomes_arrive() -> Result<()> {
    let delay = Duration::from_millis(300);
    let broker = FakeBroker::new()
        .failing_when(|i| i == 1)
        .with_delay(delay);
    let producer = start(&broker).await?;

    for i in 0..3u8 {
        producer.send_message(vec![i])?;
    }

    let started = Instant::now();
    let report = producer.close().await.expect("first close returns a report");

    assert!(started.elapsed() >= delay / 2, "close returned before the transport resolved");
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(broker.in_flight(), 0);
    Ok(())
}

#[tokio::test]
async fn test_submissions_racing_close_are_either_observed_or_rejected() -> Result<()> {
    let broker = FakeBroker::new().with_delay(Duration::from_millis(5));
    let producer = start(&broker).await?;

    let submitter = {
        let producer = producer.clone();
        tokio::spawn(async move {
            let mut accepted = 0u64;
            loop {
                match producer.send_message(b"alert".to_vec()) {
                    Ok(()) => accepted += 1,
                    Err(SubmitError::Closed) => break accepted,
                    Err(e) => panic!("unexpected submit error: {e}"),
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = producer.close().await.expect("first close returns a report");
    let accepted = submitter.await?;

    assert_eq!(report.total(), accepted);
    Ok(())
}
