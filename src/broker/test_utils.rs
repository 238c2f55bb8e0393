use crate::broker::{Delivered, DeliveryReporter, DeliveryTransport, FailedDelivery, OutboundMessage};
use crate::error::SubmitError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type OutcomeFn = Arc<dyn Fn(usize) -> bool + Send + Sync>;
type DelayFn = Arc<dyn Fn(usize) -> Duration + Send + Sync>;

/// Fake broker for testing the producer and the broker sink.
///
/// Each accepted message is resolved on its own task after a configurable
/// delay, as a success or a failure depending on its submission index.
#[derive(Clone)]
pub struct FakeBroker {
    fails: OutcomeFn,
    delay: DelayFn,
    accept_limit: Option<usize>,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    in_flight: Arc<AtomicUsize>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self {
            fails: Arc::new(|_| false),
            delay: Arc::new(|_| Duration::ZERO),
            accept_limit: None,
            sent: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fails the message with the given submission index when `f` returns true.
    pub fn failing_when(mut self, f: impl Fn(usize) -> bool + Send + Sync + 'static) -> Self {
        self.fails = Arc::new(f);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_delay_fn(move |_| delay)
    }

    pub fn with_delay_fn(mut self, f: impl Fn(usize) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Arc::new(f);
        self
    }

    /// Rejects every enqueue after `limit` messages were accepted.
    pub fn accepting_at_most(mut self, limit: usize) -> Self {
        self.accept_limit = Some(limit);
        self
    }

    /// Builds a transport reporting into the producer's result streams.
    pub fn transport(&self, reporter: DeliveryReporter) -> FakeTransport {
        FakeTransport {
            broker: self.clone(),
            reporter,
        }
    }

    /// Messages accepted so far, in submission order.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Default for FakeBroker {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FakeTransport {
    broker: FakeBroker,
    reporter: DeliveryReporter,
}

impl DeliveryTransport for FakeTransport {
    fn enqueue(&self, message: OutboundMessage) -> Result<(), SubmitError> {
        let index = {
            let mut sent = self.broker.sent.lock().unwrap();
            if self.broker.accept_limit.is_some_and(|limit| sent.len() >= limit) {
                return Err(SubmitError::QueueFull);
            }
            sent.push(message.clone());
            sent.len() - 1
        };

        self.broker.in_flight.fetch_add(1, Ordering::SeqCst);
        let fails = (self.broker.fails)(index);
        let delay = (self.broker.delay)(index);
        let reporter = self.reporter.clone();
        let in_flight = self.broker.in_flight.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if fails {
                reporter
                    .failed(FailedDelivery {
                        topic: message.topic,
                        payload: message.payload,
                        error: "injected failure".to_string(),
                    })
                    .await;
            } else {
                reporter
                    .delivered(Delivered {
                        topic: message.topic,
                        partition: 0,
                        offset: index as i64,
                    })
                    .await;
            }
            drop(reporter);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
        Ok(())
    }

    fn flush(&self, timeout: Duration) -> Result<(), SubmitError> {
        let deadline = Instant::now() + timeout;
        while self.broker.in_flight.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                return Err(SubmitError::Transport("flush timed out".to_string()));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}
