#![allow(dead_code)]
use alert_relay::core::{AlertBatch, Sink};
use alert_relay::error::DeliveryError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A mock Sink that records every batch it receives.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub batches: Arc<Mutex<Vec<AlertBatch>>>,
    pub fail_on_send: Arc<AtomicBool>,
    pub closed: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_send(&self, fail: bool) {
        self.fail_on_send.store(fail, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<AlertBatch> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        "recording_mock"
    }

    async fn send(&self, batch: &AlertBatch) -> Result<(), DeliveryError> {
        if self.fail_on_send.load(Ordering::SeqCst) {
            return Err(DeliveryError::Unavailable("mock sink is down".to_string()));
        }
        self.batches.lock().unwrap().push(batch.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
