//! Shared fixtures for the workflow integration tests
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gold_smith::backend::MockBackend;
use gold_smith::domain::{
    CancellationConfirmation, DeliveryConfirmation, DomainError, PaymentReceipt,
    SchemeStatusChange,
};
use gold_smith::{ActionListener, AdminStore};

pub const LATENCY: Duration = Duration::from_millis(500);

pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/fixture.json")
}

/// The demo fixture shipped with the CLI.
pub async fn demo_store() -> AdminStore {
    AdminStore::load(&fixture_path())
        .await
        .expect("demo fixture should load")
}

pub fn mock_backend() -> Arc<MockBackend> {
    Arc::new(MockBackend::new(LATENCY))
}

/// What a parent view was told, in the order it was told.
#[derive(Debug, Clone, PartialEq)]
pub enum Notified {
    Delivered(String, DeliveryConfirmation),
    Cancelled(String, CancellationConfirmation),
    Paused(String, SchemeStatusChange),
    Stopped(String, SchemeStatusChange),
    Paid(String, PaymentReceipt),
}

/// Listener that records every callback instead of mutating entities.
#[derive(Debug, Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<Notified>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<Notified> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Notified) -> Result<(), DomainError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

impl ActionListener for RecordingListener {
    fn on_confirm_delivery(&self, order_id: &str, c: &DeliveryConfirmation) -> Result<(), DomainError> {
        self.push(Notified::Delivered(order_id.to_string(), c.clone()))
    }

    fn on_confirm_cancel(&self, order_id: &str, c: &CancellationConfirmation) -> Result<(), DomainError> {
        self.push(Notified::Cancelled(order_id.to_string(), c.clone()))
    }

    fn on_confirm_pause(&self, scheme_id: &str, change: &SchemeStatusChange) -> Result<(), DomainError> {
        self.push(Notified::Paused(scheme_id.to_string(), change.clone()))
    }

    fn on_confirm_stop(&self, scheme_id: &str, change: &SchemeStatusChange) -> Result<(), DomainError> {
        self.push(Notified::Stopped(scheme_id.to_string(), change.clone()))
    }

    fn on_record_payment(&self, scheme_id: &str, receipt: &PaymentReceipt) -> Result<(), DomainError> {
        self.push(Notified::Paid(scheme_id.to_string(), receipt.clone()))
    }
}
