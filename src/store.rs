// Authoritative copy of the orders and schemes shown in the list views.
// Committed workflows report back here; this is the only place entity state
// is merged.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    CancellationConfirmation, DeliveryConfirmation, DomainError, Order, PaymentReceipt,
    PaymentRecord, Scheme, SchemeStatusChange,
};
use crate::workflow::ActionListener;

/// Serialised form of the store, used for fixtures and CLI output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub orders: Vec<Order>,
    pub schemes: Vec<Scheme>,
}

#[derive(Debug, Default)]
pub struct AdminStore {
    orders: RwLock<Vec<Order>>,
    schemes: RwLock<Vec<Scheme>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AdminStore {
    /// Build a store, recomputing each scheme's progress and dues from its timeline.
    pub fn new(snapshot: Snapshot) -> Result<Self, DomainError> {
        let mut schemes = snapshot.schemes;
        for scheme in &mut schemes {
            scheme.reconcile()?;
        }
        Ok(Self {
            orders: RwLock::new(snapshot.orders),
            schemes: RwLock::new(schemes),
        })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading fixture {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parsing fixture {}", path.display()))?;
        Ok(Self::new(snapshot)?)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            orders: read(&self.orders).clone(),
            schemes: read(&self.schemes).clone(),
        }
    }

    pub fn order(&self, id: &str) -> Option<Order> {
        read(&self.orders).iter().find(|o| o.id == id).cloned()
    }

    pub fn scheme(&self, id: &str) -> Option<Scheme> {
        read(&self.schemes).iter().find(|s| s.id == id).cloned()
    }

    /// Record a counter payment against the scheme's current due month.
    pub fn record_payment(&self, scheme_id: &str, receipt: &PaymentReceipt) -> Result<PaymentRecord, DomainError> {
        let transaction_id = receipt
            .transaction_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("TXN-{}", Uuid::new_v4().simple()));

        self.with_scheme(scheme_id, |scheme| {
            let entry = scheme.record_payment(receipt, transaction_id)?;
            let record = entry.payment.clone().ok_or_else(|| DomainError::NoDueEntry {
                id: scheme_id.to_string(),
            })?;
            info!(
                scheme_id = %scheme_id,
                month = %entry.month,
                amount = record.amount,
                "Scheme payment recorded"
            );
            Ok(record)
        })
    }

    fn with_order<T>(
        &self,
        id: &str,
        update: impl FnOnce(&mut Order) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let mut orders = write(&self.orders);
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| DomainError::UnknownEntity {
                kind: "order",
                id: id.to_string(),
            })?;
        update(order)
    }

    fn with_scheme<T>(
        &self,
        id: &str,
        update: impl FnOnce(&mut Scheme) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let mut schemes = write(&self.schemes);
        let scheme = schemes
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| DomainError::UnknownEntity {
                kind: "scheme",
                id: id.to_string(),
            })?;
        // Work on a copy so a failed update leaves the stored scheme untouched.
        let mut draft = scheme.clone();
        let value = update(&mut draft)?;
        *scheme = draft;
        Ok(value)
    }
}

impl ActionListener for AdminStore {
    fn on_confirm_delivery(&self, order_id: &str, confirmation: &DeliveryConfirmation) -> Result<(), DomainError> {
        self.with_order(order_id, |order| order.deliver(confirmation, Utc::now()))?;
        info!(order_id = %order_id, mode = %confirmation.delivery_mode, "Order marked delivered");
        Ok(())
    }

    fn on_confirm_cancel(&self, order_id: &str, confirmation: &CancellationConfirmation) -> Result<(), DomainError> {
        self.with_order(order_id, |order| order.cancel(confirmation, Utc::now()))?;
        info!(order_id = %order_id, staff = %confirmation.staff_name, "Order cancelled");
        Ok(())
    }

    fn on_confirm_pause(&self, scheme_id: &str, change: &SchemeStatusChange) -> Result<(), DomainError> {
        self.with_scheme(scheme_id, |scheme| scheme.pause(change, Utc::now()))?;
        info!(scheme_id = %scheme_id, "Scheme paused");
        Ok(())
    }

    fn on_confirm_stop(&self, scheme_id: &str, change: &SchemeStatusChange) -> Result<(), DomainError> {
        self.with_scheme(scheme_id, |scheme| scheme.stop(change, Utc::now()))?;
        info!(scheme_id = %scheme_id, "Scheme stopped");
        Ok(())
    }

    fn on_record_payment(&self, scheme_id: &str, receipt: &PaymentReceipt) -> Result<(), DomainError> {
        self.record_payment(scheme_id, receipt).map(|_| ())
    }
}
