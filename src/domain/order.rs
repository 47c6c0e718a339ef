use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    HomeDelivery,
    StorePickup,
    Courier,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::HomeDelivery => "home_delivery",
            DeliveryMode::StorePickup => "store_pickup",
            DeliveryMode::Courier => "courier",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "home_delivery" => Ok(DeliveryMode::HomeDelivery),
            "store_pickup" => Ok(DeliveryMode::StorePickup),
            "courier" => Ok(DeliveryMode::Courier),
            other => Err(DomainError::UnknownVariant {
                kind: "delivery mode",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Customer {
    /// Phone number with everything but the last four digits hidden.
    pub fn masked_phone(&self) -> Option<String> {
        let phone = self.phone.as_deref()?.trim();
        if phone.is_empty() {
            return None;
        }
        let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        let visible = digits.len().min(4);
        let tail: String = digits[digits.len() - visible..].iter().collect();
        Some(format!("{}{}", "*".repeat(digits.len() - visible), tail))
    }

    pub fn has_phone(&self) -> bool {
        self.phone.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

/// Data collected by the delivery workflow and handed to the order list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryConfirmation {
    pub otp: String,
    pub delivery_mode: DeliveryMode,
    pub comments: String,
}

/// Data collected by the cancellation workflow and handed to the order list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationConfirmation {
    pub otp: String,
    pub staff_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDetails {
    pub mode: DeliveryMode,
    pub comments: String,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationDetails {
    pub reason: String,
    pub staff_name: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    pub customer: Customer,
    #[serde(default)]
    pub total_amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<CancellationDetails>,
}

impl Order {
    pub fn new(id: impl Into<String>, customer: Customer) -> Self {
        Self {
            id: id.into(),
            status: OrderStatus::Pending,
            customer,
            total_amount: 0,
            delivery: None,
            cancellation: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn ensure_pending(&self) -> Result<(), DomainError> {
        if self.is_terminal() {
            return Err(DomainError::OrderTerminal {
                id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn deliver(
        &mut self,
        confirmation: &DeliveryConfirmation,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_pending()?;
        self.status = OrderStatus::Delivered;
        self.delivery = Some(DeliveryDetails {
            mode: confirmation.delivery_mode,
            comments: confirmation.comments.clone(),
            delivered_at: at,
        });
        Ok(())
    }

    pub fn cancel(
        &mut self,
        confirmation: &CancellationConfirmation,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_pending()?;
        self.status = OrderStatus::Cancelled;
        self.cancellation = Some(CancellationDetails {
            reason: confirmation.reason.clone(),
            staff_name: confirmation.staff_name.clone(),
            cancelled_at: at,
        });
        Ok(())
    }
}
