use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::order::Customer;
use super::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeStatus {
    OnTrack,
    Completed,
    Breached,
    Paused,
    Stopped,
}

impl SchemeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemeStatus::OnTrack => "on_track",
            SchemeStatus::Completed => "completed",
            SchemeStatus::Breached => "breached",
            SchemeStatus::Paused => "paused",
            SchemeStatus::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SchemeStatus::Completed | SchemeStatus::Stopped)
    }

    /// `paused` and `stopped` are only entered from a live, non-terminal scheme.
    pub fn can_move_to(&self, next: SchemeStatus) -> bool {
        match next {
            SchemeStatus::Paused | SchemeStatus::Stopped => {
                matches!(self, SchemeStatus::OnTrack | SchemeStatus::Breached)
            }
            _ => false,
        }
    }
}

impl fmt::Display for SchemeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Completed,
    Due,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Upi,
    Card,
    BankTransfer,
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cash" => Ok(PaymentMethod::Cash),
            "upi" => Ok(PaymentMethod::Upi),
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            other => Err(DomainError::UnknownVariant {
                kind: "payment method",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub method: PaymentMethod,
    pub amount: u64,
    pub paid_at: DateTime<Utc>,
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub month: String,
    pub amount: u64,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentRecord>,
}

impl TimelineEntry {
    pub fn new(month: impl Into<String>, amount: u64, status: EntryStatus) -> Self {
        Self {
            month: month.into(),
            amount,
            status,
            payment: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dues {
    pub has_dues: bool,
    #[serde(default)]
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
}

/// A payment as received at the counter, before it is matched to the due month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub method: PaymentMethod,
    pub amount: u64,
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Data collected by the pause and stop workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeStatusChange {
    pub otp: String,
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusNote {
    pub status: SchemeStatus,
    pub comments: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheme {
    pub id: String,
    pub name: String,
    pub customer: Customer,
    pub status: SchemeStatus,
    pub payment_timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub dues: Dues,
    #[serde(default)]
    pub total_paid: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_note: Option<StatusNote>,
}

impl Scheme {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        customer: Customer,
        payment_timeline: Vec<TimelineEntry>,
    ) -> Result<Self, DomainError> {
        let mut scheme = Self {
            id: id.into(),
            name: name.into(),
            customer,
            status: SchemeStatus::OnTrack,
            payment_timeline,
            progress: Progress::default(),
            dues: Dues::default(),
            total_paid: 0,
            status_note: None,
        };
        scheme.reconcile()?;
        Ok(scheme)
    }

    /// Index of the single `due` entry, if any.
    pub fn due_index(&self) -> Option<usize> {
        self.payment_timeline
            .iter()
            .position(|entry| entry.status == EntryStatus::Due)
    }

    pub fn due_entry(&self) -> Option<&TimelineEntry> {
        self.due_index().map(|i| &self.payment_timeline[i])
    }

    pub fn completed_count(&self) -> u32 {
        self.payment_timeline
            .iter()
            .filter(|entry| entry.status == EntryStatus::Completed)
            .count() as u32
    }

    /// Recompute `progress` and `dues` from the timeline after checking it is monotonic.
    pub fn reconcile(&mut self) -> Result<(), DomainError> {
        validate_timeline(&self.payment_timeline)?;
        self.progress = Progress {
            completed: self.completed_count(),
            total: self.payment_timeline.len() as u32,
        };
        self.dues = match self.due_entry() {
            Some(entry) => Dues {
                has_dues: true,
                amount: entry.amount,
                month: Some(entry.month.clone()),
            },
            None => Dues::default(),
        };
        Ok(())
    }

    /// Settle the current due month and advance the timeline.
    ///
    /// The due entry becomes `completed`, the next `pending` entry becomes `due`,
    /// progress and dues are recomputed and the amount is added to `total_paid`.
    /// A scheme with every month settled moves to `completed`.
    pub fn record_payment(
        &mut self,
        receipt: &PaymentReceipt,
        transaction_id: impl Into<String>,
    ) -> Result<&TimelineEntry, DomainError> {
        if !matches!(self.status, SchemeStatus::OnTrack | SchemeStatus::Breached) {
            return Err(DomainError::SchemeInactive {
                id: self.id.clone(),
                status: self.status,
            });
        }
        // Every check runs before the first write; a rejected payment leaves the scheme as it was.
        validate_timeline(&self.payment_timeline)?;
        let index = self.due_index().ok_or_else(|| DomainError::NoDueEntry {
            id: self.id.clone(),
        })?;
        let total_paid = self
            .total_paid
            .checked_add(receipt.amount)
            .ok_or_else(|| DomainError::AmountOverflow {
                id: self.id.clone(),
                total_paid: self.total_paid,
                amount: receipt.amount,
            })?;

        let entry = &mut self.payment_timeline[index];
        entry.status = EntryStatus::Completed;
        entry.payment = Some(PaymentRecord {
            method: receipt.method,
            amount: receipt.amount,
            paid_at: receipt.received_at,
            transaction_id: transaction_id.into(),
        });

        if let Some(next) = self.payment_timeline[index + 1..]
            .iter_mut()
            .find(|entry| entry.status == EntryStatus::Pending)
        {
            next.status = EntryStatus::Due;
        }

        self.total_paid = total_paid;
        self.reconcile()?;

        if self.progress.completed == self.progress.total {
            self.status = SchemeStatus::Completed;
        }

        tracing::debug!(
            scheme_id = %self.id,
            completed = self.progress.completed,
            total = self.progress.total,
            has_dues = self.dues.has_dues,
            "Payment recorded"
        );

        Ok(&self.payment_timeline[index])
    }

    pub fn pause(&mut self, change: &SchemeStatusChange, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.change_status(SchemeStatus::Paused, change, at)
    }

    pub fn stop(&mut self, change: &SchemeStatusChange, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.change_status(SchemeStatus::Stopped, change, at)
    }

    pub fn ensure_can_move_to(&self, next: SchemeStatus) -> Result<(), DomainError> {
        if !self.status.can_move_to(next) {
            return Err(DomainError::IllegalSchemeTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        Ok(())
    }

    fn change_status(
        &mut self,
        next: SchemeStatus,
        change: &SchemeStatusChange,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_can_move_to(next)?;
        self.status = next;
        self.status_note = Some(StatusNote {
            status: next,
            comments: change.comments.clone(),
            at,
        });
        Ok(())
    }
}

/// A timeline is `completed* due? pending*`.
pub fn validate_timeline(entries: &[TimelineEntry]) -> Result<(), DomainError> {
    let mut seen_due = false;
    let mut seen_pending = false;
    for (index, entry) in entries.iter().enumerate() {
        match entry.status {
            EntryStatus::Completed if seen_due || seen_pending => {
                return Err(DomainError::TimelineOrder {
                    index,
                    detail: "completed month after an unpaid month".to_string(),
                });
            }
            EntryStatus::Due if seen_due => {
                return Err(DomainError::TimelineOrder {
                    index,
                    detail: "more than one month is due".to_string(),
                });
            }
            EntryStatus::Due if seen_pending => {
                return Err(DomainError::TimelineOrder {
                    index,
                    detail: "due month after a pending month".to_string(),
                });
            }
            EntryStatus::Due => seen_due = true,
            EntryStatus::Pending => seen_pending = true,
            EntryStatus::Completed => {}
        }
    }
    Ok(())
}
