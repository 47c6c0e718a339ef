// Per-instance business rules for the four guarded actions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{
    CancellationConfirmation, DeliveryConfirmation, DeliveryMode, DomainError, Order,
    Scheme, SchemeStatus, SchemeStatusChange,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    DeliverOrder,
    CancelOrder,
    PauseScheme,
    StopScheme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Order,
    Scheme,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Order => f.write_str("order"),
            EntityKind::Scheme => f.write_str("scheme"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequiredField {
    DeliveryMode,
    StaffName,
    Reason,
    Comments,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequiredField::DeliveryMode => "delivery mode",
            RequiredField::StaffName => "staff name",
            RequiredField::Reason => "reason",
            RequiredField::Comments => "comments",
        };
        f.write_str(name)
    }
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::DeliverOrder => "deliver_order",
            ActionKind::CancelOrder => "cancel_order",
            ActionKind::PauseScheme => "pause_scheme",
            ActionKind::StopScheme => "stop_scheme",
        }
    }

    pub fn entity(&self) -> EntityKind {
        match self {
            ActionKind::DeliverOrder | ActionKind::CancelOrder => EntityKind::Order,
            ActionKind::PauseScheme | ActionKind::StopScheme => EntityKind::Scheme,
        }
    }

    /// Fields that must be filled before the commit step is enabled.
    pub fn required_fields(&self) -> &'static [RequiredField] {
        match self {
            ActionKind::DeliverOrder => &[RequiredField::DeliveryMode],
            ActionKind::CancelOrder => &[RequiredField::StaffName, RequiredField::Reason],
            ActionKind::PauseScheme | ActionKind::StopScheme => &[RequiredField::Comments],
        }
    }

    /// Cancellation codes are issued to a named staff member.
    pub fn requires_staff_before_send(&self) -> bool {
        matches!(self, ActionKind::CancelOrder)
    }

    /// Path segment used by the REST backend for this action.
    pub fn route(&self) -> (&'static str, &'static str) {
        match self {
            ActionKind::DeliverOrder => ("orders", "delivery"),
            ActionKind::CancelOrder => ("orders", "cancellation"),
            ActionKind::PauseScheme => ("schemes", "pause"),
            ActionKind::StopScheme => ("schemes", "stop"),
        }
    }

    /// Reject actions that cannot apply to the order in its current status.
    pub fn check_order(&self, order: &Order) -> Result<(), DomainError> {
        debug_assert_eq!(self.entity(), EntityKind::Order);
        order.ensure_pending()
    }

    pub fn check_scheme(&self, scheme: &Scheme) -> Result<(), DomainError> {
        debug_assert_eq!(self.entity(), EntityKind::Scheme);
        let next = match self {
            ActionKind::StopScheme => SchemeStatus::Stopped,
            _ => SchemeStatus::Paused,
        };
        scheme.ensure_can_move_to(next)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auxiliary inputs collected alongside the code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionFields {
    pub delivery_mode: Option<DeliveryMode>,
    pub comments: String,
    pub reason: String,
    pub staff_name: String,
}

impl ActionFields {
    pub fn is_filled(&self, field: RequiredField) -> bool {
        match field {
            RequiredField::DeliveryMode => self.delivery_mode.is_some(),
            RequiredField::StaffName => !self.staff_name.trim().is_empty(),
            RequiredField::Reason => !self.reason.trim().is_empty(),
            RequiredField::Comments => !self.comments.trim().is_empty(),
        }
    }

    pub fn missing(&self, kind: ActionKind) -> Vec<RequiredField> {
        kind.required_fields()
            .iter()
            .copied()
            .filter(|field| !self.is_filled(*field))
            .collect()
    }

    /// Assemble what the parent view receives once the action is committed.
    pub fn confirmation(&self, kind: ActionKind, otp: &str) -> Option<Confirmation> {
        if !self.missing(kind).is_empty() {
            return None;
        }
        let otp = otp.to_string();
        let confirmation = match kind {
            ActionKind::DeliverOrder => Confirmation::Delivery(DeliveryConfirmation {
                otp,
                delivery_mode: self.delivery_mode?,
                comments: self.comments.clone(),
            }),
            ActionKind::CancelOrder => Confirmation::Cancellation(CancellationConfirmation {
                otp,
                staff_name: self.staff_name.trim().to_string(),
                reason: self.reason.clone(),
            }),
            ActionKind::PauseScheme => Confirmation::Pause(SchemeStatusChange {
                otp,
                comments: self.comments.clone(),
            }),
            ActionKind::StopScheme => Confirmation::Stop(SchemeStatusChange {
                otp,
                comments: self.comments.clone(),
            }),
        };
        Some(confirmation)
    }
}

/// The plain data a committed action hands to its parent view. Serialised
/// untagged, so the commit request body is the inner record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Confirmation {
    Delivery(DeliveryConfirmation),
    Cancellation(CancellationConfirmation),
    Pause(SchemeStatusChange),
    Stop(SchemeStatusChange),
}

impl Confirmation {
    pub fn kind(&self) -> ActionKind {
        match self {
            Confirmation::Delivery(_) => ActionKind::DeliverOrder,
            Confirmation::Cancellation(_) => ActionKind::CancelOrder,
            Confirmation::Pause(_) => ActionKind::PauseScheme,
            Confirmation::Stop(_) => ActionKind::StopScheme,
        }
    }
}
