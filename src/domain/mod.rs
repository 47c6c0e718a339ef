// Entities acted upon by guarded actions.
// Orders and schemes are owned by the list views; workflows only reference them.

pub mod order;
pub mod scheme;

use thiserror::Error;

pub use order::{
    CancellationConfirmation, CancellationDetails, Customer, DeliveryConfirmation,
    DeliveryDetails, DeliveryMode, Order, OrderStatus,
};
pub use scheme::{
    Dues, EntryStatus, PaymentMethod, PaymentReceipt, PaymentRecord, Progress, Scheme,
    SchemeStatus, SchemeStatusChange, StatusNote, TimelineEntry,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("order {id} is already {status}")]
    OrderTerminal { id: String, status: OrderStatus },
    #[error("scheme {id} cannot move from {from} to {to}")]
    IllegalSchemeTransition {
        id: String,
        from: SchemeStatus,
        to: SchemeStatus,
    },
    #[error("scheme {id} is {status} and cannot accept payments")]
    SchemeInactive { id: String, status: SchemeStatus },
    #[error("payment of {amount} to scheme {id} overflows its total of {total_paid}")]
    AmountOverflow {
        id: String,
        total_paid: u64,
        amount: u64,
    },
    #[error("scheme {id} has no payment due")]
    NoDueEntry { id: String },
    #[error("payment timeline out of order at entry {index}: {detail}")]
    TimelineOrder { index: usize, detail: String },
    #[error("unknown {kind} {id}")]
    UnknownEntity { kind: &'static str, id: String },
    #[error("unknown {kind} value '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}
