use thiserror::Error;

use super::actions::{ActionKind, EntityKind, RequiredField};
use crate::backend::BackendError;
use crate::domain::DomainError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("session is closed")]
    Closed,
    #[error("session was closed before the request finished")]
    Cancelled,
    #[error("{action} does not apply to a {entity}")]
    WrongEntity { action: ActionKind, entity: EntityKind },
    #[error("no contact phone on record for {0}")]
    MissingContact(String),
    #[error("staff name is required before a cancellation code can be sent")]
    StaffNameRequired,
    #[error("a new code can be requested in {0}s")]
    CooldownActive(u64),
    #[error("no code has been sent yet")]
    NotSent,
    #[error("code already verified")]
    AlreadyVerified,
    #[error("code must be exactly {expected} digits")]
    InvalidCode { expected: usize },
    #[error("{0}")]
    CodeRejected(String),
    #[error("verification locked after {0} failed attempts")]
    AttemptsExhausted(u32),
    #[error("code has not been verified")]
    NotVerified,
    #[error("commit already in progress")]
    CommitInProgress,
    #[error("missing required fields: {}", join_fields(.0))]
    MissingFields(Vec<RequiredField>),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

fn join_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
