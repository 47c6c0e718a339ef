//! Collaborators that issue, verify and commit guarded actions.
//!
//! All four actions go through the same [`ActionBackend`] interface; whether a
//! call reaches a server or stays in memory is the implementation's concern.

pub mod errors;
pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::workflow::{ActionKind, Confirmation};

pub use errors::BackendError;
pub use http::HttpBackend;
pub use mock::{BackendCall, MockBackend};

/// The entity an action is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionTarget {
    pub action: ActionKind,
    pub id: String,
}

impl ActionTarget {
    pub fn new(action: ActionKind, id: impl Into<String>) -> Self {
        Self {
            action,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    #[serde(default)]
    pub message: String,
    /// Seconds until a new code may be requested.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub otp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    pub verified: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    #[serde(default)]
    pub message: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ActionBackend: Send + Sync {
    /// Issue a code to the contact behind `target`.
    async fn send_otp(
        &self,
        target: &ActionTarget,
        request: &SendOtpRequest,
    ) -> Result<SendOtpResponse, BackendError>;

    async fn verify_otp(
        &self,
        target: &ActionTarget,
        request: &VerifyOtpRequest,
    ) -> Result<VerifyOtpResponse, BackendError>;

    /// Perform the terminal action once the code has been verified.
    async fn commit(
        &self,
        target: &ActionTarget,
        confirmation: &Confirmation,
    ) -> Result<CommitResponse, BackendError>;
}
