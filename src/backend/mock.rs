// In-memory backend with simulated latency - no network side effects.
//
// Verification accepts any well-formed code except the all-zero sentinel. This
// is scaffolding for demos and tests, not a verification policy.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::{
    ActionBackend, ActionTarget, BackendError, CommitResponse, SendOtpRequest, SendOtpResponse,
    VerifyOtpRequest, VerifyOtpResponse,
};
use crate::workflow::{ActionKind, Confirmation};

pub const REJECTED_CODE: &str = "000000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    SendOtp {
        target: ActionTarget,
        staff_name: Option<String>,
    },
    VerifyOtp {
        target: ActionTarget,
    },
    Commit {
        target: ActionTarget,
        confirmation: Confirmation,
    },
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<BackendCall>,
    send_failures: VecDeque<BackendError>,
    verify_failures: VecDeque<BackendError>,
    commit_failures: VecDeque<BackendError>,
}

#[derive(Debug)]
pub struct MockBackend {
    latency: Duration,
    expires_in: Option<u64>,
    code_length: usize,
    state: Mutex<MockState>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl MockBackend {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            expires_in: Some(30),
            code_length: 6,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Cooldown reported with each issued code; `None` omits it from the response.
    pub fn with_expires_in(mut self, expires_in: Option<u64>) -> Self {
        self.expires_in = expires_in;
        self
    }

    pub fn with_code_length(mut self, code_length: usize) -> Self {
        self.code_length = code_length;
        self
    }

    pub fn fail_next_send(&self, error: BackendError) {
        self.lock().send_failures.push_back(error);
    }

    pub fn fail_next_verify(&self, error: BackendError) {
        self.lock().verify_failures.push_back(error);
    }

    pub fn fail_next_commit(&self, error: BackendError) {
        self.lock().commit_failures.push_back(error);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Commit { .. }))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_well_formed(&self, code: &str) -> bool {
        code.len() == self.code_length && code.chars().all(|c| c.is_ascii_digit())
    }
}

#[async_trait]
impl ActionBackend for MockBackend {
    async fn send_otp(
        &self,
        target: &ActionTarget,
        request: &SendOtpRequest,
    ) -> Result<SendOtpResponse, BackendError> {
        self.lock().calls.push(BackendCall::SendOtp {
            target: target.clone(),
            staff_name: request.staff_name.clone(),
        });
        tokio::time::sleep(self.latency).await;

        if let Some(error) = self.lock().send_failures.pop_front() {
            return Err(error);
        }
        tracing::debug!(action = %target.action, target_id = %target.id, "Mock code issued");
        Ok(SendOtpResponse {
            message: "OTP sent successfully".to_string(),
            expires_in: self.expires_in,
        })
    }

    async fn verify_otp(
        &self,
        target: &ActionTarget,
        request: &VerifyOtpRequest,
    ) -> Result<VerifyOtpResponse, BackendError> {
        self.lock().calls.push(BackendCall::VerifyOtp {
            target: target.clone(),
        });
        tokio::time::sleep(self.latency).await;

        if let Some(error) = self.lock().verify_failures.pop_front() {
            return Err(error);
        }
        let verified = self.is_well_formed(&request.otp) && request.otp != REJECTED_CODE;
        Ok(VerifyOtpResponse {
            verified,
            message: if verified {
                "OTP verified".to_string()
            } else {
                "Invalid OTP. Please try again.".to_string()
            },
        })
    }

    async fn commit(
        &self,
        target: &ActionTarget,
        confirmation: &Confirmation,
    ) -> Result<CommitResponse, BackendError> {
        self.lock().calls.push(BackendCall::Commit {
            target: target.clone(),
            confirmation: confirmation.clone(),
        });
        // Scheme status changes are local-only in the mock.
        if target.action.entity() == crate::workflow::EntityKind::Order {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(error) = self.lock().commit_failures.pop_front() {
            return Err(error);
        }
        let message = match target.action {
            ActionKind::DeliverOrder => "Order delivered",
            ActionKind::CancelOrder => "Order cancelled",
            ActionKind::PauseScheme => "Scheme paused",
            ActionKind::StopScheme => "Scheme stopped",
        };
        Ok(CommitResponse {
            message: message.to_string(),
        })
    }
}
