// Guarded action orchestration: send code, verify, collect fields, commit.
//
// One `GuardedAction` is one open modal. All session state lives behind a
// mutex that is never held across an await; every backend call races the
// session's cancellation token, and a response arriving after `close()` is
// dropped without touching the reset session.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::actions::{ActionFields, ActionKind, Confirmation, EntityKind, RequiredField};
use super::cooldown::Countdown;
use super::errors::WorkflowError;
use super::listener::ActionListener;
use super::session::{SessionEvent, SessionMachine, SessionPhase};
use crate::backend::{ActionBackend, ActionTarget, BackendError, SendOtpRequest, VerifyOtpRequest};
use crate::config::OtpConfig;
use crate::domain::{DeliveryMode, Order, Scheme};
use crate::telemetry::{create_action_span, generate_correlation_id};

struct Inner {
    open: bool,
    generation: u64,
    lifetime: CancellationToken,
    machine: SessionMachine,
    fields: ActionFields,
    countdown: Option<Countdown>,
}

impl Inner {
    fn new() -> Self {
        Self {
            open: true,
            generation: 0,
            lifetime: CancellationToken::new(),
            machine: SessionMachine::new(),
            fields: ActionFields::default(),
            countdown: None,
        }
    }

    fn ensure_open(&self) -> Result<(), WorkflowError> {
        if self.open {
            Ok(())
        } else {
            Err(WorkflowError::Closed)
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What happened to a backend call once the session looks at it again.
enum Settled<T> {
    Done(Result<T, BackendError>),
    Stale,
}

pub struct GuardedAction {
    target: ActionTarget,
    contact: Option<String>,
    backend: Arc<dyn ActionBackend>,
    config: OtpConfig,
    code_pattern: Regex,
    correlation_id: String,
    span: tracing::Span,
    inner: Arc<Mutex<Inner>>,
}

impl GuardedAction {
    /// Open a delivery or cancellation session for a pending order.
    pub fn for_order(
        action: ActionKind,
        order: &Order,
        backend: Arc<dyn ActionBackend>,
        config: OtpConfig,
    ) -> Result<Self, WorkflowError> {
        if action.entity() != EntityKind::Order {
            return Err(WorkflowError::WrongEntity {
                action,
                entity: EntityKind::Order,
            });
        }
        action.check_order(order)?;
        let contact = order.customer.masked_phone();
        Self::open_session(action, &order.id, contact, backend, config)
    }

    /// Open a pause or stop session for a live scheme.
    pub fn for_scheme(
        action: ActionKind,
        scheme: &Scheme,
        backend: Arc<dyn ActionBackend>,
        config: OtpConfig,
    ) -> Result<Self, WorkflowError> {
        if action.entity() != EntityKind::Scheme {
            return Err(WorkflowError::WrongEntity {
                action,
                entity: EntityKind::Scheme,
            });
        }
        action.check_scheme(scheme)?;
        let contact = scheme.customer.masked_phone();
        Self::open_session(action, &scheme.id, contact, backend, config)
    }

    fn open_session(
        action: ActionKind,
        target_id: &str,
        contact: Option<String>,
        backend: Arc<dyn ActionBackend>,
        config: OtpConfig,
    ) -> Result<Self, WorkflowError> {
        let code_pattern = Regex::new(&format!(r"^[0-9]{{{}}}$", config.code_length))
            .map_err(|_| WorkflowError::InvalidCode {
                expected: config.code_length,
            })?;
        let correlation_id = generate_correlation_id();
        let span = create_action_span(action, target_id, &correlation_id);
        span.in_scope(|| tracing::info!(contact = ?contact, "Guarded action opened"));

        Ok(Self {
            target: ActionTarget::new(action, target_id),
            contact,
            backend,
            config,
            code_pattern,
            correlation_id,
            span,
            inner: Arc::new(Mutex::new(Inner::new())),
        })
    }

    pub fn action(&self) -> ActionKind {
        self.target.action
    }

    pub fn target_id(&self) -> &str {
        &self.target.id
    }

    /// Masked phone the code goes to.
    pub fn contact(&self) -> Option<&str> {
        self.contact.as_deref()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn is_open(&self) -> bool {
        lock(&self.inner).open
    }

    pub fn phase(&self) -> SessionPhase {
        lock(&self.inner).machine.phase()
    }

    pub fn otp(&self) -> String {
        lock(&self.inner).machine.otp().to_string()
    }

    pub fn otp_sent(&self) -> bool {
        lock(&self.inner).machine.otp_sent()
    }

    pub fn otp_verified(&self) -> bool {
        lock(&self.inner).machine.otp_verified()
    }

    pub fn resend_timer(&self) -> u64 {
        lock(&self.inner).machine.resend_timer()
    }

    pub fn failed_attempts(&self) -> u32 {
        lock(&self.inner).machine.failed_attempts()
    }

    /// The single inline message shown in the modal, if any.
    pub fn error(&self) -> Option<String> {
        lock(&self.inner).machine.error().map(str::to_string)
    }

    pub fn fields(&self) -> ActionFields {
        lock(&self.inner).fields.clone()
    }

    pub fn missing_fields(&self) -> Vec<RequiredField> {
        lock(&self.inner).fields.missing(self.target.action)
    }

    /// Whether the send button is enabled.
    pub fn can_send(&self) -> bool {
        let inner = lock(&self.inner);
        self.send_precondition(&inner).is_ok()
    }

    /// Whether the confirm button is enabled: verified and every required field filled.
    pub fn can_commit(&self) -> bool {
        let inner = lock(&self.inner);
        inner.open
            && inner.machine.phase() == SessionPhase::Verified
            && inner.fields.missing(self.target.action).is_empty()
    }

    pub fn set_delivery_mode(&self, mode: DeliveryMode) -> Result<(), WorkflowError> {
        self.update_fields(|fields| fields.delivery_mode = Some(mode))
    }

    pub fn set_comments(&self, comments: impl Into<String>) -> Result<(), WorkflowError> {
        let comments = comments.into();
        self.update_fields(move |fields| fields.comments = comments)
    }

    pub fn set_reason(&self, reason: impl Into<String>) -> Result<(), WorkflowError> {
        let reason = reason.into();
        self.update_fields(move |fields| fields.reason = reason)
    }

    pub fn set_staff_name(&self, staff_name: impl Into<String>) -> Result<(), WorkflowError> {
        let staff_name = staff_name.into();
        self.update_fields(move |fields| fields.staff_name = staff_name)
    }

    pub fn dismiss_error(&self) {
        let mut inner = lock(&self.inner);
        self.apply(&mut inner, SessionEvent::DismissError);
    }

    /// Hide the modal: cancel in-flight calls, stop the countdown and reset every field.
    pub fn close(&self) {
        let mut inner = lock(&self.inner);
        if !inner.open {
            return;
        }
        inner.open = false;
        inner.generation += 1;
        inner.lifetime.cancel();
        inner.countdown = None;
        inner.fields = ActionFields::default();
        self.apply(&mut inner, SessionEvent::Reset);
        self.span.in_scope(|| tracing::info!("Guarded action closed"));
    }

    /// Show the modal again with a fresh session.
    pub fn reopen(&self) {
        let mut inner = lock(&self.inner);
        if inner.open {
            return;
        }
        inner.open = true;
        inner.lifetime = CancellationToken::new();
        self.span.in_scope(|| tracing::info!("Guarded action reopened"));
    }

    /// Ask the backend to issue a code and start the resend cooldown.
    pub async fn send(&self) -> Result<String, WorkflowError> {
        let (token, generation, request) = {
            let inner = lock(&self.inner);
            self.send_precondition(&inner)?;
            let staff_name = self
                .target
                .action
                .requires_staff_before_send()
                .then(|| inner.fields.staff_name.trim().to_string());
            (
                inner.lifetime.clone(),
                inner.generation,
                SendOtpRequest { staff_name },
            )
        };

        let result = self
            .settle(
                &token,
                generation,
                self.backend.send_otp(&self.target, &request),
            )
            .await;

        let mut inner = lock(&self.inner);
        match result {
            Settled::Stale => Err(WorkflowError::Cancelled),
            Settled::Done(Ok(response)) => {
                let expires_in = response
                    .expires_in
                    .unwrap_or(self.config.fallback_expires_in_secs);
                self.apply(&mut inner, SessionEvent::OtpSent { expires_in });
                self.start_countdown(&mut inner);
                Ok(response.message)
            }
            Settled::Done(Err(error)) => {
                self.apply(
                    &mut inner,
                    SessionEvent::SendFailed {
                        reason: error.user_message(),
                    },
                );
                Err(error.into())
            }
        }
    }

    /// Check `code` with the backend. A rejected or failed check clears the
    /// entered code and keeps the sent state and cooldown.
    pub async fn verify(&self, code: &str) -> Result<(), WorkflowError> {
        let (token, generation) = {
            let mut inner = lock(&self.inner);
            inner.ensure_open()?;
            match inner.machine.phase() {
                SessionPhase::Idle => return Err(WorkflowError::NotSent),
                SessionPhase::OtpSent { .. } | SessionPhase::Failed { .. } => {}
                _ => return Err(WorkflowError::AlreadyVerified),
            }
            if let Some(max) = self.config.max_verify_attempts {
                if inner.machine.failed_attempts() >= max {
                    return Err(WorkflowError::AttemptsExhausted(max));
                }
            }
            if !self.code_pattern.is_match(code) {
                return Err(WorkflowError::InvalidCode {
                    expected: self.config.code_length,
                });
            }
            self.apply(
                &mut inner,
                SessionEvent::CodeEntered {
                    code: code.to_string(),
                },
            );
            (inner.lifetime.clone(), inner.generation)
        };

        let request = VerifyOtpRequest {
            otp: code.to_string(),
        };
        let result = self
            .settle(
                &token,
                generation,
                self.backend.verify_otp(&self.target, &request),
            )
            .await;

        let mut inner = lock(&self.inner);
        match result {
            Settled::Stale => Err(WorkflowError::Cancelled),
            Settled::Done(Ok(response)) if response.verified => {
                self.apply(&mut inner, SessionEvent::VerifySucceeded);
                inner.countdown = None;
                Ok(())
            }
            Settled::Done(Ok(response)) => {
                let reason = if response.message.trim().is_empty() {
                    "Invalid OTP".to_string()
                } else {
                    response.message
                };
                self.apply(
                    &mut inner,
                    SessionEvent::VerifyRejected {
                        reason: reason.clone(),
                    },
                );
                Err(WorkflowError::CodeRejected(reason))
            }
            Settled::Done(Err(error)) => {
                self.apply(
                    &mut inner,
                    SessionEvent::VerifyRejected {
                        reason: error.user_message(),
                    },
                );
                Err(error.into())
            }
        }
    }

    /// Perform the terminal action, close the session and notify the parent.
    /// A failed call keeps every field and the verification, so it can be retried.
    pub async fn commit(&self, listener: &dyn ActionListener) -> Result<Confirmation, WorkflowError> {
        let (token, generation, confirmation) = {
            let mut inner = lock(&self.inner);
            inner.ensure_open()?;
            match inner.machine.phase() {
                SessionPhase::Verified => {}
                SessionPhase::Committing => return Err(WorkflowError::CommitInProgress),
                _ => return Err(WorkflowError::NotVerified),
            }
            let missing = inner.fields.missing(self.target.action);
            if !missing.is_empty() {
                return Err(WorkflowError::MissingFields(missing));
            }
            let confirmation = inner
                .fields
                .confirmation(self.target.action, inner.machine.otp())
                .ok_or(WorkflowError::MissingFields(Vec::new()))?;
            self.apply(&mut inner, SessionEvent::CommitStarted);
            (inner.lifetime.clone(), inner.generation, confirmation)
        };

        let result = self
            .settle(
                &token,
                generation,
                self.backend.commit(&self.target, &confirmation),
            )
            .await;

        {
            let mut inner = lock(&self.inner);
            match result {
                Settled::Stale => return Err(WorkflowError::Cancelled),
                Settled::Done(Ok(response)) => {
                    self.apply(&mut inner, SessionEvent::CommitSucceeded);
                    self.span
                        .in_scope(|| tracing::info!(message = %response.message, "Commit accepted"));
                }
                Settled::Done(Err(error)) => {
                    self.apply(
                        &mut inner,
                        SessionEvent::CommitFailed {
                            reason: error.user_message(),
                        },
                    );
                    return Err(error.into());
                }
            }
        }

        self.close();
        if let Err(error) = confirmation.notify(&self.target.id, listener) {
            self.span
                .in_scope(|| tracing::warn!(error = %error, "Parent view rejected committed action"));
            return Err(error.into());
        }
        Ok(confirmation)
    }

    fn send_precondition(&self, inner: &Inner) -> Result<(), WorkflowError> {
        inner.ensure_open()?;
        if inner.machine.otp_verified() {
            return Err(WorkflowError::AlreadyVerified);
        }
        let remaining = inner.machine.resend_timer();
        if remaining > 0 {
            return Err(WorkflowError::CooldownActive(remaining));
        }
        if self.contact.is_none() {
            return Err(WorkflowError::MissingContact(self.target.id.clone()));
        }
        if self.target.action.requires_staff_before_send()
            && !inner.fields.is_filled(RequiredField::StaffName)
        {
            return Err(WorkflowError::StaffNameRequired);
        }
        Ok(())
    }

    fn update_fields<F>(&self, update: F) -> Result<(), WorkflowError>
    where
        F: FnOnce(&mut ActionFields),
    {
        let mut inner = lock(&self.inner);
        inner.ensure_open()?;
        update(&mut inner.fields);
        Ok(())
    }

    fn apply(&self, inner: &mut Inner, event: SessionEvent) {
        self.span.in_scope(|| inner.machine.handle(event));
    }

    /// Await a backend call unless the session is closed first.
    async fn settle<T, F>(&self, token: &CancellationToken, generation: u64, call: F) -> Settled<T>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = call.instrument(self.span.clone()) => Some(result),
        };

        let current = lock(&self.inner).generation;
        match outcome {
            Some(result) if current == generation => Settled::Done(result),
            _ => {
                self.span
                    .in_scope(|| tracing::debug!("Dropping response for a closed session"));
                Settled::Stale
            }
        }
    }

    fn start_countdown(&self, inner: &mut Inner) {
        inner.countdown = None;
        if !inner.machine.counting_down() {
            return;
        }
        let shared: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let generation = inner.generation;
        let span = self.span.clone();
        let period = Duration::from_millis(self.config.tick_interval_ms);
        inner.countdown = Some(Countdown::start(period, &inner.lifetime, move || {
            let Some(shared) = shared.upgrade() else {
                return false;
            };
            let mut inner = lock(&shared);
            if inner.generation != generation {
                return false;
            }
            span.in_scope(|| inner.machine.handle(SessionEvent::Tick));
            inner.machine.counting_down()
        }));
    }
}

impl Drop for GuardedAction {
    fn drop(&mut self) {
        lock(&self.inner).lifetime.cancel();
    }
}
