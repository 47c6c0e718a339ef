// Session state machine for one open guarded action.
//
// The machine is pure: network calls happen in the orchestrator, which feeds
// their outcomes back as events. Illegal states (verified without a sent code,
// committing without verification) have no representation.

use statig::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The backend issued a code; the resend cooldown starts at `expires_in`.
    OtpSent { expires_in: u64 },
    SendFailed { reason: String },
    CodeEntered { code: String },
    VerifySucceeded,
    VerifyRejected { reason: String },
    /// One second of resend cooldown has elapsed.
    Tick,
    CommitStarted,
    CommitSucceeded,
    CommitFailed { reason: String },
    DismissError,
    Reset,
}

impl SessionEvent {
    /// Event name for logs; payloads may carry a code and are never logged.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::OtpSent { .. } => "otp_sent",
            SessionEvent::SendFailed { .. } => "send_failed",
            SessionEvent::CodeEntered { .. } => "code_entered",
            SessionEvent::VerifySucceeded => "verify_succeeded",
            SessionEvent::VerifyRejected { .. } => "verify_rejected",
            SessionEvent::Tick => "tick",
            SessionEvent::CommitStarted => "commit_started",
            SessionEvent::CommitSucceeded => "commit_succeeded",
            SessionEvent::CommitFailed { .. } => "commit_failed",
            SessionEvent::DismissError => "dismiss_error",
            SessionEvent::Reset => "reset",
        }
    }
}

/// Public view of where a session is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    OtpSent { resend_in: u64 },
    Failed { reason: String },
    Verified,
    Committing,
    Committed,
}

impl SessionPhase {
    pub fn otp_sent(&self) -> bool {
        !matches!(self, SessionPhase::Idle)
    }

    pub fn otp_verified(&self) -> bool {
        matches!(
            self,
            SessionPhase::Verified | SessionPhase::Committing | SessionPhase::Committed
        )
    }
}

#[derive(Default)]
pub struct Session {
    pub otp: String,
    pub resend_timer: u64,
    pub failed_attempts: u32,
    pub error: Option<String>,
}

impl Session {
    fn clear(&mut self) {
        self.otp.clear();
        self.resend_timer = 0;
        self.failed_attempts = 0;
        self.error = None;
    }

    fn tick(&mut self) {
        self.resend_timer = self.resend_timer.saturating_sub(1);
    }
}

#[state_machine(initial = "State::idle()")]
impl Session {
    #[superstate]
    fn open(&mut self, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::Reset => {
                self.clear();
                tracing::debug!("Session reset to defaults");
                Transition(State::idle())
            }
            SessionEvent::DismissError => {
                self.error = None;
                Handled
            }
            other => {
                tracing::debug!(event = other.name(), "Event ignored in current session state");
                Handled
            }
        }
    }

    #[state(superstate = "open")]
    fn idle(&mut self, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::OtpSent { expires_in } => {
                self.resend_timer = *expires_in;
                self.error = None;
                tracing::info!(expires_in = %expires_in, "Code sent");
                Transition(State::otp_sent())
            }
            SessionEvent::SendFailed { reason } => {
                self.error = Some(reason.clone());
                Handled
            }
            _ => Super,
        }
    }

    #[state(superstate = "open")]
    fn otp_sent(&mut self, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::CodeEntered { code } => {
                self.otp = code.clone();
                Handled
            }
            SessionEvent::VerifySucceeded => {
                self.resend_timer = 0;
                self.error = None;
                tracing::info!("Code verified");
                Transition(State::verified())
            }
            SessionEvent::VerifyRejected { reason } => {
                self.otp.clear();
                self.failed_attempts += 1;
                self.error = Some(reason.clone());
                tracing::warn!(failed_attempts = self.failed_attempts, "Code rejected");
                Transition(State::failed())
            }
            SessionEvent::OtpSent { expires_in } => {
                self.resend_timer = *expires_in;
                self.error = None;
                tracing::info!(expires_in = %expires_in, "Code re-sent");
                Handled
            }
            SessionEvent::SendFailed { reason } => {
                self.error = Some(reason.clone());
                Handled
            }
            SessionEvent::Tick => {
                self.tick();
                Handled
            }
            _ => Super,
        }
    }

    /// A rejected code; the sent code and cooldown are kept so the user can retry.
    #[state(superstate = "open")]
    fn failed(&mut self, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::CodeEntered { code } => {
                self.otp = code.clone();
                Transition(State::otp_sent())
            }
            SessionEvent::OtpSent { expires_in } => {
                self.resend_timer = *expires_in;
                self.error = None;
                tracing::info!(expires_in = %expires_in, "Code re-sent");
                Transition(State::otp_sent())
            }
            SessionEvent::SendFailed { reason } => {
                self.error = Some(reason.clone());
                Handled
            }
            SessionEvent::Tick => {
                self.tick();
                Handled
            }
            _ => Super,
        }
    }

    #[state(superstate = "open")]
    fn verified(&mut self, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::CommitStarted => {
                self.error = None;
                Transition(State::committing())
            }
            _ => Super,
        }
    }

    #[state(superstate = "open")]
    fn committing(&mut self, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::CommitSucceeded => {
                tracing::info!("Action committed");
                Transition(State::committed())
            }
            SessionEvent::CommitFailed { reason } => {
                self.error = Some(reason.clone());
                tracing::warn!(reason = %reason, "Commit failed, verification kept");
                Transition(State::verified())
            }
            _ => Super,
        }
    }

    #[state(superstate = "open")]
    fn committed() -> Outcome<State> {
        Super
    }
}

/// Owns the machine and exposes the session's observable values.
pub struct SessionMachine {
    machine: StateMachine<Session>,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            machine: Session::default().state_machine(),
        }
    }

    pub fn handle(&mut self, event: SessionEvent) {
        self.machine.handle(&event);
    }

    pub fn phase(&self) -> SessionPhase {
        match self.machine.state() {
            State::Idle { .. } => SessionPhase::Idle,
            State::OtpSent { .. } => SessionPhase::OtpSent {
                resend_in: self.machine.resend_timer,
            },
            State::Failed { .. } => SessionPhase::Failed {
                reason: self.machine.error.clone().unwrap_or_default(),
            },
            State::Verified { .. } => SessionPhase::Verified,
            State::Committing { .. } => SessionPhase::Committing,
            State::Committed { .. } => SessionPhase::Committed,
        }
    }

    pub fn otp(&self) -> &str {
        &self.machine.otp
    }

    pub fn otp_sent(&self) -> bool {
        self.phase().otp_sent()
    }

    pub fn otp_verified(&self) -> bool {
        self.phase().otp_verified()
    }

    pub fn resend_timer(&self) -> u64 {
        self.machine.resend_timer
    }

    pub fn failed_attempts(&self) -> u32 {
        self.machine.failed_attempts
    }

    pub fn error(&self) -> Option<&str> {
        self.machine.error.as_deref()
    }

    /// True while the resend countdown should keep ticking.
    pub fn counting_down(&self) -> bool {
        self.resend_timer() > 0 && !self.otp_verified()
    }
}
