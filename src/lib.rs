// Gold Smith - guarded admin actions for orders and savings schemes
// This exposes the core components for testing and integration

pub mod backend;
pub mod config;
pub mod domain;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use backend::{ActionBackend, ActionTarget, BackendError, HttpBackend, MockBackend};
pub use config::{BackendMode, GoldSmithConfig, OtpConfig};
pub use domain::{DomainError, Order, OrderStatus, Scheme, SchemeStatus};
pub use store::{AdminStore, Snapshot};
pub use telemetry::{create_action_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    ActionKind, ActionListener, Confirmation, GuardedAction, SessionPhase, WorkflowError,
};
