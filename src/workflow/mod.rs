// Guarded action workflow: code challenge, verification gate and commit step
// shared by order delivery, order cancellation and scheme pause/stop.

pub mod actions;
pub mod cooldown;
pub mod errors;
pub mod guarded;
pub mod listener;
pub mod session;

pub use actions::{ActionFields, ActionKind, Confirmation, EntityKind, RequiredField};
pub use errors::WorkflowError;
pub use guarded::GuardedAction;
pub use listener::ActionListener;
pub use session::{SessionEvent, SessionMachine, SessionPhase};
