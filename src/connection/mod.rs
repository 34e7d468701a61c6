//! Session management
//!
//! [`ConnectionSupervisor`] is the only place a session's status is derived.
//! Either channel failing runs the same teardown as a caller `disconnect`.

mod state;
mod supervisor;

pub use state::{DisconnectReason, SessionEvent, SessionStats, SessionStatus};
pub use supervisor::ConnectionSupervisor;
