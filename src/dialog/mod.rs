//! Registration dialog: the per-user conversation that collects a name and
//! a phone number and records the result exactly once.
//!
//! `engine` holds the pure transition logic; `service` runs it against the
//! session table and the registration store.

pub mod engine;
pub mod event;
pub mod service;
pub mod state;
pub mod validate;

pub use engine::{SessionChange, Step};
pub use event::{EventKind, InboundEvent, ReplyDirective};
pub use service::RegistrationService;
pub use state::{Collected, Session, Stage};

/// Identity of one remote correspondent (the Telegram chat id).
pub type UserId = i64;
