//! Reply workflow: from a free-text draft to a sent email.
//!
//! A session moves through Write → Analyze → Recipient → Review → Sent. The
//! [`WorkflowEngine`] is the only place that changes a session's step, and
//! it does so only for actions its transition table allows.

pub mod engine;
pub mod state;

pub use engine::{Action, ActionKind, Outcome, RecipientInput, WorkflowEngine};
pub use state::{Recipient, Session, Step, default_subject};
