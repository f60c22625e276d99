//! Identity and session management for the foxhub gate.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;

pub use principal::Principal;
pub use session::{Session, SessionManager, SessionToken, SESSION_TTL};
