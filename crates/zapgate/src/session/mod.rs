//! WhatsApp session lifecycle.
//!
//! `disconnected -> connecting -> connected | error`, driven by
//! [`SessionManager`] probing the gateway. A QR countdown bounds how long
//! `connecting` may last.

mod countdown;
mod manager;
mod state;

pub use manager::{RecheckHandle, SessionManager, SessionManagerBuilder};
pub use state::{Session, SessionStatus};
