//! Session value and its status transitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle status of one instance binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one WhatsApp instance binding.
///
/// Only the session manager mutates a `Session`. The optional fields follow
/// the status: `qr_payload` exists only while connecting, `error_message`
/// only while in error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    instance_id: String,
    status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    qr_payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    last_updated: DateTime<Utc>,
}

impl Session {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            status: SessionStatus::Disconnected,
            qr_payload: None,
            error_message: None,
            last_updated: Utc::now(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn qr_payload(&self) -> Option<&str> {
        self.qr_payload.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    pub(crate) fn set_instance(&mut self, instance_id: &str) {
        if self.instance_id != instance_id {
            self.instance_id = instance_id.to_string();
        }
    }

    /// Move to `connecting`. `qr_payload` is replaced, not merged.
    pub(crate) fn mark_connecting(&mut self, qr_payload: Option<String>) {
        self.transition(SessionStatus::Connecting);
        self.qr_payload = qr_payload;
    }

    pub(crate) fn mark_connected(&mut self) {
        self.transition(SessionStatus::Connected);
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.transition(SessionStatus::Disconnected);
    }

    pub(crate) fn mark_error(&mut self, message: impl Into<String>) {
        self.transition(SessionStatus::Error);
        self.error_message = Some(message.into());
    }

    fn transition(&mut self, status: SessionStatus) {
        self.status = status;
        if status != SessionStatus::Connecting {
            self.qr_payload = None;
        }
        if status != SessionStatus::Error {
            self.error_message = None;
        }
        self.last_updated = Utc::now();
    }
}
