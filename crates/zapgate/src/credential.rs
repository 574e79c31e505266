//! Credential resolution for gateway calls.
//!
//! This is the only place that decides which API key a call presents:
//! - `resolve`: pick the key for a role and an operation class
//! - `can_edit_message_key`: who may change the per-instance client key

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of the authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{other}' (expected admin, manager or user)")),
        }
    }
}

/// Class of gateway operation a credential is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    /// Connect, connection state, logout, restart.
    SessionManagement,
    /// Outbound text messages.
    MessageSend,
}

/// Resolves the API key presented to the gateway.
///
/// Holds the deployment-wide global key. Resolution is a pure function of the
/// caller's role, the operation class, and the caller-supplied instance key.
#[derive(Clone, Default)]
pub struct CredentialPolicy {
    global_key: String,
}

impl CredentialPolicy {
    pub fn new(global_key: impl Into<String>) -> Self {
        Self {
            global_key: global_key.into(),
        }
    }

    /// Return the key to present for `operation` on behalf of `role`.
    ///
    /// - Session management as `Admin` always uses the global key, ignoring
    ///   whatever instance key the caller supplied.
    /// - Session management for other roles uses the instance key.
    /// - Message sends always use the instance key; the global key is never
    ///   used for sending.
    ///
    /// An empty string is a valid result. Callers check for emptiness
    /// before contacting the gateway.
    pub fn resolve<'a>(
        &'a self,
        role: Role,
        operation: OperationClass,
        instance_key: &'a str,
    ) -> &'a str {
        match (operation, role) {
            (OperationClass::SessionManagement, Role::Admin) => self.global_key.as_str(),
            (OperationClass::SessionManagement, _) => instance_key,
            (OperationClass::MessageSend, _) => instance_key,
        }
    }

    /// Whether a global key is configured at all.
    pub fn has_global_key(&self) -> bool {
        !self.global_key.is_empty()
    }
}

impl fmt::Debug for CredentialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPolicy")
            .field("global_key", &redact(&self.global_key))
            .finish()
    }
}

/// Whether `role` may edit the per-instance client key.
pub fn can_edit_message_key(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Manager)
}

/// Mask a key for logs: keeps the last four characters.
pub fn redact(key: &str) -> String {
    let count = key.chars().count();
    if count == 0 {
        return "<empty>".to_string();
    }
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("****{tail}")
}
