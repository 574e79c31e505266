//! Wire types for the WhatsApp messaging gateway REST API.
//!
//! This crate describes the subset of the gateway surface Zapgate consumes:
//! instance connect / connection state / logout / restart, and text sends.
//! It contains no I/O; the HTTP client lives in the `zapgate` crate.
//!
//! # Endpoints
//!
//! | Purpose         | Request                                    |
//! |-----------------|--------------------------------------------|
//! | Connect / QR    | `GET /instance/connect/{instance}`         |
//! | Query state     | `GET /instance/connectionState/{instance}` |
//! | Logout          | `DELETE /instance/logout/{instance}`       |
//! | Restart         | `POST /instance/restart/{instance}`        |
//! | Send text       | `POST /message/sendText/{instance}`        |
//!
//! Every request carries an `apikey` header and `Content-Type: application/json`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header carrying the resolved credential on every gateway request.
pub const API_KEY_HEADER: &str = "apikey";

// ============================================================================
// Paths
// ============================================================================

/// Path builders for the gateway endpoints.
///
/// The instance name is percent-encoded as a single path segment.
pub mod paths {
    use urlencoding::encode;

    pub fn connect(instance: &str) -> String {
        format!("/instance/connect/{}", encode(instance))
    }

    pub fn connection_state(instance: &str) -> String {
        format!("/instance/connectionState/{}", encode(instance))
    }

    pub fn logout(instance: &str) -> String {
        format!("/instance/logout/{}", encode(instance))
    }

    pub fn restart(instance: &str) -> String {
        format!("/instance/restart/{}", encode(instance))
    }

    pub fn send_text(instance: &str) -> String {
        format!("/message/sendText/{}", encode(instance))
    }
}

// ============================================================================
// Connect
// ============================================================================

/// Reply to `GET /instance/connect/{instance}`.
///
/// `base64` carries the QR image as a data URL while the instance is waiting
/// to be paired. An already-paired instance replies without it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    /// Raw QR code contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Phone pairing code, when the gateway offers one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
}

impl ConnectResponse {
    /// The QR image payload, if the gateway returned a non-empty one.
    pub fn qr_payload(&self) -> Option<&str> {
        self.base64.as_deref().filter(|b| !b.trim().is_empty())
    }
}

// ============================================================================
// Connection State
// ============================================================================

/// Instance state as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayState {
    /// Paired and online (`open` / `connected`).
    Open,
    /// Waiting for the QR code to be scanned.
    Connecting,
    /// Not paired or offline.
    Closed,
    /// Missing or unrecognized state value.
    Unknown(String),
}

impl GatewayState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" | "connected" => Self::Open,
            "connecting" => Self::Connecting,
            "close" | "closed" | "disconnected" => Self::Closed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Nested instance object in a connection-state reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Reply to `GET /instance/connectionState/{instance}`.
///
/// Gateways disagree on shape: some put `state` at the top level, others
/// nest it under `instance`. Both are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceState>,
}

impl ConnectionStateResponse {
    /// Raw state value, top level first.
    pub fn raw_state(&self) -> Option<&str> {
        self.state
            .as_deref()
            .or_else(|| self.instance.as_ref().and_then(|i| i.state.as_deref()))
    }

    pub fn gateway_state(&self) -> GatewayState {
        match self.raw_state() {
            Some(raw) => GatewayState::parse(raw),
            None => GatewayState::Unknown(String::new()),
        }
    }

    /// True when either state field carries the open sentinel.
    pub fn is_open(&self) -> bool {
        let top = self.state.as_deref().map(GatewayState::parse);
        let nested = self
            .instance
            .as_ref()
            .and_then(|i| i.state.as_deref())
            .map(GatewayState::parse);
        top == Some(GatewayState::Open) || nested == Some(GatewayState::Open)
    }
}

// ============================================================================
// Send Text
// ============================================================================

/// Body of `POST /message/sendText/{instance}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextRequest {
    pub number: String,
    pub text: String,
    /// Delay in milliseconds before the gateway delivers the message.
    pub delay: u64,
    pub link_preview: bool,
}

/// Reply to `POST /message/sendText/{instance}`.
///
/// Kept as raw JSON: a send is accepted when the reply carries
/// `status: "success"` or an assigned message `key`. Error replies reuse
/// `status` as a numeric HTTP code, so it cannot be typed as a string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SendTextResponse(pub Value);

impl SendTextResponse {
    pub fn is_accepted(&self) -> bool {
        let success = self
            .0
            .get("status")
            .and_then(Value::as_str)
            .is_some_and(|s| s.eq_ignore_ascii_case("success"));
        let keyed = self.0.get("key").is_some_and(|k| !k.is_null());
        success || keyed
    }

    /// Message id assigned by the gateway (`key.id`).
    pub fn message_id(&self) -> Option<&str> {
        self.0.get("key")?.get("id")?.as_str()
    }

    /// Human-readable failure message carried by the reply, if any.
    pub fn failure_message(&self) -> Option<String> {
        extract_message(&self.0)
    }
}

// ============================================================================
// Error Bodies
// ============================================================================

/// Pull a human-readable message out of a gateway error body.
///
/// Looks at `message`, `response.message` (string or list of strings) and
/// `error`, in that order.
pub fn extract_message(body: &Value) -> Option<String> {
    fn as_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().filter_map(as_text).collect();
                (!parts.is_empty()).then(|| parts.join("; "))
            }
            _ => None,
        }
    }

    body.get("message")
        .and_then(as_text)
        .or_else(|| {
            body.get("response")
                .and_then(|r| r.get("message"))
                .and_then(as_text)
        })
        .or_else(|| body.get("error").and_then(as_text))
}
