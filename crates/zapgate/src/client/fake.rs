//! Scripted in-memory gateway for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use zapgate_gateway_protocol::{
    ConnectResponse, ConnectionStateResponse, SendTextRequest, SendTextResponse,
};

use super::{ClientError, Gateway, Result};

/// Scripted reply for one call.
#[derive(Debug, Clone)]
pub(crate) enum Reply<T> {
    Ok(T),
    /// Connection-level failure.
    Transport,
    /// Non-success HTTP status.
    Status(u16, String),
}

impl<T> Reply<T> {
    fn into_result(self) -> Result<T> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Transport => Err(transport_error()),
            Reply::Status(status, message) => Err(ClientError::Api { status, message }),
        }
    }
}

/// A reqwest error produced without touching the network.
pub(crate) fn transport_error() -> ClientError {
    match reqwest::Client::new().get("not a url").build() {
        Err(e) => ClientError::Http(e),
        Ok(_) => ClientError::Api {
            status: 0,
            message: "unexpected url".to_string(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub op: &'static str,
    pub instance: String,
    pub api_key: String,
}

type Script<T> = Mutex<VecDeque<(Duration, Reply<T>)>>;

/// Gateway fake. Each endpoint pops its next scripted reply; an empty
/// script yields the endpoint's default success.
#[derive(Debug, Default)]
pub(crate) struct FakeGateway {
    calls: Mutex<Vec<Call>>,
    sent: Mutex<Vec<SendTextRequest>>,
    connect: Script<ConnectResponse>,
    state: Script<ConnectionStateResponse>,
    logout: Script<()>,
    restart: Script<()>,
    send: Script<SendTextResponse>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_connect(&self, reply: Reply<ConnectResponse>) -> &Self {
        self.push_connect_after(Duration::ZERO, reply)
    }

    pub fn push_connect_after(&self, delay: Duration, reply: Reply<ConnectResponse>) -> &Self {
        lock(&self.connect).push_back((delay, reply));
        self
    }

    pub fn push_state(&self, reply: Reply<ConnectionStateResponse>) -> &Self {
        self.push_state_after(Duration::ZERO, reply)
    }

    pub fn push_state_after(
        &self,
        delay: Duration,
        reply: Reply<ConnectionStateResponse>,
    ) -> &Self {
        lock(&self.state).push_back((delay, reply));
        self
    }

    pub fn push_logout(&self, reply: Reply<()>) -> &Self {
        lock(&self.logout).push_back((Duration::ZERO, reply));
        self
    }

    pub fn push_restart(&self, reply: Reply<()>) -> &Self {
        lock(&self.restart).push_back((Duration::ZERO, reply));
        self
    }

    pub fn push_send(&self, reply: Reply<SendTextResponse>) -> &Self {
        lock(&self.send).push_back((Duration::ZERO, reply));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, op: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.op == op).count()
    }

    pub fn sent(&self) -> Vec<SendTextRequest> {
        lock(&self.sent).clone()
    }

    fn record(&self, op: &'static str, instance: &str, api_key: &str) {
        lock(&self.calls).push(Call {
            op,
            instance: instance.to_string(),
            api_key: api_key.to_string(),
        });
    }

    async fn next<T>(script: &Script<T>, default: impl FnOnce() -> T) -> Result<T> {
        let next = lock(script).pop_front();
        match next {
            Some((delay, reply)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                reply.into_result()
            }
            None => Ok(default()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// `{ "base64": payload }`
pub(crate) fn qr(payload: &str) -> ConnectResponse {
    ConnectResponse {
        base64: Some(payload.to_string()),
        ..Default::default()
    }
}

/// `{ "state": state }`
pub(crate) fn state(state: &str) -> ConnectionStateResponse {
    ConnectionStateResponse {
        state: Some(state.to_string()),
        instance: None,
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn connect(&self, instance: &str, api_key: &str) -> Result<ConnectResponse> {
        self.record("connect", instance, api_key);
        Self::next(&self.connect, ConnectResponse::default).await
    }

    async fn connection_state(
        &self,
        instance: &str,
        api_key: &str,
    ) -> Result<ConnectionStateResponse> {
        self.record("connection_state", instance, api_key);
        Self::next(&self.state, || state("close")).await
    }

    async fn logout(&self, instance: &str, api_key: &str) -> Result<()> {
        self.record("logout", instance, api_key);
        Self::next(&self.logout, || ()).await
    }

    async fn restart(&self, instance: &str, api_key: &str) -> Result<()> {
        self.record("restart", instance, api_key);
        Self::next(&self.restart, || ()).await
    }

    async fn send_text(
        &self,
        instance: &str,
        api_key: &str,
        body: &SendTextRequest,
    ) -> Result<SendTextResponse> {
        self.record("send_text", instance, api_key);
        lock(&self.sent).push(body.clone());
        Self::next(&self.send, || {
            SendTextResponse(json!({ "key": { "id": "MSG-1" }, "status": "PENDING" }))
        })
        .await
    }
}
