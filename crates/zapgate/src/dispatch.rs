//! Outbound text messages.
//!
//! `MessageDispatcher::send` validates a message, normalizes the recipient
//! and forwards it to the gateway once. There is no retry.

use std::sync::Arc;

use tracing::{info, warn};

use zapgate_gateway_protocol::SendTextRequest;

use crate::client::Gateway;
use crate::config::DispatchConfig;
use crate::error::{ValidationError, WorkflowError, WorkflowResult};

/// One send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Phone number or an already qualified id such as `123@g.us`.
    pub recipient: String,
    pub body: String,
    pub send_delay_ms: u64,
    pub link_preview_enabled: bool,
}

impl OutboundMessage {
    pub fn new(recipient: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            body: body.into(),
            send_delay_ms: 0,
            link_preview_enabled: false,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.send_delay_ms = delay_ms;
        self
    }

    pub fn with_link_preview(mut self, enabled: bool) -> Self {
        self.link_preview_enabled = enabled;
        self
    }

    /// Reset the composed text after a successful send, keeping the
    /// recipient for the next message.
    pub fn clear_body(&mut self) {
        self.body.clear();
    }
}

/// What the gateway assigned to an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Recipient as sent on the wire.
    pub recipient: String,
    pub message_id: Option<String>,
}

/// Normalize a recipient for the gateway.
///
/// Ids containing `@` pass through untouched. Anything else is reduced to
/// its digits, and `country_code` is prepended unless already present.
///
/// # Examples
///
/// ```
/// use zapgate::dispatch::normalize_recipient;
///
/// assert_eq!(normalize_recipient("(11) 98765-4321", "55").unwrap(), "5511987654321");
/// assert_eq!(normalize_recipient("123456789@g.us", "55").unwrap(), "123456789@g.us");
/// ```
pub fn normalize_recipient(raw: &str, country_code: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingRecipient);
    }
    if trimmed.contains('@') {
        return Ok(trimmed.to_string());
    }

    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(ValidationError::InvalidRecipient(raw.to_string()));
    }
    if country_code.is_empty() || digits.starts_with(country_code) {
        Ok(digits)
    } else {
        Ok(format!("{country_code}{digits}"))
    }
}

// ============================================================================
// MessageDispatcher
// ============================================================================

pub struct MessageDispatcher {
    gateway: Arc<dyn Gateway>,
    config: DispatchConfig,
}

impl MessageDispatcher {
    pub fn new(gateway: Arc<dyn Gateway>, config: DispatchConfig) -> Self {
        Self { gateway, config }
    }

    /// Build a message carrying the configured delay and preview defaults.
    pub fn compose(&self, recipient: impl Into<String>, body: impl Into<String>) -> OutboundMessage {
        OutboundMessage::new(recipient, body)
            .with_delay(self.config.default_delay_ms)
            .with_link_preview(self.config.link_preview)
    }

    /// Send `message` through `instance_id` using the message-send credential.
    ///
    /// All preconditions are checked before the gateway is contacted.
    pub async fn send(
        &self,
        instance_id: &str,
        credential: &str,
        message: &OutboundMessage,
    ) -> WorkflowResult<SendReceipt> {
        let instance = instance_id.trim();
        if instance.is_empty() {
            return Err(ValidationError::MissingInstance.into());
        }
        if credential.is_empty() {
            return Err(ValidationError::MissingCredential.into());
        }
        if message.recipient.trim().is_empty() {
            return Err(ValidationError::MissingRecipient.into());
        }
        if message.body.trim().is_empty() {
            return Err(ValidationError::MissingBody.into());
        }
        let number = normalize_recipient(&message.recipient, &self.config.default_country_code)?;

        let request = SendTextRequest {
            number,
            text: message.body.clone(),
            delay: message.send_delay_ms,
            link_preview: message.link_preview_enabled,
        };

        let reply = match self.gateway.send_text(instance, credential, &request).await {
            Ok(reply) => reply,
            Err(e) => {
                let err = WorkflowError::from(e);
                warn!(instance = %instance, to = %request.number, error = %err, "Send failed");
                return Err(err);
            }
        };

        if !reply.is_accepted() {
            let message = reply
                .failure_message()
                .unwrap_or_else(|| "gateway did not accept the message".to_string());
            warn!(instance = %instance, to = %request.number, error = %message, "Send rejected");
            return Err(WorkflowError::gateway(message));
        }

        let message_id = reply.message_id().map(str::to_string);
        info!(
            instance = %instance,
            to = %request.number,
            message_id = message_id.as_deref().unwrap_or("-"),
            "Message sent"
        );
        Ok(SendReceipt {
            recipient: request.number,
            message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{FakeGateway, Reply};
    use crate::credential::{CredentialPolicy, OperationClass, Role};
    use serde_json::json;
    use zapgate_gateway_protocol::SendTextResponse;

    fn dispatcher(gateway: &Arc<FakeGateway>) -> MessageDispatcher {
        let gateway: Arc<dyn Gateway> = gateway.clone();
        MessageDispatcher::new(gateway, DispatchConfig::default())
    }

    // ========================================================================
    // normalize_recipient
    // ========================================================================

    #[test]
    fn bare_number_gets_country_code() {
        assert_eq!(
            normalize_recipient("11987654321", "55").unwrap(),
            "5511987654321"
        );
    }

    #[test]
    fn formatting_is_stripped() {
        assert_eq!(
            normalize_recipient("+55 (11) 98765-4321", "55").unwrap(),
            "5511987654321"
        );
    }

    #[test]
    fn group_id_passes_through() {
        assert_eq!(
            normalize_recipient("123456789@g.us", "55").unwrap(),
            "123456789@g.us"
        );
    }

    #[test]
    fn recipient_without_digits_is_invalid() {
        assert_eq!(
            normalize_recipient("call me", "55").unwrap_err(),
            ValidationError::InvalidRecipient("call me".to_string())
        );
    }

    #[test]
    fn empty_country_code_leaves_digits() {
        assert_eq!(normalize_recipient("1-555-0100", "").unwrap(), "15550100");
    }

    // ========================================================================
    // send
    // ========================================================================

    #[tokio::test]
    async fn send_normalizes_recipient_and_uses_defaults() {
        let gateway = Arc::new(FakeGateway::new());
        let receipt = dispatcher(&gateway)
            .send(
                "shop1",
                "client-key",
                &OutboundMessage::new("11987654321", "Olá"),
            )
            .await
            .unwrap();

        assert_eq!(receipt.recipient, "5511987654321");
        assert_eq!(receipt.message_id.as_deref(), Some("MSG-1"));

        let sent = gateway.sent();
        assert_eq!(
            sent[0],
            SendTextRequest {
                number: "5511987654321".to_string(),
                text: "Olá".to_string(),
                delay: 0,
                link_preview: false,
            }
        );
        assert_eq!(gateway.calls()[0].api_key, "client-key");
    }

    #[tokio::test]
    async fn send_passes_group_id_and_options() {
        let gateway = Arc::new(FakeGateway::new());
        let message = OutboundMessage::new("123456789@g.us", "hi all")
            .with_delay(1200)
            .with_link_preview(true);

        dispatcher(&gateway)
            .send("shop1", "client-key", &message)
            .await
            .unwrap();

        let sent = &gateway.sent()[0];
        assert_eq!(sent.number, "123456789@g.us");
        assert_eq!(sent.delay, 1200);
        assert!(sent.link_preview);
    }

    #[tokio::test]
    async fn manager_with_empty_client_key_fails_before_network() {
        let gateway = Arc::new(FakeGateway::new());
        let policy = CredentialPolicy::new("GK");
        let credential = policy.resolve(Role::Manager, OperationClass::MessageSend, "");

        let err = dispatcher(&gateway)
            .send("shop1", credential, &OutboundMessage::new("11987654321", "hi"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::MissingCredential)
        ));
        assert_eq!(err.to_string(), "validation failed: missing credential");
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_fields_fail_before_network() {
        let gateway = Arc::new(FakeGateway::new());
        let dispatcher = dispatcher(&gateway);

        let cases = [
            ("", "k", OutboundMessage::new("1", "hi"), ValidationError::MissingInstance),
            ("shop1", "k", OutboundMessage::new(" ", "hi"), ValidationError::MissingRecipient),
            ("shop1", "k", OutboundMessage::new("1", ""), ValidationError::MissingBody),
        ];
        for (instance, key, message, expected) in cases {
            match dispatcher.send(instance, key, &message).await {
                Err(WorkflowError::Validation(actual)) => assert_eq!(actual, expected),
                other => panic!("expected {expected:?}, got {other:?}"),
            }
        }
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn unaccepted_reply_carries_gateway_message() {
        let gateway = Arc::new(FakeGateway::new());
        gateway.push_send(Reply::Ok(SendTextResponse(json!({
            "status": 400,
            "response": { "message": ["number not on WhatsApp"] }
        }))));

        let err = dispatcher(&gateway)
            .send("shop1", "k", &OutboundMessage::new("11987654321", "hi"))
            .await
            .unwrap_err();

        match err {
            WorkflowError::Gateway { message, .. } => {
                assert_eq!(message, "number not on WhatsApp");
            }
            other => panic!("expected Gateway, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unaccepted_reply_without_message_is_generic() {
        let gateway = Arc::new(FakeGateway::new());
        gateway.push_send(Reply::Ok(SendTextResponse(json!({ "ok": false }))));

        let err = dispatcher(&gateway)
            .send("shop1", "k", &OutboundMessage::new("11987654321", "hi"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("did not accept"));
    }

    #[tokio::test]
    async fn transport_failure_is_not_retried() {
        let gateway = Arc::new(FakeGateway::new());
        gateway.push_send(Reply::Transport);

        let err = dispatcher(&gateway)
            .send("shop1", "k", &OutboundMessage::new("11987654321", "hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Transport(_)));
        assert_eq!(gateway.calls_to("send_text"), 1);
    }

    #[test]
    fn compose_applies_config_defaults() {
        let gateway: Arc<dyn Gateway> = Arc::new(FakeGateway::new());
        let dispatcher = MessageDispatcher::new(
            gateway,
            DispatchConfig {
                default_delay_ms: 500,
                link_preview: true,
                ..Default::default()
            },
        );

        let message = dispatcher.compose("11987654321", "hi");
        assert_eq!(message.send_delay_ms, 500);
        assert!(message.link_preview_enabled);
    }

    #[test]
    fn clear_body_keeps_recipient() {
        let mut message = OutboundMessage::new("11987654321", "hi");
        message.clear_body();
        assert!(message.body.is_empty());
        assert_eq!(message.recipient, "11987654321");
    }
}
