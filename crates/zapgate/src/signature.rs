//! Contract signature invitations sent over WhatsApp.

use thiserror::Error;
use tracing::info;

use crate::config::SignatureConfig;
use crate::credential::{CredentialPolicy, OperationClass, Role};
use crate::dispatch::{MessageDispatcher, OutboundMessage, SendReceipt};
use crate::error::{ValidationError, WorkflowError};
use crate::store::{ConfigStore, StoreError};

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature page URL is not configured (signature.base_url)")]
    MissingBaseUrl,

    #[error("failed to read WhatsApp settings: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl From<ValidationError> for SignatureError {
    fn from(err: ValidationError) -> Self {
        Self::Workflow(err.into())
    }
}

/// Contract being sent for signature.
#[derive(Debug, Clone)]
pub struct ContractInvite {
    pub contract_id: String,
    pub title: String,
    pub client_name: String,
    pub phone: String,
}

/// Link to the public signing page for `contract_id`.
pub fn signature_link(base_url: &str, contract_id: &str) -> String {
    format!(
        "{}/contract-signature?contractId={}",
        base_url.trim_end_matches('/'),
        contract_id
    )
}

pub fn compose_signature_message(title: &str, client_name: &str, link: &str) -> String {
    format!(
        "*{title}*\n\n\
         Olá {client_name},\n\n\
         Seu contrato de rastreamento veicular está pronto para assinatura. \
         Para assinar online, clique no link abaixo:\n\n\
         {link}\n\n\
         O link é válido por 7 dias. Se precisar de ajuda, entre em contato conosco.\n\n\
         Atenciosamente,\n\
         Equipe de Rastreamento"
    )
}

/// Send the signing link for `invite` through the stored instance, with the
/// message key `policy` resolves for `role`.
pub async fn send_contract_for_signature(
    store: &dyn ConfigStore,
    dispatcher: &MessageDispatcher,
    policy: &CredentialPolicy,
    role: Role,
    config: &SignatureConfig,
    invite: &ContractInvite,
) -> Result<SendReceipt, SignatureError> {
    let base_url = config
        .base_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .ok_or(SignatureError::MissingBaseUrl)?;

    let record = store.load().await?.ok_or(ValidationError::MissingInstance)?;
    if record.instance.trim().is_empty() {
        return Err(ValidationError::MissingInstance.into());
    }
    let api_key = policy.resolve(role, OperationClass::MessageSend, &record.api_key);
    if api_key.is_empty() {
        return Err(ValidationError::MissingCredential.into());
    }

    let link = signature_link(base_url, &invite.contract_id);
    let body = compose_signature_message(&invite.title, &invite.client_name, &link);
    let message = OutboundMessage::new(&invite.phone, body).with_delay(config.delay_ms);

    let receipt = dispatcher
        .send(&record.instance, api_key, &message)
        .await?;
    info!(contract = %invite.contract_id, to = %receipt.recipient, "Signature link sent");
    Ok(receipt)
}
