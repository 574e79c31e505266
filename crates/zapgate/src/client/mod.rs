//! HTTP client for the WhatsApp messaging gateway.
//!
//! `Gateway` is the seam the session manager and dispatcher call through;
//! `HttpGateway` implements it over reqwest. Every request carries the
//! resolved credential in the `apikey` header.

mod error;
#[cfg(test)]
pub(crate) mod fake;

pub use error::{ClientError, Result};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use zapgate_gateway_protocol::{
    API_KEY_HEADER, ConnectResponse, ConnectionStateResponse, SendTextRequest, SendTextResponse,
    extract_message, paths,
};

use crate::config::GatewayConfig;

/// Operations the gateway exposes for one instance.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Request a pairing QR code (`GET /instance/connect/{instance}`).
    async fn connect(&self, instance: &str, api_key: &str) -> Result<ConnectResponse>;

    /// Query the instance state (`GET /instance/connectionState/{instance}`).
    async fn connection_state(
        &self,
        instance: &str,
        api_key: &str,
    ) -> Result<ConnectionStateResponse>;

    /// Log the instance out (`DELETE /instance/logout/{instance}`).
    async fn logout(&self, instance: &str, api_key: &str) -> Result<()>;

    /// Restart the instance (`POST /instance/restart/{instance}`).
    async fn restart(&self, instance: &str, api_key: &str) -> Result<()>;

    /// Send a text message (`POST /message/sendText/{instance}`).
    async fn send_text(
        &self,
        instance: &str,
        api_key: &str,
        body: &SendTextRequest,
    ) -> Result<SendTextResponse>;
}

/// Gateway client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    http: Client,
}

impl HttpGateway {
    /// Create a client with default reqwest settings.
    ///
    /// Example: `HttpGateway::new("https://gw.example.com")`
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Create a client with the timeouts from `config`.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self::with_client(http, &config.base_url))
    }

    #[must_use]
    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn request(&self, method: Method, path: &str, api_key: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "Gateway request");
        self.http
            .request(method, url)
            .header(API_KEY_HEADER, api_key)
            .header("Content-Type", "application/json")
    }

    /// Convert a non-success response into a `ClientError::Api`.
    async fn parse_error(response: Response) -> ClientError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| extract_message(&value))
            .unwrap_or_else(|| format!("HTTP {status}"));

        ClientError::Api { status, message }
    }

    /// Decode a successful JSON response or convert an error response.
    async fn json_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Accept any successful response, discarding the body.
    async fn empty_response(response: Response) -> Result<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::parse_error(response).await)
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn connect(&self, instance: &str, api_key: &str) -> Result<ConnectResponse> {
        let response = self
            .request(Method::GET, &paths::connect(instance), api_key)
            .send()
            .await?;
        Self::json_response(response).await
    }

    async fn connection_state(
        &self,
        instance: &str,
        api_key: &str,
    ) -> Result<ConnectionStateResponse> {
        let response = self
            .request(Method::GET, &paths::connection_state(instance), api_key)
            .send()
            .await?;
        Self::json_response(response).await
    }

    async fn logout(&self, instance: &str, api_key: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &paths::logout(instance), api_key)
            .send()
            .await?;
        Self::empty_response(response).await
    }

    async fn restart(&self, instance: &str, api_key: &str) -> Result<()> {
        let response = self
            .request(Method::POST, &paths::restart(instance), api_key)
            .send()
            .await?;
        Self::empty_response(response).await
    }

    async fn send_text(
        &self,
        instance: &str,
        api_key: &str,
        body: &SendTextRequest,
    ) -> Result<SendTextResponse> {
        let response = self
            .request(Method::POST, &paths::send_text(instance), api_key)
            .json(body)
            .send()
            .await?;
        Self::json_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_new_trims_trailing_slash() {
        let client = HttpGateway::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn client_new_preserves_url_without_slash() {
        let client = HttpGateway::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn from_config_uses_configured_base_url() {
        let config = GatewayConfig {
            base_url: "https://gw.example.com/".to_string(),
            ..Default::default()
        };
        let client = HttpGateway::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "https://gw.example.com");
    }
}
