//! CLI command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};

use zapgate::client::{Gateway, HttpGateway};
use zapgate::config::{Config, GatewayConfig};
use zapgate::credential::{CredentialPolicy, OperationClass, Role};
use zapgate::session::SessionManager;
use zapgate::store::{ConfigStore, FileConfigStore, WhatsAppRecord};

pub mod configure;
pub mod connect;
pub mod logout;
pub mod restart;
pub mod send;
pub mod sign;
pub mod status;
pub mod templates;

/// Loaded configuration plus the caller's role.
pub struct Context {
    pub config: Config,
    pub role: Role,
    pub store: Arc<FileConfigStore>,
}

impl Context {
    pub async fn load(config_path: &str, role: Role) -> Result<Self> {
        let path = PathBuf::from(config_path);
        let config = Config::load(&path)
            .await
            .with_context(|| format!("failed to load config '{config_path}'"))?;
        let store = Arc::new(FileConfigStore::new(config.store_path(&path)));
        Ok(Self {
            config,
            role,
            store,
        })
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    /// Stored record, or an empty one if nothing was saved yet.
    pub async fn record(&self) -> Result<WhatsAppRecord> {
        let record = self
            .store
            .load()
            .await
            .context("failed to read stored WhatsApp settings")?;
        Ok(record.unwrap_or_default())
    }

    /// Instance from the flag, falling back to the stored record.
    pub fn instance(flag: Option<String>, record: &WhatsAppRecord) -> String {
        flag.unwrap_or_else(|| record.instance.clone())
    }

    pub fn policy(&self) -> CredentialPolicy {
        CredentialPolicy::new(self.config.gateway.global_api_key.clone())
    }

    /// Key used for message sends on behalf of this role.
    pub fn message_key(&self, record: &WhatsAppRecord) -> String {
        self.policy()
            .resolve(self.role, OperationClass::MessageSend, &record.api_key)
            .to_string()
    }

    /// HTTP gateway. A base URL in the stored record wins over the config.
    pub fn gateway(&self, record: &WhatsAppRecord) -> Result<Arc<dyn Gateway>> {
        let mut gateway_config: GatewayConfig = self.config.gateway.clone();
        if !record.base_url.trim().is_empty() {
            gateway_config.base_url = record.base_url.clone();
        }
        let client = HttpGateway::from_config(&gateway_config)
            .context("failed to build gateway client")?;
        Ok(Arc::new(client))
    }

    pub fn session_manager(&self, record: &WhatsAppRecord) -> Result<SessionManager> {
        let store: Arc<dyn ConfigStore> = self.store.clone();
        Ok(SessionManager::builder(self.gateway(record)?)
            .policy(self.policy())
            .role(self.role)
            .instance_key(record.api_key.clone())
            .config(self.config.session.clone())
            .store(store)
            .build())
    }
}
