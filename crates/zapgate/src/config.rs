use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

// ============================================================================
// Config (root)
// ============================================================================

/// Deployment configuration, loaded once and passed explicitly to the
/// components that need it.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub signature: SignatureConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,
}

impl Config {
    /// Load from a YAML file. A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Self::parse(&contents)
    }

    /// Parse YAML contents after environment expansion.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        if expanded.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_saphyr::from_str(&expanded)?)
    }

    /// Location of the stored connection record.
    ///
    /// Relative paths are resolved against the config file directory.
    pub fn store_path(&self, config_path: &Path) -> PathBuf {
        match &self.store.path {
            Some(path) => resolve_path(config_path, path),
            None => default_store_path(),
        }
    }
}

/// Resolve a path relative to the config file directory.
///
/// Absolute paths are returned as-is.
pub fn resolve_path(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    config_dir.join(path)
}

// ============================================================================
// Defaults
// ============================================================================

/// Default state directory (under `$HOME`).
pub const DEFAULT_STATE_DIR: &str = ".zapgate";
/// Default stored connection record file name.
pub const DEFAULT_STORE_FILE: &str = "whatsapp.json";

fn default_store_path() -> PathBuf {
    let home = match std::env::var("HOME") {
        Ok(h) => h,
        Err(_) => {
            tracing::warn!("HOME not set, using /tmp for the connection record");
            "/tmp".to_string()
        }
    };
    PathBuf::from(home)
        .join(DEFAULT_STATE_DIR)
        .join(DEFAULT_STORE_FILE)
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_qr_timeout() -> u64 {
    60
}

fn default_restart_recheck_delay() -> u64 {
    3000
}

fn default_country_code() -> String {
    "55".to_string()
}

fn default_signature_delay() -> u64 {
    1200
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supported syntax:
/// - `${VAR}` - required, errors if not set
/// - `${VAR:-default}` - optional with default
/// - `$$` - literal `$`
///
/// A `$` not followed by `{` or `$` is kept as-is. Defaults are not expanded
/// recursively.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(stripped) = after.strip_prefix('$') {
            result.push('$');
            rest = stripped;
        } else if let Some(body) = after.strip_prefix('{') {
            let end = body.find('}').ok_or(ConfigError::UnclosedVarReference)?;
            result.push_str(&lookup_var(&body[..end])?);
            rest = &body[end + 1..];
        } else {
            result.push('$');
            rest = after;
        }
    }

    result.push_str(rest);
    Ok(result)
}

/// Resolve the inside of a `${...}` reference.
fn lookup_var(reference: &str) -> Result<String, ConfigError> {
    let (name, default) = match reference.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (reference, None),
    };

    match (std::env::var(name), default) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_string()),
        (Err(_), None) => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

// ============================================================================
// GatewayConfig
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Deployment-wide key for administrative session management.
    #[serde(default)]
    pub global_api_key: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            global_api_key: String::new(),
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

// ============================================================================
// SessionConfig
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Seconds a QR code stays valid before the session moves to `error`.
    #[serde(default = "default_qr_timeout")]
    pub qr_timeout_seconds: u64,
    /// Delay before the follow-up status probe after a restart.
    #[serde(default = "default_restart_recheck_delay")]
    pub restart_recheck_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            qr_timeout_seconds: default_qr_timeout(),
            restart_recheck_delay_ms: default_restart_recheck_delay(),
        }
    }
}

// ============================================================================
// DispatchConfig
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Prefix added to bare numbers that do not already carry it.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
    #[serde(default)]
    pub default_delay_ms: u64,
    #[serde(default)]
    pub link_preview: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_country_code: default_country_code(),
            default_delay_ms: 0,
            link_preview: false,
        }
    }
}

// ============================================================================
// StoreConfig
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// ============================================================================
// SignatureConfig
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SignatureConfig {
    /// Public URL serving the contract signing page.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_signature_delay")]
    pub delay_ms: u64,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            delay_ms: default_signature_delay(),
        }
    }
}
