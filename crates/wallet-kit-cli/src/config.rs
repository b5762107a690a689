/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed wallet-kit CLI configuration
[POS]:    Configuration layer - manager and strategy setup
[UPDATE]: When adding new configuration options
*/

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use wallet_kit::http::DEFAULT_WAUTH_URL;
use wallet_kit::session::DEFAULT_RECONNECT_GRACE;
use wallet_kit::{AppInfo, GatewayConfig, ManagerConfig};

/// Top-level configuration for the wallet-kit CLI
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KitConfig {
    /// Identity shown by wallets in their connect prompt
    #[serde(default = "default_app")]
    pub app: AppInfo,
    /// Gateway handed to the extension on connect
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Where the session cache and WAuth tokens are kept
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default)]
    pub wauth: WAuthConfig,
    /// Grace period before probing a restoring OAuth session
    #[serde(default = "default_reconnect_grace_ms")]
    pub reconnect_grace_ms: u64,
    /// Permissions requested when `connect` gets none
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Hex private key enabling the Ethereum bridge strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_private_key: Option<String>,
    /// In-memory extension standing in for a browser wallet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo_extension: Option<DemoExtensionConfig>,
}

/// WAuth deployment settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WAuthConfig {
    #[serde(default = "default_wauth_url")]
    pub base_url: String,
    /// Redirect registered with the OAuth providers
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
}

impl Default for WAuthConfig {
    fn default() -> Self {
        Self {
            base_url: default_wauth_url(),
            redirect_url: default_redirect_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DemoExtensionConfig {
    pub address: String,
    pub public_key: String,
}

fn default_app() -> AppInfo {
    AppInfo {
        name: "wallet-kit".to_string(),
        logo: None,
    }
}

fn default_cache_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wallet-kit")
        .join("session.json")
}

fn default_wauth_url() -> String {
    DEFAULT_WAUTH_URL.to_string()
}

fn default_redirect_url() -> String {
    "http://localhost:8090/oauth-callback".to_string()
}

fn default_reconnect_grace_ms() -> u64 {
    DEFAULT_RECONNECT_GRACE.as_millis() as u64
}

impl Default for KitConfig {
    fn default() -> Self {
        Self {
            app: default_app(),
            gateway: GatewayConfig::default(),
            cache_path: default_cache_path(),
            wauth: WAuthConfig::default(),
            reconnect_grace_ms: default_reconnect_grace_ms(),
            permissions: Vec::new(),
            eth_private_key: None,
            demo_extension: None,
        }
    }
}

impl KitConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate().context("validate config")?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.app.name.trim().is_empty() {
            bail!("app.name must not be empty");
        }
        if let Some(key) = &self.eth_private_key {
            let digits = key.trim_start_matches("0x");
            if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                bail!("eth_private_key must be 32 hex-encoded bytes");
            }
        }
        Ok(())
    }

    /// Manager tuning derived from this file
    pub fn manager_config(&self) -> ManagerConfig {
        let mut config = ManagerConfig {
            reconnect_grace: Duration::from_millis(self.reconnect_grace_ms),
            ..ManagerConfig::default()
        };
        if !self.permissions.is_empty() {
            config.default_permissions = self.permissions.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: KitConfig = serde_yaml::from_str("{}").unwrap();
        config.validate().unwrap();

        assert_eq!(config.app.name, "wallet-kit");
        assert_eq!(config.wauth.base_url, DEFAULT_WAUTH_URL);
        assert_eq!(config.gateway.host, "arweave.net");
        assert!(config.cache_path.ends_with("wallet-kit/session.json"));
        assert_eq!(
            config.manager_config().reconnect_grace,
            DEFAULT_RECONNECT_GRACE
        );
    }

    #[test]
    fn test_permissions_override_manager_defaults() {
        let yaml = r#"
app:
  name: Permaweb Notes
reconnect_grace_ms: 50
permissions:
  - ACCESS_ADDRESS
  - SIGN_TRANSACTION
"#;
        let config: KitConfig = serde_yaml::from_str(yaml).unwrap();
        let manager = config.manager_config();
        assert_eq!(manager.reconnect_grace, Duration::from_millis(50));
        assert_eq!(
            manager.default_permissions,
            vec!["ACCESS_ADDRESS", "SIGN_TRANSACTION"]
        );
    }

    #[test]
    fn test_rejects_malformed_eth_key() {
        let config: KitConfig = serde_yaml::from_str("eth_private_key: 0x1234").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_blank_app_name() {
        let config: KitConfig = serde_yaml::from_str("app:\n  name: ' '").unwrap();
        assert!(config.validate().is_err());
    }
}
