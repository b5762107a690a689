/*
[INPUT]:  Wallet backend kinds, OAuth providers and optional operations
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - closed sets shared by strategies and the manager
[UPDATE]: When a backend kind, provider or optional operation is added
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Optional operation a strategy may offer on top of the base contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Encrypt,
    Decrypt,
    ArweaveConfig,
    Dispatch,
    SignDataItem,
    SignAns104,
    Signature,
    AddressEvents,
    Email,
    Username,
    ConnectedWallets,
    AuthData,
    AuthDataEvents,
    Reconnect,
    AoSigner,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Encrypt => "encrypt",
            Capability::Decrypt => "decrypt",
            Capability::ArweaveConfig => "arweave_config",
            Capability::Dispatch => "dispatch",
            Capability::SignDataItem => "sign_data_item",
            Capability::SignAns104 => "sign_ans104",
            Capability::Signature => "signature",
            Capability::AddressEvents => "address_events",
            Capability::Email => "email",
            Capability::Username => "username",
            Capability::ConnectedWallets => "connected_wallets",
            Capability::AuthData => "auth_data",
            Capability::AuthDataEvents => "auth_data_events",
            Capability::Reconnect => "reconnect",
            Capability::AoSigner => "ao_signer",
        }
    }

    /// Operations only OAuth-backed strategies provide
    pub const OAUTH: &'static [Capability] = &[
        Capability::Email,
        Capability::Username,
        Capability::ConnectedWallets,
        Capability::AuthData,
        Capability::AuthDataEvents,
        Capability::Reconnect,
        Capability::AoSigner,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth identity providers reachable through WAuth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WAuthProvider {
    Google,
    Github,
    Discord,
    X,
}

impl WAuthProvider {
    pub const ALL: [WAuthProvider; 4] = [
        WAuthProvider::Google,
        WAuthProvider::Github,
        WAuthProvider::Discord,
        WAuthProvider::X,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WAuthProvider::Google => "google",
            WAuthProvider::Github => "github",
            WAuthProvider::Discord => "discord",
            WAuthProvider::X => "x",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WAuthProvider::Google => "Google",
            WAuthProvider::Github => "GitHub",
            WAuthProvider::Discord => "Discord",
            WAuthProvider::X => "X",
        }
    }
}

impl fmt::Display for WAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WAuthProvider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(WAuthProvider::Google),
            "github" => Ok(WAuthProvider::Github),
            "discord" => Ok(WAuthProvider::Discord),
            "x" | "twitter" => Ok(WAuthProvider::X),
            other => Err(format!("unknown WAuth provider: {other}")),
        }
    }
}

/// Closed set of backend families a strategy belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "provider", rename_all = "snake_case")]
pub enum StrategyKind {
    NativeExtension,
    EthereumBridge,
    #[serde(rename = "oauth_provider")]
    OAuthProvider(WAuthProvider),
}

impl StrategyKind {
    pub fn is_oauth(&self) -> bool {
        matches!(self, StrategyKind::OAuthProvider(_))
    }
}

/// Coarse manager state derived from the live connection snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    NoStrategy,
    StrategySelected,
    Connected,
}
