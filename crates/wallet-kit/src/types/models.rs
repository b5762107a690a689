/*
[INPUT]:  Arweave transaction/data item shapes and wallet metadata
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - payloads exchanged with wallet backends
[UPDATE]: When a backend payload changes or new metadata is exposed
*/

use std::collections::{BTreeSet, HashMap};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::enums::{Capability, StrategyKind};

/// Permissions requested on connect when the caller does not specify any
pub const DEFAULT_PERMISSIONS: &[&str] = &[
    "ACCESS_ADDRESS",
    "ACCESS_PUBLIC_KEY",
    "ACCESS_ALL_ADDRESSES",
    "SIGN_TRANSACTION",
    "DISPATCH",
    "SIGNATURE",
    "ACCESS_ARWEAVE_CONFIG",
];

/// Address -> human readable wallet label
pub type WalletNames = HashMap<String, String>;

/// Arweave tag, both halves base64url encoded on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Arweave transaction in its JSON form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default = "default_format")]
    pub format: u8,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub last_tx: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub target: String,
    #[serde(default = "default_zero")]
    pub quantity: String,
    #[serde(default)]
    pub data: String,
    #[serde(default = "default_zero")]
    pub data_size: String,
    #[serde(default)]
    pub data_root: String,
    #[serde(default = "default_zero")]
    pub reward: String,
    #[serde(default)]
    pub signature: String,
}

fn default_format() -> u8 {
    2
}

fn default_zero() -> String {
    "0".to_string()
}

impl Transaction {
    /// Digest over every field covered by the signature
    pub fn signature_message(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update([self.format]);
        for field in [
            &self.owner,
            &self.target,
            &self.quantity,
            &self.reward,
            &self.last_tx,
            &self.data_size,
            &self.data_root,
        ] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        for tag in &self.tags {
            hasher.update(tag.name.as_bytes());
            hasher.update([0]);
            hasher.update(tag.value.as_bytes());
            hasher.update([0]);
        }
        hasher.finalize().into()
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty() && !self.id.is_empty()
    }
}

/// Options forwarded to the wallet when signing a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt_length: Option<u32>,
}

/// Unsigned data item handed to a signer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItemRequest {
    #[serde(with = "b64url")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

impl DataItemRequest {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(name, value));
        self
    }

    /// Digest the signer commits to
    pub fn signing_payload(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.target.as_deref().unwrap_or_default().as_bytes());
        hasher.update([0]);
        hasher.update(self.anchor.as_deref().unwrap_or_default().as_bytes());
        hasher.update([0]);
        for tag in &self.tags {
            hasher.update(tag.name.as_bytes());
            hasher.update([0]);
            hasher.update(tag.value.as_bytes());
            hasher.update([0]);
        }
        hasher.update(Sha256::digest(&self.data));
        hasher.finalize().into()
    }
}

/// Signed data item as returned by any signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDataItem {
    pub id: String,
    #[serde(with = "b64url")]
    pub raw: Vec<u8>,
}

/// Gateway a wallet talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub protocol: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "arweave.net".to_string(),
            port: 443,
            protocol: "https".to_string(),
        }
    }
}

/// Application identity shown by wallets in their connect prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

/// Result of a wallet-side dispatch (bundled upload or direct post)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Parameters for wallet-side encryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionOptions {
    pub algorithm: String,
    pub hash: String,
}

impl Default for EncryptionOptions {
    fn default() -> Self {
        Self {
            algorithm: "RSA-OAEP".to_string(),
            hash: "SHA-256".to_string(),
        }
    }
}

/// Display metadata for a strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    pub theme: String,
    pub logo: String,
    pub url: String,
    pub kind: StrategyKind,
}

/// External wallet linked to an OAuth account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedWallet {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// OAuth session data exposed by custodial backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub provider: String,
}

/// Static descriptor of the optional operations a strategy offers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new(capabilities: &[Capability]) -> Self {
        Self(capabilities.iter().copied().collect())
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

mod b64url {
    use super::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD
            .decode(raw.trim_end_matches('='))
            .map_err(serde::de::Error::custom)
    }
}

/// Base64url without padding, the encoding Arweave uses everywhere
pub fn encode_b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_defaults_from_partial_json() {
        let tx: Transaction = serde_json::from_str(r#"{"target":"abc","quantity":"10"}"#).unwrap();
        assert_eq!(tx.format, 2);
        assert_eq!(tx.reward, "0");
        assert_eq!(tx.quantity, "10");
        assert!(!tx.is_signed());
    }

    #[test]
    fn test_signature_message_covers_owner_and_tags() {
        let base = Transaction {
            owner: "owner-a".into(),
            ..Default::default()
        };
        let other_owner = Transaction {
            owner: "owner-b".into(),
            ..Default::default()
        };
        let tagged = Transaction {
            owner: "owner-a".into(),
            tags: vec![Tag::new("App-Name", "kit")],
            ..Default::default()
        };

        assert_ne!(base.signature_message(), other_owner.signature_message());
        assert_ne!(base.signature_message(), tagged.signature_message());
        // signature and id are outputs, not inputs
        let mut signed = base.clone();
        signed.signature = "sig".into();
        signed.id = "id".into();
        assert_eq!(base.signature_message(), signed.signature_message());
    }

    #[test]
    fn test_data_item_request_wire_format() {
        let item = DataItemRequest::new(b"hello".to_vec()).with_tag("Content-Type", "text/plain");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["data"], "aGVsbG8");
        assert_eq!(json["tags"][0]["name"], "Content-Type");
        assert!(json.get("target").is_none());

        let back: DataItemRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_capability_set() {
        let set = CapabilitySet::new(&[Capability::Signature, Capability::Encrypt]);
        assert!(set.contains(Capability::Signature));
        assert!(!set.contains(Capability::SignDataItem));
        assert_eq!(set.len(), 2);
        assert!(CapabilitySet::default().is_empty());
    }
}
