/*
[INPUT]:  Backend-native signing handles (injected wallet objects or signer closures)
[OUTPUT]: One callable data-item signer, plus the envelope format for locally signed items
[POS]:    Strategy layer - raw signer normalization
[UPDATE]: When a backend exposes a new signer shape or the envelope format changes
*/

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::http::Result;
use crate::types::{DataItemRequest, SignedDataItem, Tag, encode_b64url};

use super::native::InjectedWallet;

/// Future returned by a [`SignerFn`]
pub type SignerFuture = BoxFuture<'static, Result<SignedDataItem>>;

/// Ready-made data-item signer
pub type SignerFn = Arc<dyn Fn(DataItemRequest) -> SignerFuture + Send + Sync>;

/// Signing handle as exposed by a strategy, before normalization
#[derive(Clone)]
pub enum RawSigner {
    /// Injected extension object that must be wrapped before use
    Object(Arc<dyn InjectedWallet>),
    /// Function that can be called as-is
    Function(SignerFn),
    Absent,
}

impl RawSigner {
    pub fn is_absent(&self) -> bool {
        matches!(self, RawSigner::Absent)
    }
}

impl fmt::Debug for RawSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawSigner::Object(wallet) => write!(f, "RawSigner::Object({})", wallet.wallet_name()),
            RawSigner::Function(_) => f.write_str("RawSigner::Function"),
            RawSigner::Absent => f.write_str("RawSigner::Absent"),
        }
    }
}

/// Normalize any raw signer into a single callable form
///
/// Objects are wrapped through their `sign_data_item`, functions pass through
/// untouched, and an absent signer yields `None`.
pub fn normalize_signer(raw: RawSigner) -> Option<SignerFn> {
    match raw {
        RawSigner::Object(wallet) => {
            let signer: SignerFn = Arc::new(move |item: DataItemRequest| -> SignerFuture {
                let wallet = wallet.clone();
                Box::pin(async move { wallet.sign_data_item(item).await })
            });
            Some(signer)
        }
        RawSigner::Function(signer) => Some(signer),
        RawSigner::Absent => None,
    }
}

/// Serialized form of a data item signed outside an extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItemEnvelope {
    pub owner: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    pub tags: Vec<Tag>,
    pub data: String,
}

/// Id of a signed item: base64url(sha256(signature))
pub fn signature_id(signature: &[u8]) -> String {
    encode_b64url(&Sha256::digest(signature))
}

/// Wrap an item and the signature over its [`DataItemRequest::signing_payload`]
pub fn seal_data_item(
    owner: &[u8],
    signature: &[u8],
    item: DataItemRequest,
) -> Result<SignedDataItem> {
    let envelope = DataItemEnvelope {
        owner: encode_b64url(owner),
        signature: encode_b64url(signature),
        target: item.target,
        anchor: item.anchor,
        tags: item.tags,
        data: encode_b64url(&item.data),
    };

    Ok(SignedDataItem {
        id: signature_id(signature),
        raw: serde_json::to_vec(&envelope)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::native::MockInjectedWallet;

    #[tokio::test]
    async fn test_object_signer_is_wrapped() {
        let wallet = Arc::new(MockInjectedWallet::new("addr-1", "pk-1"));
        let signer = normalize_signer(RawSigner::Object(wallet.clone())).expect("signer");

        let signed = signer(DataItemRequest::new(b"payload".to_vec())).await.unwrap();
        assert_eq!(signed.raw, b"payload".to_vec());
        assert_eq!(wallet.calls("sign_data_item"), 1);
    }

    #[tokio::test]
    async fn test_function_signer_passes_through() {
        let original: SignerFn = Arc::new(|item: DataItemRequest| -> SignerFuture {
            Box::pin(async move {
                Ok(SignedDataItem {
                    id: "fixed".to_string(),
                    raw: item.data,
                })
            })
        });

        let normalized = normalize_signer(RawSigner::Function(original.clone())).unwrap();
        assert!(Arc::ptr_eq(&original, &normalized));

        let signed = normalized(DataItemRequest::new(b"x".to_vec())).await.unwrap();
        assert_eq!(signed.id, "fixed");
    }

    #[test]
    fn test_absent_signer() {
        assert!(normalize_signer(RawSigner::Absent).is_none());
        assert!(RawSigner::Absent.is_absent());
    }

    #[test]
    fn test_seal_data_item() {
        let item = DataItemRequest::new(b"hi".to_vec()).with_tag("App-Name", "kit");
        let signed = seal_data_item(&[4u8; 65], &[7u8; 65], item).unwrap();

        assert_eq!(signed.id, signature_id(&[7u8; 65]));
        let envelope: DataItemEnvelope = serde_json::from_slice(&signed.raw).unwrap();
        assert_eq!(envelope.data, "aGk");
        assert_eq!(envelope.tags[0].value, "kit");
        assert!(envelope.target.is_none());
    }
}
