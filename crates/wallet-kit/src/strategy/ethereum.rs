/*
[INPUT]:  Injected EIP-1193 style provider (accounts + personal_sign)
[OUTPUT]: Arweave-shaped address, owner key and signatures from an Ethereum wallet
[POS]:    Strategy layer - Ethereum bridge backend
[UPDATE]: When owner derivation, signing format or provider surface changes
*/

use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use alloy_primitives::{Address, Signature, eip191_hash_message};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::http::{Result, WalletError};
use crate::types::{
    Capability, CapabilitySet, DEFAULT_PERMISSIONS, DataItemRequest, SignatureOptions,
    SignedDataItem, StrategyKind, StrategyMetadata, Transaction, WalletNames, encode_b64url,
};

use super::contract::Strategy;
use super::signer::{RawSigner, SignerFn, SignerFuture, seal_data_item, signature_id};

pub const ETHEREUM_STRATEGY_ID: &str = "ethereum";

/// Message signed on connect to recover the account's public key
const OWNER_PROOF_MESSAGE: &[u8] = b"Connect this Ethereum account to Arweave";

/// Minimal Ethereum provider surface the bridge needs
#[async_trait]
pub trait EthereumProvider: Send + Sync {
    /// `eth_requestAccounts`
    async fn request_accounts(&self) -> Result<Vec<String>>;

    /// `personal_sign`; returns the 65-byte `[r, s, v]` signature
    async fn personal_sign(&self, account: &str, message: &[u8]) -> Result<Vec<u8>>;
}

/// Provider backed by a local secp256k1 key
pub struct LocalEthereumProvider {
    signer: PrivateKeySigner,
    address: String,
}

impl LocalEthereumProvider {
    /// Create a provider from a hex-encoded private key
    ///
    /// Supports both "0x"-prefixed and non-prefixed hex strings.
    pub fn new(private_key_hex: &str) -> Result<Self> {
        let private_key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);
        let signer = PrivateKeySigner::from_str(private_key_hex)
            .map_err(|e| WalletError::Config(format!("Invalid EVM private key: {}", e)))?;

        let address = signer.address().to_checksum(None);

        Ok(Self { signer, address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl EthereumProvider for LocalEthereumProvider {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        Ok(vec![self.address.clone()])
    }

    async fn personal_sign(&self, account: &str, message: &[u8]) -> Result<Vec<u8>> {
        if !account.eq_ignore_ascii_case(&self.address) {
            return Err(WalletError::backend(
                ETHEREUM_STRATEGY_ID,
                format!("unknown account {account}"),
            ));
        }

        let signature = self
            .signer
            .sign_message(message)
            .await
            .map_err(|e| WalletError::backend(ETHEREUM_STRATEGY_ID, e))?;

        // alloy's Signature as_bytes() returns [r, s, v]
        Ok(signature.as_bytes().to_vec())
    }
}

/// Account bound on connect
#[derive(Debug, Clone)]
struct BridgeSession {
    account: String,
    owner: Vec<u8>,
    address: String,
    permissions: Vec<String>,
}

/// Strategy exposing an Ethereum wallet with Arweave semantics
///
/// The owner is the uncompressed secp256k1 public key recovered from a
/// connect-time `personal_sign`; the Arweave address is
/// base64url(sha256(owner)).
pub struct EthereumBridgeStrategy {
    metadata: StrategyMetadata,
    provider: Option<Arc<dyn EthereumProvider>>,
    session: RwLock<Option<BridgeSession>>,
}

impl EthereumBridgeStrategy {
    pub fn new(provider: Option<Arc<dyn EthereumProvider>>) -> Self {
        Self {
            metadata: StrategyMetadata {
                id: ETHEREUM_STRATEGY_ID.to_string(),
                name: "Ethereum".to_string(),
                description: "Use an Ethereum wallet to sign Arweave transactions".to_string(),
                theme: "98, 126, 234".to_string(),
                logo: "assets/ethereum.svg".to_string(),
                url: "https://ethereum.org".to_string(),
                kind: StrategyKind::EthereumBridge,
            },
            provider,
            session: RwLock::new(None),
        }
    }

    fn provider(&self) -> Result<&Arc<dyn EthereumProvider>> {
        self.provider
            .as_ref()
            .ok_or_else(|| WalletError::Unavailable("no Ethereum provider injected".to_string()))
    }

    fn session(&self) -> Option<BridgeSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn require_session(&self) -> Result<BridgeSession> {
        self.session().ok_or_else(|| {
            WalletError::backend(ETHEREUM_STRATEGY_ID, "no Ethereum account connected")
        })
    }
}

/// Recover the uncompressed public key behind an EIP-191 signature and check it belongs to `account`
pub fn recover_owner(account: &str, message: &[u8], signature: &[u8]) -> Result<Vec<u8>> {
    let signature = Signature::try_from(signature).map_err(|e| {
        WalletError::InvalidResponse(format!("malformed personal_sign signature: {e}"))
    })?;
    let prehash = eip191_hash_message(message);
    let key = signature.recover_from_prehash(&prehash).map_err(|e| {
        WalletError::InvalidResponse(format!("cannot recover signer public key: {e}"))
    })?;

    let recovered = Address::from_public_key(&key);
    if !recovered.to_checksum(None).eq_ignore_ascii_case(account) {
        return Err(WalletError::InvalidResponse(format!(
            "signature was produced by {recovered}, expected {account}"
        )));
    }

    Ok(key.to_encoded_point(false).as_bytes().to_vec())
}

/// Arweave address for an owner key
pub fn owner_to_address(owner: &[u8]) -> String {
    encode_b64url(&Sha256::digest(owner))
}

#[async_trait]
impl Strategy for EthereumBridgeStrategy {
    fn metadata(&self) -> &StrategyMetadata {
        &self.metadata
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(&[Capability::SignDataItem, Capability::Signature])
    }

    async fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    async fn connect(&self, permissions: &[String]) -> Result<()> {
        let provider = self.provider()?;
        let accounts = provider.request_accounts().await?;
        let account = accounts.into_iter().next().ok_or_else(|| {
            WalletError::backend(ETHEREUM_STRATEGY_ID, "provider returned no accounts")
        })?;

        debug!(account = %account, "requesting owner proof signature");
        let proof = provider
            .personal_sign(&account, OWNER_PROOF_MESSAGE)
            .await?;
        let owner = recover_owner(&account, OWNER_PROOF_MESSAGE, &proof)?;
        let address = owner_to_address(&owner);

        let permissions = if permissions.is_empty() {
            DEFAULT_PERMISSIONS.iter().map(|p| p.to_string()).collect()
        } else {
            permissions.to_vec()
        };

        info!(account = %account, address = %address, "ethereum account bridged");
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(BridgeSession {
            account,
            owner,
            address,
            permissions,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    async fn get_active_address(&self) -> Result<Option<String>> {
        Ok(self.session().map(|session| session.address))
    }

    async fn get_all_addresses(&self) -> Result<Vec<String>> {
        Ok(self.session().map(|session| session.address).into_iter().collect())
    }

    async fn get_active_public_key(&self) -> Result<String> {
        Ok(encode_b64url(&self.require_session()?.owner))
    }

    async fn sign(
        &self,
        mut transaction: Transaction,
        _options: Option<SignatureOptions>,
    ) -> Result<Transaction> {
        let session = self.require_session()?;
        transaction.owner = encode_b64url(&session.owner);

        let message = transaction.signature_message();
        let signature = self
            .provider()?
            .personal_sign(&session.account, &message)
            .await?;

        transaction.signature = encode_b64url(&signature);
        transaction.id = signature_id(&signature);
        Ok(transaction)
    }

    async fn get_permissions(&self) -> Result<Vec<String>> {
        Ok(self
            .session()
            .map(|session| session.permissions)
            .unwrap_or_default())
    }

    async fn get_wallet_names(&self) -> Result<WalletNames> {
        Ok(self
            .session()
            .map(|session| {
                WalletNames::from([(session.address, format!("Ethereum {}", session.account))])
            })
            .unwrap_or_default())
    }

    fn raw_signer(&self) -> RawSigner {
        let (Some(provider), Some(session)) = (self.provider.clone(), self.session()) else {
            return RawSigner::Absent;
        };

        let signer: SignerFn = Arc::new(move |item: DataItemRequest| -> SignerFuture {
            let provider = provider.clone();
            let session = session.clone();
            Box::pin(async move {
                let signature = provider
                    .personal_sign(&session.account, &item.signing_payload())
                    .await?;
                seal_data_item(&session.owner, &signature, item)
            })
        });
        RawSigner::Function(signer)
    }

    async fn sign_data_item(&self, item: DataItemRequest) -> Result<SignedDataItem> {
        let session = self.require_session()?;
        let signature = self
            .provider()?
            .personal_sign(&session.account, &item.signing_payload())
            .await?;
        seal_data_item(&session.owner, &signature, item)
    }

    async fn signature(&self, data: &[u8]) -> Result<Vec<u8>> {
        let session = self.require_session()?;
        self.provider()?.personal_sign(&session.account, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A well-known test private key
    const PK: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn bridge() -> EthereumBridgeStrategy {
        let provider = LocalEthereumProvider::new(PK).unwrap();
        EthereumBridgeStrategy::new(Some(Arc::new(provider)))
    }

    #[test]
    fn test_local_provider_address() {
        let provider = LocalEthereumProvider::new(PK).unwrap();
        assert_eq!(provider.address(), "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

        let no_prefix = LocalEthereumProvider::new(&PK[2..]).unwrap();
        assert_eq!(no_prefix.address(), provider.address());

        assert!(LocalEthereumProvider::new("not-a-key").is_err());
    }

    #[tokio::test]
    async fn test_connect_derives_arweave_identity() {
        let strategy = bridge();
        assert_eq!(strategy.get_active_address().await.unwrap(), None);

        strategy.connect(&[]).await.unwrap();

        let address = strategy.get_active_address().await.unwrap().unwrap();
        assert_eq!(address.len(), 43);

        let owner = strategy.get_active_public_key().await.unwrap();
        assert_eq!(owner.len(), 87); // 65 bytes, base64url without padding
        assert_eq!(
            strategy.get_permissions().await.unwrap().len(),
            DEFAULT_PERMISSIONS.len()
        );
    }

    #[tokio::test]
    async fn test_sign_sets_owner_signature_and_id() {
        let strategy = bridge();
        strategy.connect(&["SIGN_TRANSACTION".to_string()]).await.unwrap();

        let signed = strategy
            .sign(Transaction::default(), None)
            .await
            .unwrap();
        assert!(signed.is_signed());
        assert_eq!(signed.owner, strategy.get_active_public_key().await.unwrap());
    }

    #[tokio::test]
    async fn test_raw_signer_absent_until_connected() {
        let strategy = bridge();
        assert!(strategy.raw_signer().is_absent());

        strategy.connect(&[]).await.unwrap();
        let RawSigner::Function(signer) = strategy.raw_signer() else {
            panic!("expected function signer");
        };
        let signed = signer(DataItemRequest::new(b"data".to_vec())).await.unwrap();
        assert_eq!(signed.id.len(), 43);
    }

    #[tokio::test]
    async fn test_disconnect_clears_session() {
        let strategy = bridge();
        strategy.connect(&[]).await.unwrap();
        strategy.disconnect().await.unwrap();

        assert_eq!(strategy.get_active_address().await.unwrap(), None);
        assert!(strategy.sign(Transaction::default(), None).await.is_err());
    }

    #[test]
    fn test_recover_owner_rejects_foreign_account() {
        let err = recover_owner(
            "0x0000000000000000000000000000000000000000",
            OWNER_PROOF_MESSAGE,
            &[0u8; 65],
        )
        .unwrap_err();
        assert!(matches!(err, WalletError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_without_provider_is_unavailable() {
        let strategy = EthereumBridgeStrategy::new(None);
        assert!(!strategy.is_available().await);
        assert!(matches!(
            strategy.connect(&[]).await.unwrap_err(),
            WalletError::Unavailable(_)
        ));
    }
}
