/*
[INPUT]:  Authenticated WAuth session, transactions and data items
[OUTPUT]: Custodial wallet info, signatures and linked external wallets
[POS]:    HTTP layer - wallet and connected-wallet endpoints (require auth)
[UPDATE]: When adding wallet endpoints or changing payload shapes
*/

// ### Wallet Endpoints

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::http::{Result, WAuthClient, WalletError};
use crate::strategy::WAuthWallet;
use crate::types::{
    ConnectedWallet, DataItemRequest, SignatureOptions, SignedDataItem, Transaction,
    encode_b64url,
};

const CONNECTED_WALLETS: &str = "/api/collections/connected_wallets/records";

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    transaction: &'a Transaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a SignatureOptions>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SignaturePayload {
    data: String,
}

#[derive(Debug, Deserialize)]
struct SignatureResponse {
    signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewConnectedWallet<'a> {
    address: &'a str,
    public_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy: Option<&'a str>,
}

/// Paginated record list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound = "T: DeserializeOwned")]
struct RecordList<T> {
    #[serde(default)]
    items: Vec<T>,
}

impl WAuthClient {
    /// Wallet of the signed-in account; `None` if it has not been created
    ///
    /// GET /api/wallet
    pub async fn get_wallet(&self) -> Result<Option<WAuthWallet>> {
        let builder = self.authed_request(Method::GET, "/api/wallet")?;
        match self.send_json(builder).await {
            Ok(wallet) => Ok(Some(wallet)),
            Err(WalletError::Api { code, .. }) if code == StatusCode::NOT_FOUND.as_u16() as i32 => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// POST /api/wallet/sign
    pub async fn sign_transaction(
        &self,
        transaction: &Transaction,
        options: Option<&SignatureOptions>,
    ) -> Result<Transaction> {
        let builder = self
            .authed_request(Method::POST, "/api/wallet/sign")?
            .json(&SignRequest {
                transaction,
                options,
            });
        self.send_json(builder).await
    }

    /// POST /api/wallet/sign-data-item
    pub async fn sign_data_item(&self, item: &DataItemRequest) -> Result<SignedDataItem> {
        let builder = self
            .authed_request(Method::POST, "/api/wallet/sign-data-item")?
            .json(item);
        self.send_json(builder).await
    }

    /// Raw signature over arbitrary bytes
    ///
    /// POST /api/wallet/signature
    pub async fn signature(&self, data: &[u8]) -> Result<Vec<u8>> {
        let builder = self
            .authed_request(Method::POST, "/api/wallet/signature")?
            .json(&SignaturePayload {
                data: encode_b64url(data),
            });
        let response: SignatureResponse = self.send_json(builder).await?;

        URL_SAFE_NO_PAD
            .decode(response.signature.trim_end_matches('='))
            .map_err(|e| WalletError::InvalidResponse(format!("signature is not base64url: {e}")))
    }

    /// GET /api/collections/connected_wallets/records
    pub async fn list_connected_wallets(&self) -> Result<Vec<ConnectedWallet>> {
        let builder = self.authed_request(Method::GET, CONNECTED_WALLETS)?;
        let list: RecordList<ConnectedWallet> = self.send_json(builder).await?;
        Ok(list.items)
    }

    /// POST /api/collections/connected_wallets/records
    pub async fn create_connected_wallet(
        &self,
        address: &str,
        public_key: &str,
        strategy: Option<&str>,
    ) -> Result<ConnectedWallet> {
        let builder = self
            .authed_request(Method::POST, CONNECTED_WALLETS)?
            .json(&NewConnectedWallet {
                address,
                public_key,
                strategy,
            });
        self.send_json(builder).await
    }

    /// DELETE /api/collections/connected_wallets/records/{id}
    pub async fn delete_connected_wallet(&self, wallet_id: &str) -> Result<()> {
        let endpoint = format!("{CONNECTED_WALLETS}/{wallet_id}");
        let builder = self.authed_request(Method::DELETE, &endpoint)?;
        self.send_empty(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_list_of_connected_wallets() {
        let list: RecordList<ConnectedWallet> = serde_json::from_str(
            r#"{"page":1,"items":[{"id":"rec1","address":"a","publicKey":"pk"}]}"#,
        )
        .unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].public_key, "pk");
        assert_eq!(list.items[0].strategy, None);

        let empty: RecordList<ConnectedWallet> = serde_json::from_str(r#"{"page":1}"#).unwrap();
        assert!(empty.items.is_empty());
    }
}
