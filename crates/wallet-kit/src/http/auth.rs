/*
[INPUT]:  OAuth2 authorization codes and a stored auth token
[OUTPUT]: WAuth user sessions (token + user record)
[POS]:    HTTP layer - authentication endpoints
[UPDATE]: When the WAuth auth collection or payload shapes change
*/

// ### Auth Endpoints

use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

use crate::http::{Result, WAuthClient, WalletError};
use crate::strategy::AuthorizationCode;
use crate::types::{AuthData, WAuthProvider};

/// OAuth2 provider entry of the auth-methods listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthProviderInfo {
    pub name: String,
    pub state: String,
    #[serde(rename = "authURL", alias = "authUrl")]
    pub auth_url: String,
    pub code_verifier: String,
    #[serde(default)]
    pub code_challenge: String,
}

impl OAuthProviderInfo {
    /// Authorization URL with the redirect appended, ready to open in a browser
    pub fn authorize_url(&self, redirect_url: &str) -> String {
        format!("{}{}", self.auth_url, redirect_url)
    }

    /// Turn the URL the provider redirected to into an authorization code
    pub fn complete(&self, redirected_to: &str, redirect_url: &str) -> Result<AuthorizationCode> {
        let url = Url::parse(redirected_to.trim())?;
        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => {
                    return Err(WalletError::backend(
                        format!("wauth-{}", self.name),
                        format!("authorization denied: {value}"),
                    ));
                }
                _ => {}
            }
        }

        if state.as_deref() != Some(self.state.as_str()) {
            return Err(WalletError::InvalidResponse(
                "OAuth2 state mismatch".to_string(),
            ));
        }
        let code = code.ok_or_else(|| {
            WalletError::InvalidResponse("redirect carries no authorization code".to_string())
        })?;

        Ok(AuthorizationCode {
            code,
            code_verifier: self.code_verifier.clone(),
            redirect_url: redirect_url.to_string(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct OAuth2Methods {
    #[serde(default)]
    providers: Vec<OAuthProviderInfo>,
}

#[derive(Debug, Deserialize)]
struct AuthMethods {
    #[serde(default)]
    oauth2: OAuth2Methods,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OAuth2Request<'a> {
    provider: &'a str,
    code: &'a str,
    code_verifier: &'a str,
    #[serde(rename = "redirectURL")]
    redirect_url: &'a str,
}

/// User record of the auth collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Successful authentication
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub record: UserRecord,
}

impl AuthResponse {
    pub fn auth_data(&self, provider: WAuthProvider) -> AuthData {
        AuthData {
            user_id: self.record.id.clone(),
            email: self.record.email.clone().filter(|e| !e.is_empty()),
            username: self.record.username.clone().filter(|u| !u.is_empty()),
            provider: provider.as_str().to_string(),
        }
    }
}

impl WAuthClient {
    /// OAuth2 login parameters for a provider
    ///
    /// GET /api/collections/users/auth-methods
    pub async fn oauth_provider(&self, provider: WAuthProvider) -> Result<OAuthProviderInfo> {
        let builder = self.request(Method::GET, "/api/collections/users/auth-methods")?;
        let methods: AuthMethods = self.send_json(builder).await?;
        methods
            .oauth2
            .providers
            .into_iter()
            .find(|info| info.name == provider.as_str())
            .ok_or_else(|| {
                WalletError::Unavailable(format!("WAuth does not offer {provider} login"))
            })
    }

    /// Exchange an OAuth2 authorization code for a session
    ///
    /// POST /api/collections/users/auth-with-oauth2
    pub async fn auth_with_oauth2(
        &self,
        provider: WAuthProvider,
        code: &AuthorizationCode,
    ) -> Result<AuthResponse> {
        let request = OAuth2Request {
            provider: provider.as_str(),
            code: &code.code,
            code_verifier: &code.code_verifier,
            redirect_url: &code.redirect_url,
        };

        let builder = self
            .request(Method::POST, "/api/collections/users/auth-with-oauth2")?
            .json(&request);
        self.send_json(builder).await
    }

    /// Refresh the current token
    ///
    /// POST /api/collections/users/auth-refresh
    pub async fn auth_refresh(&self) -> Result<AuthResponse> {
        let builder = self.authed_request(Method::POST, "/api/collections/users/auth-refresh")?;
        self.send_json(builder).await
    }
}
