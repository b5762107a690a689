/*
[INPUT]:  WAuth auth-methods listing and the redirect URL pasted by the user
[OUTPUT]: OAuth2 authorization codes for HttpWAuthBackend
[POS]:    CLI layer - terminal stand-in for the browser popup flow
[UPDATE]: When the OAuth handoff or prompts change
*/

use async_trait::async_trait;
use console::style;
use dialoguer::{Input, theme::ColorfulTheme};
use tracing::debug;
use wallet_kit::strategy::{AuthorizationCode, wauth_strategy_id};
use wallet_kit::{OAuthAuthorizer, Result, WAuthClient, WAuthProvider, WalletError};

/// Prints the provider login URL and reads back the redirect
pub struct TerminalAuthorizer {
    client: WAuthClient,
    redirect_url: String,
}

impl TerminalAuthorizer {
    pub fn new(client: WAuthClient, redirect_url: impl Into<String>) -> Self {
        Self {
            client,
            redirect_url: redirect_url.into(),
        }
    }
}

#[async_trait]
impl OAuthAuthorizer for TerminalAuthorizer {
    async fn authorize(&self, provider: WAuthProvider) -> Result<AuthorizationCode> {
        let info = self.client.oauth_provider(provider).await?;
        debug!(provider = %provider, state = %info.state, "oauth login started");

        println!(
            "\n{} {}",
            style("Sign in with").bold(),
            style(provider).bold().cyan()
        );
        println!("Open this URL in a browser:\n  {}", info.authorize_url(&self.redirect_url));

        let redirected: String = tokio::task::spawn_blocking(|| {
            Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt("Paste the URL you were redirected to")
                .interact_text()
        })
        .await
        .map_err(|err| WalletError::backend(wauth_strategy_id(provider), err))?
        .map_err(|err| WalletError::backend(wauth_strategy_id(provider), err))?;

        info.complete(&redirected, &self.redirect_url)
    }
}
