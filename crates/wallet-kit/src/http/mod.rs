/*
[INPUT]:  HTTP client configuration and WAuth API endpoints
[OUTPUT]: HTTP responses, typed WAuth results and the crate error type
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod auth;
pub mod backend;
pub mod client;
pub mod error;
pub mod wallet;

pub use error::{Result, WalletError};

pub use auth::{AuthResponse, OAuthProviderInfo, UserRecord};
pub use backend::{HttpWAuthBackend, StoredToken, token_key};
pub use client::{ClientConfig, DEFAULT_WAUTH_URL, WAuthClient};
