//! Microsoft account authentication
//!
//! Implements the OAuth 2.0 authorization-code flow against the Microsoft
//! identity platform, plus the token lifecycle around it. The flow:
//!
//! 1. Build the authorization URL and open it in the user's browser
//! 2. Wait for the provider to redirect the browser to the local callback
//!    listener and capture the authorization code
//! 3. Exchange the code for an access/refresh token pair
//! 4. Persist the full token payload to the cache file
//! 5. Serve later calls silently from the cache, refreshing on expiry
//!
//! # Example
//!
//! ```no_run
//! use lifelog::auth::{Authenticator, ClientIdentity};
//!
//! #[tokio::main]
//! async fn main() {
//!     let auth = Authenticator::new(ClientIdentity {
//!         client_id: "app-id".to_string(),
//!         client_secret: "app-secret".to_string(),
//!         redirect_uri: "http://localhost:8000/callback".to_string(),
//!         scopes: vec!["offline_access".to_string(), "Notes.Create".to_string()],
//!     });
//!
//!     // Interactive sign-in (browser round trip), once
//!     if auth.authenticate().await {
//!         // Silent from here on
//!         let token = auth.get_access_token().await;
//!         println!("token available: {}", token.is_some());
//!     }
//! }
//! ```
//!
//! # Token cache
//!
//! The token record is cached on disk (platform config directory by default)
//! with owner-only permissions, and is the only persisted state of this
//! module. See [`TokenCache`] to customize the location.

mod listener;
mod oauth;
mod token;

pub use listener::{CallbackListener, CallbackResult};
pub use oauth::{
    AuthError, AuthResult, Authenticator, AuthenticatorBuilder, ClientIdentity,
    ProviderEndpoints, TokenExchanger, build_auth_url,
};
pub use token::{CacheError, TokenCache, TokenPayload, TokenRecord};
