//! Microsoft Graph resource clients
//!
//! Thin wrappers over the OneNote and OneDrive endpoints. Every call asks the
//! [`Authenticator`](crate::auth::Authenticator) for a bearer token first and
//! refuses to go on the wire without one.

pub mod onedrive;
pub mod onenote;

use crate::auth::Authenticator;
use crate::error::{LifelogError, Result};

pub(crate) const GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0";

/// Fetch a bearer token, or fail without touching the network
pub(crate) async fn bearer_token(auth: &Authenticator) -> Result<String> {
    auth.get_access_token()
        .await
        .ok_or(LifelogError::NotAuthenticated)
}

/// Map a non-success Graph response to an API error carrying the body
pub(crate) async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(LifelogError::api(status.as_u16(), message))
}
