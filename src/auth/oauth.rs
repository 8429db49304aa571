//! OAuth 2.0 authorization-code flow against the Microsoft identity platform

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::listener::{CallbackListener, CallbackResult};
use super::token::{TokenCache, TokenPayload, TokenRecord};

// Microsoft identity platform v2.0, common tenant
const DEFAULT_AUTHORIZE_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Port used when the redirect URI does not name one
const DEFAULT_CALLBACK_PORT: u16 = 8000;

/// How long the interactive flow waits for the browser redirect
const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors that can occur during authentication operations
#[derive(Debug, Error)]
pub enum AuthError {
    /// Client identity is incomplete; checked before any network activity
    #[error("client configuration incomplete: {0}")]
    ConfigInvalid(String),

    /// Local callback port unavailable; fatal for the current attempt
    #[error("could not bind callback listener on {addr}: {source}")]
    ListenerBind {
        /// Address the bind was attempted on
        addr: String,
        /// Underlying bind failure
        source: std::io::Error,
    },

    /// No callback arrived within the timeout window
    #[error("no authorization callback received within {0} seconds")]
    Timeout(u64),

    /// The browser redirect carried an error instead of a code
    #[error("authorization callback reported an error: {0}")]
    CallbackFailed(String),

    /// The provider rejected the authorization code. Codes are single-use:
    /// recovery means restarting the flow from the authorization URL.
    #[error("authorization code exchange rejected: {0}")]
    Exchange(String),

    /// The provider rejected the refresh token (revoked or expired)
    #[error("refresh token rejected: {0}")]
    Refresh(String),

    /// Token endpoint answered with something that is neither a token payload
    /// nor a provider error body
    #[error("invalid token endpoint response: {0}")]
    InvalidResponse(String),

    /// Transport-level failure talking to the token endpoint
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Browser could not be opened (non-fatal; the URL is printed as well)
    #[error("could not open browser: {0}")]
    BrowserOpen(String),
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Client identity registered with the provider.
///
/// Immutable for the lifetime of an [`Authenticator`]; supplied at
/// construction and owned exclusively by it.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    /// Application (client) id
    pub client_id: String,
    /// Client secret (confidential client flow, no PKCE)
    pub client_secret: String,
    /// Redirect URI the provider sends the browser back to
    pub redirect_uri: String,
    /// Requested scopes, space-joined on the wire
    pub scopes: Vec<String>,
}

impl ClientIdentity {
    fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }

    fn validate(&self) -> AuthResult<()> {
        if self.client_id.is_empty() {
            return Err(AuthError::ConfigInvalid("client_id is not set".to_string()));
        }
        if self.client_secret.is_empty() {
            return Err(AuthError::ConfigInvalid(
                "client_secret is not set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Provider authorize/token endpoint pair
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    /// Browser-facing authorization endpoint
    pub authorize_url: String,
    /// Server-to-server token endpoint
    pub token_url: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}

/// Build the provider authorization URL for `identity`.
///
/// Pure string construction: no side effects, no network. Every dynamic
/// segment is percent-encoded; the client secret never appears in the output.
#[must_use]
pub fn build_auth_url(endpoints: &ProviderEndpoints, identity: &ClientIdentity) -> String {
    let scope = identity.scope_param();
    let params = [
        ("client_id", identity.client_id.as_str()),
        ("response_type", "code"),
        ("redirect_uri", identity.redirect_uri.as_str()),
        ("scope", scope.as_str()),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={}", percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{query}", endpoints.authorize_url)
}

/// Error body the provider returns when it rejects a grant
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl ProviderErrorBody {
    fn message(self) -> String {
        self.error_description.unwrap_or(self.error)
    }
}

/// Client for the provider token endpoint.
///
/// Both grant exchanges are single attempts: authorization codes are
/// single-use, and refresh retries are deferred to the caller (interactive
/// re-authentication) rather than looped here.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
    token_url: String,
}

impl TokenExchanger {
    /// Create an exchanger for the given token endpoint
    #[must_use]
    pub fn new(token_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: token_url.into(),
        }
    }

    /// Redeem a single-use authorization code for a token payload.
    ///
    /// # Errors
    ///
    /// [`AuthError::Exchange`] when the provider rejects the code,
    /// [`AuthError::Http`]/[`AuthError::InvalidResponse`] on transport trouble.
    pub async fn exchange_code(
        &self,
        identity: &ClientIdentity,
        code: &str,
    ) -> AuthResult<TokenPayload> {
        let scope = identity.scope_param();
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", identity.redirect_uri.as_str()),
            ("client_id", identity.client_id.as_str()),
            ("client_secret", identity.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        self.post_form(&form, AuthError::Exchange).await
    }

    /// Trade a refresh token for a renewed access/refresh pair.
    ///
    /// # Errors
    ///
    /// [`AuthError::Refresh`] when the provider rejects the token (revoked or
    /// expired), [`AuthError::Http`]/[`AuthError::InvalidResponse`] otherwise.
    pub async fn exchange_refresh_token(
        &self,
        identity: &ClientIdentity,
        refresh_token: &str,
    ) -> AuthResult<TokenPayload> {
        let scope = identity.scope_param();
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", identity.client_id.as_str()),
            ("client_secret", identity.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        self.post_form(&form, AuthError::Refresh).await
    }

    async fn post_form(
        &self,
        form: &[(&str, &str)],
        reject: fn(String) -> AuthError,
    ) -> AuthResult<TokenPayload> {
        let response = self.http.post(&self.token_url).form(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Provider rejections carry an error body; check that before the
        // status, since some deployments report them with HTTP 200.
        if let Ok(error) = serde_json::from_str::<ProviderErrorBody>(&body) {
            return Err(reject(error.message()));
        }

        if !status.is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "token endpoint returned {status}"
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            AuthError::InvalidResponse(format!("could not parse token response: {e}"))
        })
    }
}

/// Builder for [`Authenticator`]
#[derive(Debug)]
pub struct AuthenticatorBuilder {
    identity: ClientIdentity,
    endpoints: ProviderEndpoints,
    cache: Option<TokenCache>,
    auto_open_browser: bool,
    callback_timeout: Duration,
}

impl AuthenticatorBuilder {
    fn new(identity: ClientIdentity) -> Self {
        Self {
            identity,
            endpoints: ProviderEndpoints::default(),
            cache: None,
            auto_open_browser: true,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }

    /// Set custom provider endpoints
    #[must_use]
    pub fn endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Set the token cache store to use
    #[must_use]
    pub fn cache(mut self, cache: TokenCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set whether to automatically open the browser (default: true)
    #[must_use]
    pub fn auto_open_browser(mut self, auto_open: bool) -> Self {
        self.auto_open_browser = auto_open;
        self
    }

    /// Set how long to wait for the sign-in callback (default: 120 s)
    #[must_use]
    pub fn callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Build the authenticator
    #[must_use]
    pub fn build(self) -> Authenticator {
        let exchanger = TokenExchanger::new(self.endpoints.token_url.clone());
        Authenticator {
            identity: self.identity,
            endpoints: self.endpoints,
            cache: self.cache.unwrap_or_default(),
            exchanger,
            auto_open_browser: self.auto_open_browser,
            callback_timeout: self.callback_timeout,
        }
    }
}

/// Authentication state machine for the Microsoft identity platform.
///
/// One instance owns one client identity and one persisted token record.
/// [`authenticate`](Self::authenticate) drives the interactive flow;
/// [`get_access_token`](Self::get_access_token) is the silent waterfall every
/// downstream API call goes through.
///
/// Operations run to completion on the calling task and are not safe to
/// invoke concurrently against one instance: the cache file is read and then
/// written without locking.
#[derive(Debug)]
pub struct Authenticator {
    identity: ClientIdentity,
    endpoints: ProviderEndpoints,
    cache: TokenCache,
    exchanger: TokenExchanger,
    auto_open_browser: bool,
    callback_timeout: Duration,
}

impl Authenticator {
    /// Create an authenticator with default endpoints and cache location
    #[must_use]
    pub fn new(identity: ClientIdentity) -> Self {
        Self::builder(identity).build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder(identity: ClientIdentity) -> AuthenticatorBuilder {
        AuthenticatorBuilder::new(identity)
    }

    /// The token cache this authenticator persists to
    #[must_use]
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// The URL the user signs in at. No state change.
    #[must_use]
    pub fn get_auth_url(&self) -> String {
        build_auth_url(&self.endpoints, &self.identity)
    }

    /// Run the full interactive flow: print and open the authorization URL,
    /// wait once for the browser callback, exchange the code, persist the
    /// token record.
    ///
    /// Returns `true` on success. Failures are reported through diagnostics
    /// (stderr and logs) rather than an error value, so CLI-style callers
    /// only deal with a yes/no outcome.
    pub async fn authenticate(&self) -> bool {
        match self.run_interactive().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("authentication failed: {e}");
                eprintln!("Authentication failed: {e}");
                false
            }
        }
    }

    async fn run_interactive(&self) -> AuthResult<()> {
        self.identity.validate()?;

        let auth_url = self.get_auth_url();
        println!("\nOpen the following URL in your browser to sign in:");
        println!("\n  {auth_url}\n");

        if self.auto_open_browser {
            match open_browser(&auth_url) {
                Ok(()) => println!("(Opened the sign-in page in your default browser.)"),
                Err(e) => {
                    tracing::debug!("could not open browser: {e}");
                    println!("(Could not open a browser automatically - please open the URL manually.)");
                }
            }
        }

        let (host, port) = callback_bind_addr(&self.identity.redirect_uri);
        let listener = CallbackListener::bind(&host, port).await?;
        println!("Waiting for the sign-in callback on port {port}...");

        let code = match listener.recv(self.callback_timeout).await {
            CallbackResult {
                code: Some(code), ..
            } => code,
            CallbackResult {
                error: Some(error), ..
            } => return Err(AuthError::CallbackFailed(error)),
            CallbackResult { .. } => {
                return Err(AuthError::Timeout(self.callback_timeout.as_secs()));
            }
        };

        let payload = self.exchanger.exchange_code(&self.identity, &code).await?;
        self.persist(TokenRecord::from_payload(payload));

        println!(
            "Authentication successful. Token cached at {}",
            self.cache.path().display()
        );
        Ok(())
    }

    /// Best non-interactive path to a usable access token.
    ///
    /// Waterfall, cheapest first: a cached unexpired token is returned with no
    /// network traffic at all; otherwise a cached refresh token is exchanged
    /// once; otherwise `None`. A `None` means "re-authentication required" -
    /// the interactive flow is never started from here, since the caller may
    /// have no browser context. Refresh failures are logged, never raised, and
    /// leave the stale cache file in place.
    pub async fn get_access_token(&self) -> Option<String> {
        if let Err(e) = self.identity.validate() {
            tracing::warn!("{e}");
            return None;
        }

        let Some(record) = self.cache.load() else {
            tracing::debug!("no cached token record");
            return None;
        };

        if !record.is_expired() {
            tracing::debug!("using cached access token");
            return Some(record.payload.access_token.clone());
        }

        let Some(refresh_token) = record.payload.refresh_token.clone() else {
            tracing::debug!("cached token expired and no refresh token available");
            return None;
        };

        match self
            .exchanger
            .exchange_refresh_token(&self.identity, &refresh_token)
            .await
        {
            Ok(mut payload) => {
                // Providers may omit the refresh token on renewal. Losing it
                // would force an interactive round at the next expiry, so the
                // old one is carried forward.
                if payload.refresh_token.is_none() {
                    payload.refresh_token = Some(refresh_token);
                }
                let renewed = TokenRecord::from_payload(payload);
                let token = renewed.payload.access_token.clone();
                self.persist(renewed);
                tracing::debug!("access token renewed via refresh token");
                Some(token)
            }
            Err(e) => {
                tracing::warn!("token refresh failed, re-authentication required: {e}");
                None
            }
        }
    }

    /// Whether a usable access token is currently obtainable.
    ///
    /// Not a pure query: this goes through
    /// [`get_access_token`](Self::get_access_token) and may refresh (and
    /// persist) as a side effect.
    pub async fn is_authenticated(&self) -> bool {
        self.get_access_token().await.is_some()
    }

    fn persist(&self, record: TokenRecord) {
        // Losing persistence degrades future sessions, not this one.
        if let Err(e) = self.cache.save(&record) {
            tracing::warn!("could not persist token cache: {e}");
        }
    }
}

/// Derive the listener bind address from the redirect URI
fn callback_bind_addr(redirect_uri: &str) -> (String, u16) {
    match reqwest::Url::parse(redirect_uri) {
        Ok(url) => {
            let host = url.host_str().unwrap_or("localhost").to_string();
            let port = url.port().unwrap_or(DEFAULT_CALLBACK_PORT);
            (host, port)
        }
        Err(_) => ("localhost".to_string(), DEFAULT_CALLBACK_PORT),
    }
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> AuthResult<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .map_err(|e| AuthError::BrowserOpen(e.to_string()))?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .map_err(|e| AuthError::BrowserOpen(e.to_string()))?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()
            .map_err(|e| AuthError::BrowserOpen(e.to_string()))?;
    }

    Ok(())
}

/// Percent-encode a string for URL query parameters.
/// Preserves unreserved characters per RFC 3986.
fn percent_encode(s: &str) -> String {
    use std::fmt::Write;
    let mut result = String::with_capacity(s.len() * 3);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                write!(result, "%{byte:02X}").unwrap();
            }
        }
    }
    result
}
