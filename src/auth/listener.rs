//! Single-shot HTTP listener for the OAuth redirect callback

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::oauth::{AuthError, AuthResult};

const SUCCESS_PAGE: &str = "<html><body><h1>Authentication successful!</h1>\
<p>You can close this window now.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h1>Authentication failed!</h1>\
<p>You can close this window and retry from the terminal.</p></body></html>";

/// Outcome of one redirect delivery.
///
/// Both fields absent means the wait timed out before any request arrived.
/// Lives only for the duration of one interactive authentication attempt.
#[derive(Debug, Default, Clone)]
pub struct CallbackResult {
    /// The `code` query parameter, when the provider delivered one
    pub code: Option<String>,
    /// The `error` query parameter, or a description of a malformed delivery
    pub error: Option<String>,
}

/// Listener bound to the redirect URI's host and port, waiting for the
/// browser to deliver the authorization code.
///
/// This is deliberately not a web server: it accepts exactly one request,
/// answers it with a minimal HTML page, and is consumed. Duplicate redirect
/// deliveries after the first are never observed.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
}

impl CallbackListener {
    /// Bind the listener.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ListenerBind`] when the port is unavailable. That
    /// is fatal for the current authentication attempt; callers do not retry.
    pub async fn bind(host: &str, port: u16) -> AuthResult<Self> {
        let addr = format!("{host}:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| AuthError::ListenerBind { addr, source })?;
        Ok(Self { listener })
    }

    /// The address the listener actually bound (useful with port 0)
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Wait for the browser redirect, serving exactly one request.
    ///
    /// Consumes the listener. A timeout (including `Duration::ZERO`) yields an
    /// empty result rather than an error; the orchestrator maps that to its
    /// own timeout failure.
    pub async fn recv(self, timeout: Duration) -> CallbackResult {
        match tokio::time::timeout(timeout, serve_one(self.listener)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("no callback within {}s, giving up", timeout.as_secs());
                CallbackResult::default()
            }
        }
    }
}

async fn serve_one(listener: TcpListener) -> CallbackResult {
    let (stream, _) = match listener.accept().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!("callback accept failed: {e}");
            return CallbackResult {
                code: None,
                error: Some(format!("could not accept callback connection: {e}")),
            };
        }
    };
    handle_request(stream).await
}

async fn handle_request(mut stream: TcpStream) -> CallbackResult {
    let mut buf = vec![0u8; 8192];
    let mut read = 0usize;

    loop {
        match stream.read(&mut buf[read..]).await {
            Ok(0) => break,
            Ok(n) => {
                read += n;
                if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") || read == buf.len() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("callback read failed: {e}");
                return CallbackResult {
                    code: None,
                    error: Some("could not read callback request".to_string()),
                };
            }
        }
    }

    let head = String::from_utf8_lossy(&buf[..read]);
    let result = parse_request_line(head.lines().next().unwrap_or(""));

    let (status, page) = if result.code.is_some() {
        ("200 OK", SUCCESS_PAGE)
    } else {
        ("400 Bad Request", FAILURE_PAGE)
    };
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{page}",
        page.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!("callback response write failed: {e}");
    }
    let _ = stream.shutdown().await;

    result
}

/// Parse `GET /callback?code=... HTTP/1.1` into a callback outcome.
///
/// The authorization code is a single-use secret, so neither the request
/// target nor the query contents ever reach the logs.
fn parse_request_line(line: &str) -> CallbackResult {
    let target = line.split_whitespace().nth(1).unwrap_or("/");
    let url = match reqwest::Url::parse(&format!("http://localhost{target}")) {
        Ok(url) => url,
        Err(_) => {
            return CallbackResult {
                code: None,
                error: Some("malformed callback request".to_string()),
            };
        }
    };

    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if code.is_some() {
        CallbackResult { code, error: None }
    } else {
        CallbackResult {
            code: None,
            error: error.or_else(|| Some("callback carried no authorization code".to_string())),
        }
    }
}
