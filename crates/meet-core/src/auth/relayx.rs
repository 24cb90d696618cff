//! ============================================================================
//! Relay One Login - Wallet sign-in through a local callback page
//! ============================================================================
//! Serves a page on localhost that loads the relay one script and calls
//! `relayone.authBeta()`. The page redirects back to `/callback` with the
//! signed credential (or the wallet's error) and the CSRF state.
//! ============================================================================

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiny_http::{Header, Request, Response, Server};
use tracing::{debug, error, info, warn};

use super::WalletProvider;
use crate::error::AuthError;

/// Relay one browser SDK
pub const RELAYONE_SCRIPT_URL: &str = "https://one.relayx.io/relayone.js";

/// Default port for the login callback listener
pub const DEFAULT_CALLBACK_PORT: u16 = 9877;

/// Wallet login via the user's browser
pub struct RelayxLogin {
    server: Arc<Server>,
    addr: SocketAddr,
    state: String,
    timeout: Duration,
    open_browser: bool,
}

impl RelayxLogin {
    /// Bind the callback listener on 127.0.0.1. Port 0 picks a free port.
    pub fn bind(port: u16, timeout: Duration) -> Result<Self, AuthError> {
        let bind_addr = format!("127.0.0.1:{}", port);
        let server = Server::http(&bind_addr).map_err(|e| {
            AuthError::Callback(format!("failed to start listener on {}: {}", bind_addr, e))
        })?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| AuthError::Callback("listener has no IP address".to_string()))?;

        Ok(Self {
            server: Arc::new(server),
            addr,
            state: Self::generate_state(),
            timeout,
            open_browser: true,
        })
    }

    /// Skip launching the browser (the caller shows the URL instead)
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    /// Random state parameter for CSRF protection
    fn generate_state() -> String {
        (0..16)
            .map(|_| format!("{:02x}", rand::random::<u8>()))
            .collect()
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Page the user opens to sign in
    pub fn login_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    fn login_page(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <title>POWCO Meet - Sign in</title>
    <script src="{script}"></script>
</head>
<body>
    <p id="status">Waiting for your wallet...</p>
    <script>
        const state = "{state}";
        (async () => {{
            try {{
                const token = await relayone.authBeta();
                window.location = "/callback?state=" + state + "&token=" + encodeURIComponent(token);
            }} catch (err) {{
                const reason = (err && err.message) || String(err);
                window.location = "/callback?state=" + state + "&error=" + encodeURIComponent(reason);
            }}
        }})();
    </script>
</body>
</html>
"#,
            script = RELAYONE_SCRIPT_URL,
            state = self.state
        )
    }

    /// Block until the page reports back or the deadline passes
    pub fn wait_for_credential(&self) -> Result<String, AuthError> {
        let deadline = Instant::now() + self.timeout;
        info!("Waiting for wallet login on {}", self.addr);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(AuthError::TimedOut(self.timeout.as_secs()));
            }

            let request = self
                .server
                .recv_timeout(remaining)
                .map_err(|e| AuthError::Callback(e.to_string()))?
                .ok_or(AuthError::TimedOut(self.timeout.as_secs()))?;

            if let Some(outcome) = self.handle(request) {
                return outcome;
            }
        }
    }

    /// Serve one request; Some once the login has an outcome
    fn handle(&self, request: Request) -> Option<Result<String, AuthError>> {
        let full_url = format!("http://localhost{}", request.url());
        debug!("Login listener request: {}", request.url());

        let parsed = match url::Url::parse(&full_url) {
            Ok(url) => url,
            Err(_) => {
                respond(request, 400, "Bad request");
                return None;
            }
        };

        match parsed.path() {
            "/" => {
                respond(request, 200, &self.login_page());
                None
            }
            "/callback" => {
                let params: HashMap<_, _> = parsed.query_pairs().into_owned().collect();

                if params.get("state").map(String::as_str) != Some(self.state.as_str()) {
                    warn!("Ignoring login callback with mismatched state");
                    respond(request, 400, "State mismatch");
                    return None;
                }

                if let Some(reason) = params.get("error") {
                    error!("Wallet rejected login: {}", reason);
                    respond(request, 200, &status_page("Login cancelled. You can close this window."));
                    return Some(Err(AuthError::Rejected(reason.clone())));
                }

                match params.get("token").filter(|t| !t.is_empty()) {
                    Some(token) => {
                        respond(request, 200, &status_page("Wallet connected. You can close this window."));
                        Some(Ok(token.clone()))
                    }
                    None => {
                        respond(request, 400, "Missing token");
                        Some(Err(AuthError::Callback("callback without token".to_string())))
                    }
                }
            }
            _ => {
                respond(request, 404, "Not found");
                None
            }
        }
    }
}

fn status_page(message: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>POWCO Meet</title></head><body><p>{}</p></body></html>",
        message
    )
}

fn respond(request: Request, status: u16, body: &str) {
    let mut response = Response::from_string(body).with_status_code(status);
    if let Ok(header) =
        Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
    {
        response.add_header(header);
    }
    if let Err(e) = request.respond(response) {
        debug!("Failed to answer login request: {}", e);
    }
}

#[async_trait]
impl WalletProvider for RelayxLogin {
    async fn request_credential(&self) -> Result<String, AuthError> {
        let url = self.login_url();
        if self.open_browser {
            if let Err(e) = open::that(&url) {
                warn!("Could not open browser ({}); visit {} to sign in", e, url);
            }
        }

        let waiter = RelayxLogin {
            server: Arc::clone(&self.server),
            addr: self.addr,
            state: self.state.clone(),
            timeout: self.timeout,
            open_browser: false,
        };

        tokio::task::spawn_blocking(move || waiter.wait_for_credential())
            .await
            .map_err(|e| AuthError::Callback(format!("login task failed: {}", e)))?
    }
}
