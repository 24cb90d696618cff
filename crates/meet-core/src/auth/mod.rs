//! ============================================================================
//! Auth Module - Wallet identity for the meeting rooms
//! ============================================================================
//! Turns a wallet-signed credential into an `Identity`:
//! - `WalletProvider` obtains the raw credential (browser login or pasted)
//! - `authenticate` decodes it, persists it, and picks the next route
//! - `rehydrate` restores the identity from the session store on start
//! ============================================================================

mod credential;
mod relayx;

pub use credential::{decode_claims, decode_identity};
pub use relayx::{RelayxLogin, DEFAULT_CALLBACK_PORT, RELAYONE_SCRIPT_URL};

#[cfg(test)]
pub(crate) use credential::encode_for_test;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::AuthError;
use crate::session::{Identity, SessionStore};

/// Source of wallet-signed login credentials
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request_credential(&self) -> Result<String, AuthError>;
}

/// A credential the user already has (e.g. pasted from the wallet)
pub struct StaticCredential {
    token: String,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into().trim().to_string(),
        }
    }
}

#[async_trait]
impl WalletProvider for StaticCredential {
    async fn request_credential(&self) -> Result<String, AuthError> {
        if self.token.is_empty() {
            return Err(AuthError::InvalidCredential("empty credential".to_string()));
        }
        Ok(self.token.clone())
    }
}

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub identity: Identity,
    /// Route the shell should navigate to next
    pub redirect: String,
}

/// Run the wallet exchange, persist the result, and pick the next route
pub async fn authenticate(
    provider: &dyn WalletProvider,
    store: &SessionStore,
) -> Result<LoginOutcome, AuthError> {
    let outcome = exchange(provider, store).await;
    match &outcome {
        Ok(login) => info!(
            "Logged in as {}, continuing to {}",
            login.identity.paymail, login.redirect
        ),
        Err(e) => error!("Wallet login failed: {}", e),
    }
    outcome
}

async fn exchange(
    provider: &dyn WalletProvider,
    store: &SessionStore,
) -> Result<LoginOutcome, AuthError> {
    let token = provider.request_credential().await?;
    let (claims, identity) = decode_identity(&token)?;

    store
        .save_login(&token, &claims)
        .map_err(|e| AuthError::Session(e.to_string()))?;

    let redirect = store
        .take_route_on_login()
        .map_err(|e| AuthError::Session(e.to_string()))?;

    Ok(LoginOutcome { identity, redirect })
}

/// Identity from a previous login, if the store still holds a usable one.
/// Unusable leftovers are cleared so the shell shows the login page.
pub fn rehydrate(store: &SessionStore) -> anyhow::Result<Option<Identity>> {
    if let Some(identity) = store.claims()?.and_then(|claims| claims.identity()) {
        info!("Restored session for {}", identity.paymail);
        return Ok(Some(identity));
    }

    let Some(token) = store.token()? else {
        return Ok(None);
    };

    match decode_identity(&token) {
        Ok((claims, identity)) => {
            store.save_login(&token, &claims)?;
            info!("Restored session for {} from stored token", identity.paymail);
            Ok(Some(identity))
        }
        Err(e) => {
            warn!("Stored credential unusable ({}), clearing session", e);
            store.clear_login()?;
            Ok(None)
        }
    }
}
