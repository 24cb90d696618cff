//! ============================================================================
//! Errors - Typed failures for login, balance lookup and room launch
//! ============================================================================
//! Storage and plumbing use anyhow; these are the failures callers branch on.
//! ============================================================================

use thiserror::Error;

/// Wallet authentication failures
#[derive(Debug, Error)]
pub enum AuthError {
    /// The user (or the wallet) declined to sign
    #[error("wallet rejected the signature request: {0}")]
    Rejected(String),

    /// No credential arrived before the deadline
    #[error("wallet login timed out after {0}s")]
    TimedOut(u64),

    /// Credential could not be decoded into an identity
    #[error("invalid wallet credential: {0}")]
    InvalidCredential(String),

    /// Local callback listener failed
    #[error("login callback failed: {0}")]
    Callback(String),

    /// Identity could not be written to the session store
    #[error("failed to persist session: {0}")]
    Session(String),
}

/// Ownership registry lookup failures
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("registry request failed: {0}")]
    Request(String),

    #[error("registry returned HTTP {0}")]
    Status(u16),

    #[error("registry lookup timed out after {0}s")]
    Timeout(u64),

    /// Response did not match the owners schema
    #[error("unexpected registry response: {0}")]
    Schema(String),
}

impl LookupError {
    pub(crate) fn from_reqwest(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            LookupError::Timeout(timeout_secs)
        } else if let Some(status) = e.status() {
            LookupError::Status(status.as_u16())
        } else {
            LookupError::Request(e.to_string())
        }
    }
}

/// Room launch failures
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no room at {0}")]
    UnknownRoom(String),

    #[error("sign in with your wallet first")]
    NotSignedIn,

    /// Balance never fetched or the lookup failed
    #[error("token balance unknown, try again")]
    BalanceUnknown,

    #[error("access denied: {required} tokens required, balance is {balance}")]
    AccessDenied { required: u64, balance: String },

    #[error("video embed failed: {0}")]
    Embed(String),
}
