//! ============================================================================
//! Session Types - Wallet identity and decoded credential claims
//! ============================================================================

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Signed-in wallet identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Email-like wallet handle, e.g. `alice@relayx.io`
    pub paymail: String,
    pub public_key: String,
    pub origin: String,
    pub issued_at: DateTime<Utc>,
}

impl Identity {
    /// Same wallet handle, ignoring ASCII case and padding
    pub fn matches_paymail(&self, other: &str) -> bool {
        self.paymail.trim().eq_ignore_ascii_case(other.trim())
    }
}

/// Claims carried in the credential payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthClaims {
    pub paymail: String,
    pub pubkey: String,
    pub origin: String,
    pub issued_at: IssuedAt,
}

/// `issued_at` as sent by the wallet: RFC 3339 text or a unix timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IssuedAt {
    Unix(i64),
    Text(String),
}

/// Unix values above this are milliseconds
const MILLIS_CUTOFF: i64 = 1_000_000_000_000;

impl IssuedAt {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            IssuedAt::Unix(ts) if *ts > MILLIS_CUTOFF => Utc.timestamp_millis_opt(*ts).single(),
            IssuedAt::Unix(ts) => Utc.timestamp_opt(*ts, 0).single(),
            IssuedAt::Text(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => Some(dt.with_timezone(&Utc)),
                Err(_) => s.trim().parse::<i64>().ok().and_then(|ts| IssuedAt::Unix(ts).to_datetime()),
            },
        }
    }

    /// Value as it is written to the store
    pub fn as_stored(&self) -> String {
        match self {
            IssuedAt::Unix(ts) => ts.to_string(),
            IssuedAt::Text(s) => s.clone(),
        }
    }
}

impl AuthClaims {
    /// Identity view of the claims; None when `issued_at` is unreadable
    pub fn identity(&self) -> Option<Identity> {
        Some(Identity {
            paymail: self.paymail.clone(),
            public_key: self.pubkey.clone(),
            origin: self.origin.clone(),
            issued_at: self.issued_at.to_datetime()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_at_forms() {
        let secs = IssuedAt::Unix(1_650_000_000).to_datetime().unwrap();
        let millis = IssuedAt::Unix(1_650_000_000_000).to_datetime().unwrap();
        let text = IssuedAt::Text("2022-04-15T05:20:00Z".into()).to_datetime().unwrap();
        let numeric_text = IssuedAt::Text("1650000000".into()).to_datetime().unwrap();

        assert_eq!(secs, millis);
        assert_eq!(secs, numeric_text);
        assert_eq!(text.timestamp(), 1_650_000_000);
        assert!(IssuedAt::Text("yesterday".into()).to_datetime().is_none());
    }

    #[test]
    fn test_paymail_match_ignores_case() {
        let identity = AuthClaims {
            paymail: "Alice@RelayX.io".into(),
            pubkey: "02ab".into(),
            origin: "meet.pow.co".into(),
            issued_at: IssuedAt::Unix(1_650_000_000),
        }
        .identity()
        .unwrap();

        assert!(identity.matches_paymail("alice@relayx.io "));
        assert!(!identity.matches_paymail("bob@relayx.io"));
    }
}
