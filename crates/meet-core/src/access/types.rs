//! ============================================================================
//! Access Types - Token balances, thresholds and access decisions
//! ============================================================================
//! Balances are kept in raw registry units so threshold checks are exact.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw registry units per whole token
pub const TOKEN_SCALE: u64 = 100_000_000;

/// Decimal places implied by `TOKEN_SCALE`
pub const TOKEN_DECIMALS: u8 = 8;

/// Token id of the club token on the ownership registry
pub const POWCO_TOKEN_ID: &str =
    "b006ff07a70da8158c29b763d7e71fcf4ec2a69a31615c4d934aa7e6f76ffc2c_o2";

/// Token balance held by a paymail
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Balance {
    raw: u64,
}

impl Balance {
    pub const ZERO: Balance = Balance { raw: 0 };

    /// Build from smallest registry units
    pub fn from_raw(raw: u64) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> u64 {
        self.raw
    }

    /// Whole-token amount (raw / 100,000,000)
    pub fn amount(&self) -> f64 {
        self.raw as f64 / TOKEN_SCALE as f64
    }

    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    /// Exact `amount >= tokens`
    pub fn at_least(&self, tokens: u64) -> bool {
        self.raw as u128 >= tokens as u128 * TOKEN_SCALE as u128
    }
}

impl fmt::Display for Balance {
    /// Trailing zeros trimmed: 2.5, 1500, 0.00000001
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.raw / TOKEN_SCALE;
        let frac = self.raw % TOKEN_SCALE;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0width$}", frac, width = TOKEN_DECIMALS as usize);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

/// Minimum whole-token balance needed for a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Threshold(pub u64);

impl Threshold {
    pub fn tokens(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of checking a balance against a threshold. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub granted: bool,
}

impl AccessDecision {
    pub const GRANTED: AccessDecision = AccessDecision { granted: true };
    pub const DENIED: AccessDecision = AccessDecision { granted: false };
}

/// Grant access iff `balance.amount >= threshold`
pub fn evaluate(balance: &Balance, threshold: Threshold) -> AccessDecision {
    AccessDecision {
        granted: balance.at_least(threshold.tokens()),
    }
}

/// What the session knows about the current identity's balance
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BalanceState {
    /// Nothing fetched yet, or cleared by logout
    #[default]
    Unknown,
    /// Fetch in flight
    Loading,
    /// Last successful lookup
    Known { balance: Balance },
    /// Last lookup failed; the balance is not assumed to be zero
    Failed { reason: String },
}

impl BalanceState {
    pub fn known(&self) -> Option<Balance> {
        match self {
            BalanceState::Known { balance } => Some(*balance),
            _ => None,
        }
    }

    /// Balance used for policy checks; anything not known counts as zero
    pub fn balance_or_zero(&self) -> Balance {
        self.known().unwrap_or(Balance::ZERO)
    }

    pub fn display(&self) -> String {
        match self {
            BalanceState::Known { balance } => balance.to_string(),
            _ => "?".to_string(),
        }
    }
}
