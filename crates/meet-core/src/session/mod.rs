//! ============================================================================
//! Session Module - Signed-in identity and its latest balance
//! ============================================================================
//! `Session` is the in-memory state the shell renders from. It is created on
//! login, cleared on logout, and mirrored to `SessionStore` so a restart can
//! rehydrate the identity.
//!
//! Every identity change and every balance refresh bumps the generation. A
//! refresh result is only applied if the generation it started under is
//! still current, so the most recent fetch wins.
//! ============================================================================

mod store;
mod types;

pub use store::{keys, SessionStore, DEFAULT_ROUTE_ON_LOGIN};
pub use types::{AuthClaims, Identity, IssuedAt};

use tracing::{debug, info};

use crate::access::{evaluate, AccessDecision, Balance, BalanceState, Threshold};
use crate::error::LookupError;

/// Failure recorded when a balance fetch is dropped before it finishes
pub const REFRESH_CANCELLED: &str = "balance lookup cancelled";

#[derive(Debug, Clone, Default)]
pub struct Session {
    identity: Option<Identity>,
    balance: BalanceState,
    generation: u64,
}

/// Ticket for an in-flight balance refresh
#[derive(Debug, Clone)]
pub struct RefreshTicket {
    pub generation: u64,
    pub identity: Identity,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    pub fn balance(&self) -> &BalanceState {
        &self.balance
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the identity; any known balance belonged to the previous one
    pub fn sign_in(&mut self, identity: Identity) {
        info!("Session signed in as {}", identity.paymail);
        self.generation += 1;
        self.identity = Some(identity);
        self.balance = BalanceState::Unknown;
    }

    pub fn sign_out(&mut self) {
        if let Some(identity) = self.identity.take() {
            info!("Session signed out ({})", identity.paymail);
        }
        self.generation += 1;
        self.balance = BalanceState::Unknown;
    }

    /// Mark a refresh as started. None when nobody is signed in.
    pub fn begin_refresh(&mut self) -> Option<RefreshTicket> {
        let identity = self.identity.clone()?;
        self.generation += 1;
        self.balance = BalanceState::Loading;
        Some(RefreshTicket {
            generation: self.generation,
            identity,
        })
    }

    /// Apply a refresh result. Returns false if a newer refresh or an
    /// identity change superseded it.
    pub fn finish_refresh(
        &mut self,
        ticket: &RefreshTicket,
        result: Result<Balance, LookupError>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(
                "Dropping stale balance for {} (generation {} != {})",
                ticket.identity.paymail, ticket.generation, self.generation
            );
            return false;
        }

        self.balance = match result {
            Ok(balance) => BalanceState::Known { balance },
            Err(e) => BalanceState::Failed {
                reason: e.to_string(),
            },
        };
        true
    }

    /// Settle a refresh whose fetch was abandoned. Only the refresh that is
    /// still current and still loading is marked failed.
    pub fn cancel_refresh(&mut self, ticket: &RefreshTicket) -> bool {
        if ticket.generation != self.generation || self.balance != BalanceState::Loading {
            return false;
        }

        debug!("Balance refresh for {} cancelled", ticket.identity.paymail);
        self.balance = BalanceState::Failed {
            reason: REFRESH_CANCELLED.to_string(),
        };
        true
    }

    /// Decision for a threshold, recomputed from the current balance
    pub fn decision(&self, threshold: Threshold) -> AccessDecision {
        evaluate(&self.balance.balance_or_zero(), threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(paymail: &str) -> Identity {
        AuthClaims {
            paymail: paymail.to_string(),
            pubkey: "02ab".to_string(),
            origin: "meet.pow.co".to_string(),
            issued_at: IssuedAt::Unix(1_650_000_000),
        }
        .identity()
        .unwrap()
    }

    #[test]
    fn test_refresh_applies_balance() {
        let mut session = Session::new();
        session.sign_in(identity("alice@relayx.io"));

        let ticket = session.begin_refresh().unwrap();
        assert_eq!(session.balance(), &BalanceState::Loading);
        assert!(session.finish_refresh(&ticket, Ok(Balance::from_raw(150_000_000_000))));

        assert!(session.decision(Threshold(1000)).granted);
    }

    #[test]
    fn test_refresh_without_identity() {
        let mut session = Session::new();
        assert!(session.begin_refresh().is_none());
        assert_eq!(session.balance(), &BalanceState::Unknown);
    }

    #[test]
    fn test_failed_lookup_is_not_zero() {
        let mut session = Session::new();
        session.sign_in(identity("alice@relayx.io"));
        let ticket = session.begin_refresh().unwrap();
        session.finish_refresh(&ticket, Err(LookupError::Status(502)));

        assert!(matches!(session.balance(), BalanceState::Failed { .. }));
        assert!(session.balance().known().is_none());
        assert!(!session.decision(Threshold(10)).granted);
    }

    #[test]
    fn test_stale_fetch_after_identity_change() {
        let mut session = Session::new();
        session.sign_in(identity("alice@relayx.io"));
        let alice_ticket = session.begin_refresh().unwrap();

        session.sign_in(identity("bob@relayx.io"));
        assert!(!session.finish_refresh(&alice_ticket, Ok(Balance::from_raw(150_000_000_000))));
        assert_eq!(session.balance(), &BalanceState::Unknown);
        assert!(!session.decision(Threshold(10)).granted);
    }

    #[test]
    fn test_newer_refresh_wins() {
        let mut session = Session::new();
        session.sign_in(identity("alice@relayx.io"));
        let first = session.begin_refresh().unwrap();
        let second = session.begin_refresh().unwrap();

        assert!(session.finish_refresh(&second, Ok(Balance::from_raw(250_000_000))));
        assert!(!session.finish_refresh(&first, Ok(Balance::from_raw(150_000_000_000))));
        assert_eq!(session.balance().known(), Some(Balance::from_raw(250_000_000)));
    }

    #[test]
    fn test_cancelled_refresh_is_failed_not_loading() {
        let mut session = Session::new();
        session.sign_in(identity("alice@relayx.io"));
        let ticket = session.begin_refresh().unwrap();

        assert!(session.cancel_refresh(&ticket));
        assert_eq!(
            session.balance(),
            &BalanceState::Failed {
                reason: REFRESH_CANCELLED.to_string()
            }
        );
        assert!(!session.decision(Threshold(10)).granted);
    }

    #[test]
    fn test_cancelling_superseded_refresh_is_ignored() {
        let mut session = Session::new();
        session.sign_in(identity("alice@relayx.io"));
        let first = session.begin_refresh().unwrap();
        let second = session.begin_refresh().unwrap();
        session.finish_refresh(&second, Ok(Balance::from_raw(250_000_000)));

        assert!(!session.cancel_refresh(&first));
        assert!(!session.cancel_refresh(&second));
        assert_eq!(session.balance().known(), Some(Balance::from_raw(250_000_000)));
    }

    #[test]
    fn test_decision_follows_balance_change() {
        let mut session = Session::new();
        session.sign_in(identity("alice@relayx.io"));

        let ticket = session.begin_refresh().unwrap();
        session.finish_refresh(&ticket, Ok(Balance::from_raw(150_000_000_000)));
        assert!(session.decision(Threshold(1000)).granted);

        let ticket = session.begin_refresh().unwrap();
        session.finish_refresh(&ticket, Ok(Balance::from_raw(250_000_000)));
        assert!(!session.decision(Threshold(1000)).granted);
    }

    #[test]
    fn test_sign_out_clears_identity_and_balance() {
        let mut session = Session::new();
        session.sign_in(identity("alice@relayx.io"));
        let ticket = session.begin_refresh().unwrap();
        session.finish_refresh(&ticket, Ok(Balance::from_raw(150_000_000_000)));

        session.sign_out();
        assert!(session.identity().is_none());
        assert_eq!(session.balance(), &BalanceState::Unknown);
        assert!(!session.decision(Threshold(10)).granted);
        assert!(!session.decision(Threshold(1000)).granted);
    }
}
