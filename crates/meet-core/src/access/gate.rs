//! ============================================================================
//! Access Gate - Balance refresh and per-room gating for the session
//! ============================================================================
//! Decisions are recomputed from the session's current balance on every
//! check; nothing here caches a decision. The session lock is never held
//! across the registry call, and a refresh dropped mid-fetch leaves the
//! session in `Failed` rather than `Loading`.
//! ============================================================================

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::checker::{BalanceChecker, OwnershipRegistry};
use super::types::{evaluate, AccessDecision, Balance, BalanceState, Threshold};
use crate::room::{Paywall, Room};
use crate::session::{Identity, RefreshTicket, Session};

/// Where a user stands with respect to one room
#[derive(Debug, Clone, PartialEq)]
pub enum RoomAccess {
    SignedOut,
    /// Balance fetch in flight
    Loading,
    /// Balance could not be determined; carries the failure if there was one
    BalanceUnknown { reason: Option<String> },
    Denied { balance: Balance, paywall: Paywall },
    Granted { identity: Identity, balance: Balance },
}

impl RoomAccess {
    pub fn decision(&self) -> AccessDecision {
        match self {
            RoomAccess::Granted { .. } => AccessDecision::GRANTED,
            _ => AccessDecision::DENIED,
        }
    }
}

/// Settles an in-flight refresh if its future is dropped before finishing
struct RefreshGuard {
    session: Arc<RwLock<Session>>,
    ticket: Option<RefreshTicket>,
}

impl RefreshGuard {
    fn disarm(&mut self) {
        self.ticket = None;
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };

        if let Ok(mut session) = self.session.try_write() {
            session.cancel_refresh(&ticket);
            return;
        }

        // Lock is busy; settle it once the holder lets go
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let session = Arc::clone(&self.session);
                handle.spawn(async move {
                    session.write().await.cancel_refresh(&ticket);
                });
            }
            Err(_) => warn!(
                "Refresh for {} dropped outside a runtime; balance left loading",
                ticket.identity.paymail
            ),
        }
    }
}

/// Token gate over the shared session
pub struct AccessGate {
    checker: BalanceChecker<Arc<dyn OwnershipRegistry>>,
    session: Arc<RwLock<Session>>,
}

impl AccessGate {
    pub fn new(registry: Arc<dyn OwnershipRegistry>, session: Arc<RwLock<Session>>) -> Self {
        Self {
            checker: BalanceChecker::new(registry),
            session,
        }
    }

    /// Fetch the signed-in identity's balance and store it in the session.
    /// A result superseded by a newer refresh or identity change is dropped.
    pub async fn refresh_balance(&self) -> BalanceState {
        let ticket = {
            let mut session = self.session.write().await;
            match session.begin_refresh() {
                Some(ticket) => ticket,
                None => {
                    debug!("No identity, skipping balance refresh");
                    return BalanceState::Unknown;
                }
            }
        };

        let mut guard = RefreshGuard {
            session: Arc::clone(&self.session),
            ticket: Some(ticket.clone()),
        };

        let result = self.checker.fetch_balance(&ticket.identity).await;
        if let Err(e) = &result {
            warn!("Balance lookup for {} failed: {}", ticket.identity.paymail, e);
        }

        let mut session = self.session.write().await;
        guard.disarm();
        if session.finish_refresh(&ticket, result) {
            info!(
                "Balance for {} is now {}",
                ticket.identity.paymail,
                session.balance().display()
            );
        }
        session.balance().clone()
    }

    /// Decision for a threshold against the current balance
    pub async fn check(&self, threshold: Threshold) -> AccessDecision {
        let session = self.session.read().await;
        session.decision(threshold)
    }

    /// Full access picture for a room
    pub async fn room_access(&self, room: &Room) -> RoomAccess {
        let session = self.session.read().await;
        let Some(identity) = session.identity() else {
            return RoomAccess::SignedOut;
        };

        match session.balance() {
            BalanceState::Loading => RoomAccess::Loading,
            BalanceState::Unknown => RoomAccess::BalanceUnknown { reason: None },
            BalanceState::Failed { reason } => RoomAccess::BalanceUnknown {
                reason: Some(reason.clone()),
            },
            BalanceState::Known { balance } => {
                if evaluate(balance, room.threshold).granted {
                    RoomAccess::Granted {
                        identity: identity.clone(),
                        balance: *balance,
                    }
                } else {
                    RoomAccess::Denied {
                        balance: *balance,
                        paywall: room.paywall(),
                    }
                }
            }
        }
    }

    pub fn session(&self) -> &Arc<RwLock<Session>> {
        &self.session
    }
}
