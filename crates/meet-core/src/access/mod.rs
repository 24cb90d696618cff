//! ============================================================================
//! Access Module - Token-gated access to the meeting rooms
//! ============================================================================
//! Balance lookup against the ownership registry and the threshold policy.
//!
//! ## Policy
//! `granted = balance.amount >= threshold`, where the amount is the raw
//! registry figure divided by 100,000,000. Lookup failures are a distinct
//! state, never a zero balance.
//!
//! ## Usage
//! ```rust,ignore
//! use meet_core::access::{AccessGate, RelayxRegistry};
//!
//! let registry = RelayxRegistry::new(REGISTRY_URL, POWCO_TOKEN_ID, timeout)?;
//! let gate = AccessGate::new(Arc::new(registry), session);
//! gate.refresh_balance().await;
//! let access = gate.room_access(&Room::club()).await;
//! ```
//! ============================================================================

mod checker;
mod gate;
mod types;

pub use checker::{parse_owners, BalanceChecker, OwnerEntry, OwnershipRegistry, RelayxRegistry};
pub use gate::{AccessGate, RoomAccess};
pub use types::{
    evaluate, AccessDecision, Balance, BalanceState, Threshold, POWCO_TOKEN_ID, TOKEN_DECIMALS,
    TOKEN_SCALE,
};
