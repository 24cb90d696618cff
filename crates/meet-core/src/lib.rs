//! ============================================================================
//! MEET-CORE: Token-gated meeting rooms
//! ============================================================================
//! Everything behind the POWCO meeting front-end:
//! - Wallet login (RelayX) and persisted session state via redb
//! - Token balance lookup against the RelayX owners registry
//! - Threshold access policy per room
//! - Jitsi room launching and the shell view model
//! ============================================================================

pub mod access;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod room;
pub mod session;
pub mod shell;

// Re-export main types for convenience
pub use access::{AccessDecision, AccessGate, Balance, BalanceState, RoomAccess, Threshold};
pub use app::MeetApp;
pub use auth::{RelayxLogin, StaticCredential, WalletProvider};
pub use config::MeetConfig;
pub use error::{AuthError, LaunchError, LookupError};
pub use room::{BrowserEmbed, EmbedClient, EmbedOptions, HostPageEmbed, Room};
pub use session::{Identity, Session, SessionStore};
pub use shell::{PageBody, ShellView};
