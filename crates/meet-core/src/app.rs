//! ============================================================================
//! MeetApp - Session, access gate and room launcher behind one handle
//! ============================================================================
//! The CLI drives everything through this type:
//! - `restore` brings back a previous login; `init` also fetches its balance
//! - `login` / `logout` change the identity and keep the store in step
//! - `view` builds what a route shows; `enter` mounts a room if allowed
//! ============================================================================

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::access::{
    evaluate, AccessGate, BalanceState, OwnershipRegistry, RelayxRegistry, RoomAccess,
};
use crate::auth::{self, LoginOutcome, WalletProvider};
use crate::config::MeetConfig;
use crate::error::{AuthError, LaunchError};
use crate::room::{EmbedClient, EmbedOptions, Room, RoomLauncher};
use crate::session::{Identity, Session, SessionStore};
use crate::shell::{AppBar, PageBody, RoomPageContext, ShellView, UserMenu, LOGIN_ROUTE};

pub struct MeetApp {
    config: MeetConfig,
    store: SessionStore,
    session: Arc<RwLock<Session>>,
    gate: AccessGate,
    launcher: RoomLauncher,
}

impl MeetApp {
    pub fn new(
        config: MeetConfig,
        store: SessionStore,
        registry: Arc<dyn OwnershipRegistry>,
        embed: Box<dyn EmbedClient>,
    ) -> Self {
        let session = Arc::new(RwLock::new(Session::new()));
        let gate = AccessGate::new(registry, session.clone());
        let launcher = RoomLauncher::new(&config.meet_domain, &config.avatar_base_url, embed);
        Self {
            config,
            store,
            session,
            gate,
            launcher,
        }
    }

    /// Wire up the registry client and session store named by the config
    pub fn from_config(config: MeetConfig, embed: Box<dyn EmbedClient>) -> Result<Self> {
        let store = SessionStore::open(config.session_path.as_deref())?;
        let registry = RelayxRegistry::new(
            &config.registry_url,
            &config.token_id,
            config.lookup_timeout(),
        )
        .map_err(|e| anyhow!("Failed to create registry client: {}", e))?;

        Ok(Self::new(config, store, Arc::new(registry), embed))
    }

    pub fn config(&self) -> &MeetConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn session(&self) -> &Arc<RwLock<Session>> {
        &self.session
    }

    /// Sign the session back in from the store. No network access.
    pub async fn restore(&self) -> Result<Option<Identity>> {
        let Some(identity) = auth::rehydrate(&self.store)? else {
            debug!("No stored login");
            return Ok(None);
        };

        self.session.write().await.sign_in(identity.clone());
        Ok(Some(identity))
    }

    /// Restore the stored identity, if any, and fetch its balance
    pub async fn init(&self) -> Result<Option<Identity>> {
        let identity = self.restore().await?;
        if identity.is_some() {
            self.gate.refresh_balance().await;
        }
        Ok(identity)
    }

    /// Wallet login followed by a balance fetch for the new identity
    pub async fn login(&self, provider: &dyn WalletProvider) -> Result<LoginOutcome, AuthError> {
        let outcome = auth::authenticate(provider, &self.store).await?;
        self.session.write().await.sign_in(outcome.identity.clone());
        self.gate.refresh_balance().await;
        Ok(outcome)
    }

    /// Forget the identity; the recorded login route is kept
    pub async fn logout(&self) -> Result<()> {
        self.store.clear_login()?;
        self.session.write().await.sign_out();
        info!("Logged out");
        Ok(())
    }

    pub async fn refresh_balance(&self) -> BalanceState {
        self.gate.refresh_balance().await
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.session.read().await.identity().cloned()
    }

    pub async fn balance(&self) -> BalanceState {
        self.session.read().await.balance().clone()
    }

    /// What a route shows right now. Visiting a room while signed out
    /// records it as the post-login destination.
    pub async fn view(&self, route: &str, login_error: Option<String>) -> Result<ShellView> {
        let route = normalize_route(route);
        let signed_in = self.session.read().await.is_signed_in();

        let body = if route == "/" {
            PageBody::home()
        } else if route == LOGIN_ROUTE {
            if signed_in && login_error.is_none() {
                PageBody::home()
            } else {
                PageBody::Login { error: login_error }
            }
        } else if let Some(room) = Room::by_route(&route) {
            if !signed_in {
                self.store.set_route_on_login(room.route)?;
                debug!("Recorded {} for after login", room.route);
            }
            self.room_page(&room).await
        } else {
            PageBody::NotFound {
                route: route.clone(),
            }
        };

        let user_menu = {
            let session = self.session.read().await;
            UserMenu::from_session(&session, &self.config.avatar_base_url)
        };

        Ok(ShellView {
            route,
            app_bar: AppBar::new(user_menu),
            body,
        })
    }

    async fn room_page(&self, room: &Room) -> PageBody {
        let access = self.gate.room_access(room).await;
        let market_link = self.config.market_link();
        let ctx = RoomPageContext {
            market_link: &market_link,
            script_url: &self.config.embed_script_url,
            launcher: &self.launcher,
        };
        PageBody::for_room(room, access, &ctx)
    }

    /// Mount the room at `route` for the signed-in user
    pub async fn enter(&self, route: &str) -> Result<EmbedOptions, LaunchError> {
        let route = normalize_route(route);
        let room = Room::by_route(&route).ok_or_else(|| LaunchError::UnknownRoom(route.clone()))?;

        match self.gate.room_access(&room).await {
            RoomAccess::SignedOut => Err(LaunchError::NotSignedIn),
            RoomAccess::Loading | RoomAccess::BalanceUnknown { .. } => {
                Err(LaunchError::BalanceUnknown)
            }
            RoomAccess::Denied { balance, .. } => Err(LaunchError::AccessDenied {
                required: room.threshold.tokens(),
                balance: balance.to_string(),
            }),
            RoomAccess::Granted { identity, balance } => {
                let decision = evaluate(&balance, room.threshold);
                self.launcher.enter(&room, &identity, &balance, decision)
            }
        }
    }
}

fn normalize_route(route: &str) -> String {
    let trimmed = route.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
