//! ============================================================================
//! Shell - What the front-end shows for a route
//! ============================================================================
//! App bar (branding, user menu) plus a page body derived from the session
//! and the room's access state. Rendered as text by the CLI.
//! ============================================================================

use serde::Serialize;
use std::fmt;

use crate::access::{BalanceState, RoomAccess};
use crate::room::{avatar_url, EmbedOptions, Room, RoomLauncher, CLUB_LINK_MIN_TOKENS};
use crate::session::Session;

pub const BRAND_TITLE: &str = "Be The Broadcast";
pub const BRAND_LOGO: &str = "/images/Be+The+Broadcast+Logo+White-01.png";
pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub label: String,
    pub href: String,
}

impl NavLink {
    fn new(label: &str, href: &str) -> Self {
        Self {
            label: label.to_string(),
            href: href.to_string(),
        }
    }
}

/// Dropdown behind the avatar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMenu {
    pub paymail: String,
    pub avatar_url: String,
    /// `<balance> 📻`, `?` while unknown
    pub balance_line: String,
    pub links: Vec<NavLink>,
    pub logout_label: String,
}

impl UserMenu {
    pub fn from_session(session: &Session, avatar_base_url: &str) -> Option<Self> {
        let identity = session.identity()?;

        let mut links = Vec::new();
        if session
            .balance()
            .known()
            .is_some_and(|b| b.raw() > CLUB_LINK_MIN_TOKENS * crate::access::TOKEN_SCALE)
        {
            let club = Room::club();
            links.push(NavLink::new(club.title, club.route));
        }

        Some(Self {
            paymail: identity.paymail.clone(),
            avatar_url: avatar_url(avatar_base_url, &identity.paymail),
            balance_line: format!("{} 📻", session.balance().display()),
            links,
            logout_label: "Logout".to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppBar {
    pub brand: NavLink,
    pub logo: String,
    pub user_menu: Option<UserMenu>,
}

impl AppBar {
    pub fn new(user_menu: Option<UserMenu>) -> Self {
        Self {
            brand: NavLink::new(BRAND_TITLE, "/"),
            logo: BRAND_LOGO.to_string(),
            user_menu,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallToAction {
    pub label: String,
    pub href: String,
}

/// Main content for a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum PageBody {
    Login {
        /// Last login failure, shown with a retry prompt
        error: Option<String>,
    },
    Home {
        rooms: Vec<NavLink>,
    },
    Loading {
        title: String,
    },
    BalanceUnknown {
        title: String,
        reason: Option<String>,
    },
    Paywall {
        title: String,
        message: String,
        required: u64,
        balance: String,
        call_to_action: Option<CallToAction>,
    },
    Room {
        title: String,
        required: u64,
        balance: String,
        token_link: String,
        domain: String,
        script_url: String,
        options: EmbedOptions,
    },
    NotFound {
        route: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellView {
    pub route: String,
    pub app_bar: AppBar,
    pub body: PageBody,
}

/// Inputs for a room page that do not come from the session
pub struct RoomPageContext<'a> {
    pub market_link: &'a str,
    pub script_url: &'a str,
    pub launcher: &'a RoomLauncher,
}

impl PageBody {
    pub fn home() -> Self {
        PageBody::Home {
            rooms: Room::all()
                .iter()
                .map(|room| NavLink::new(room.title, room.route))
                .collect(),
        }
    }

    /// Body for a room page. Embed options only exist on a granted page.
    pub fn for_room(room: &Room, access: RoomAccess, ctx: &RoomPageContext<'_>) -> Self {
        let title = room.title.to_string();
        match access {
            RoomAccess::SignedOut => PageBody::Login { error: None },
            RoomAccess::Loading => PageBody::Loading { title },
            RoomAccess::BalanceUnknown { reason } => PageBody::BalanceUnknown { title, reason },
            RoomAccess::Denied { balance, paywall } => PageBody::Paywall {
                title,
                message: paywall.message,
                required: room.threshold.tokens(),
                balance: balance.to_string(),
                call_to_action: paywall.call_to_action.map(|label| CallToAction {
                    label: label.to_string(),
                    href: ctx.market_link.to_string(),
                }),
            },
            RoomAccess::Granted { identity, balance } => PageBody::Room {
                title,
                required: room.threshold.tokens(),
                balance: balance.to_string(),
                token_link: ctx.market_link.to_string(),
                domain: ctx.launcher.domain().to_string(),
                script_url: ctx.script_url.to_string(),
                options: ctx.launcher.options_for(room, &identity, &balance),
            },
        }
    }
}

impl fmt::Display for ShellView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.app_bar.brand.label)?;
        match &self.app_bar.user_menu {
            Some(menu) => {
                writeln!(f, "  {}  {}", menu.paymail, menu.balance_line)?;
                for link in &menu.links {
                    writeln!(f, "  -> {} ({})", link.label, link.href)?;
                }
            }
            None => writeln!(f, "  signed out")?,
        }
        writeln!(f, "{}", "-".repeat(60))?;

        match &self.body {
            PageBody::Login { error } => {
                if let Some(error) = error {
                    writeln!(f, "Login failed: {}", error)?;
                    writeln!(f, "Run `powco-meet login` to try again.")?;
                } else {
                    writeln!(f, "Sign in with your wallet: `powco-meet login`")?;
                }
            }
            PageBody::Home { rooms } => {
                writeln!(f, "Rooms:")?;
                for room in rooms {
                    writeln!(f, "  {:<20} {}", room.label, room.href)?;
                }
            }
            PageBody::Loading { title } => {
                writeln!(f, "{}", title)?;
                writeln!(f, "Checking your token balance...")?;
            }
            PageBody::BalanceUnknown { title, reason } => {
                writeln!(f, "{}", title)?;
                match reason {
                    Some(reason) => writeln!(f, "Could not check your token balance: {}", reason)?,
                    None => writeln!(f, "Your token balance has not been checked yet.")?,
                }
                writeln!(f, "Run `powco-meet balance` to retry.")?;
            }
            PageBody::Paywall {
                title,
                message,
                balance,
                call_to_action,
                ..
            } => {
                writeln!(f, "{}", title)?;
                writeln!(f, "{}", message)?;
                writeln!(f, "balance: {}", balance)?;
                if let Some(cta) = call_to_action {
                    writeln!(f, "[{}] {}", cta.label, cta.href)?;
                }
            }
            PageBody::Room {
                title,
                required,
                balance,
                token_link,
                domain,
                options,
                ..
            } => {
                writeln!(f, "{}", title)?;
                writeln!(f, "required: {} ({})", required, token_link)?;
                writeln!(f, "balance: {}", balance)?;
                writeln!(f, "room: https://{}/{}", domain, options.room_name)?;
                writeln!(f, "joining as: {}", options.user_info.display_name)?;
            }
            PageBody::NotFound { route } => writeln!(f, "Nothing at {}", route)?,
        }
        Ok(())
    }
}

/// Balance line used outside the user menu
pub fn balance_summary(state: &BalanceState) -> String {
    match state {
        BalanceState::Unknown => "balance not checked".to_string(),
        BalanceState::Loading => "checking balance".to_string(),
        BalanceState::Known { balance } => format!("{} tokens", balance),
        BalanceState::Failed { reason } => format!("balance unknown ({})", reason),
    }
}
