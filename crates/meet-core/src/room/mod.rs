//! ============================================================================
//! Room Module - Token-gated meeting rooms and the video embed
//! ============================================================================
//! Each room has a route, a Jitsi room name and a minimum balance. Launching
//! builds the embed options for the signed-in user and hands them to an
//! `EmbedClient`; a denied decision never reaches the client.
//! ============================================================================

mod embed;

pub use embed::{BrowserEmbed, EmbedClient, HostPageEmbed, EMBED_PARENT_SELECTOR};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::access::{AccessDecision, Balance, Threshold};
use crate::error::LaunchError;
use crate::session::Identity;

/// Room gated at the lower bound: daily holders' standup
pub const DAILY_STANDUP_THRESHOLD: Threshold = Threshold(10);

/// Room gated at the higher bound: the club room
pub const CLUB_THRESHOLD: Threshold = Threshold(1000);

/// Balance above which the user menu links the club room
pub const CLUB_LINK_MIN_TOKENS: u64 = 2;

/// How the user is named inside the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayNameStyle {
    Paymail,
    /// `<paymail> <balance> <symbol>`
    PaymailWithBalance { symbol: &'static str },
}

/// What a denied visitor is shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paywall {
    pub message: String,
    /// Optional button linking to the token market
    pub call_to_action: Option<&'static str>,
}

/// A token-gated meeting room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    pub route: &'static str,
    pub title: &'static str,
    pub room_name: &'static str,
    pub threshold: Threshold,
    pub display_name: DisplayNameStyle,
    denial_template: &'static str,
    call_to_action: Option<&'static str>,
}

impl Room {
    pub fn daily_standup() -> Self {
        Self {
            route: "/daily-standup",
            title: "Daily Standup",
            room_name: "powco-holders-daily-meeting",
            threshold: DAILY_STANDUP_THRESHOLD,
            display_name: DisplayNameStyle::PaymailWithBalance { symbol: "POWCO" },
            denial_template: "Error: {required} POWCO required to attend daily meetings.",
            call_to_action: None,
        }
    }

    pub fn club() -> Self {
        Self {
            route: "/meet",
            title: "Club Meeting Room",
            room_name: "be-the-broadcast-club-meeting-room",
            threshold: CLUB_THRESHOLD,
            display_name: DisplayNameStyle::Paymail,
            denial_template: "{required} Tokens required to enter the Video Chat.",
            call_to_action: Some("JOIN THE CLUB"),
        }
    }

    /// All rooms the shell can route to
    pub fn all() -> Vec<Room> {
        vec![Room::daily_standup(), Room::club()]
    }

    pub fn by_route(route: &str) -> Option<Room> {
        let route = route.trim_end_matches('/');
        Room::all().into_iter().find(|room| room.route == route)
    }

    pub fn paywall(&self) -> Paywall {
        Paywall {
            message: self
                .denial_template
                .replace("{required}", &self.threshold.to_string()),
            call_to_action: self.call_to_action,
        }
    }

    /// Name shown to other participants
    pub fn display_name_for(&self, identity: &Identity, balance: &Balance) -> String {
        match self.display_name {
            DisplayNameStyle::Paymail => identity.paymail.clone(),
            DisplayNameStyle::PaymailWithBalance { symbol } => {
                format!("{} {} {}", identity.paymail, balance, symbol)
            }
        }
    }
}

/// Participant details passed to the embed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub display_name: String,
    pub email: String,
    pub avatar_url: String,
}

/// Jitsi config overrides applied to every room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverwrite {
    pub prejoin_page_enabled: bool,
    pub start_with_audio_muted: bool,
    pub start_with_video_muted: bool,
}

impl Default for ConfigOverwrite {
    fn default() -> Self {
        Self {
            prejoin_page_enabled: false,
            start_with_audio_muted: true,
            start_with_video_muted: true,
        }
    }
}

/// Options for `JitsiMeetExternalAPI(domain, options)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedOptions {
    pub room_name: String,
    pub width: String,
    pub height: u32,
    /// CSS selector of the element the iframe mounts into
    pub parent_node: String,
    pub lang: String,
    pub user_info: UserInfo,
    pub config_overwrite: ConfigOverwrite,
}

impl EmbedOptions {
    pub fn new(room_name: &str, display_name: String, email: String, avatar_url: String) -> Self {
        Self {
            room_name: room_name.to_string(),
            width: "100%".to_string(),
            height: 700,
            parent_node: EMBED_PARENT_SELECTOR.to_string(),
            lang: "en".to_string(),
            user_info: UserInfo {
                display_name,
                email,
                avatar_url,
            },
            config_overwrite: ConfigOverwrite::default(),
        }
    }
}

/// Avatar image for a paymail
pub fn avatar_url(base: &str, paymail: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), paymail)
}

/// Mounts rooms through an embed client against a fixed domain
pub struct RoomLauncher {
    domain: String,
    avatar_base_url: String,
    client: Box<dyn EmbedClient>,
}

impl RoomLauncher {
    pub fn new(domain: &str, avatar_base_url: &str, client: Box<dyn EmbedClient>) -> Self {
        Self {
            domain: domain.to_string(),
            avatar_base_url: avatar_base_url.to_string(),
            client,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Embed options for a user entering a room
    pub fn options_for(&self, room: &Room, identity: &Identity, balance: &Balance) -> EmbedOptions {
        EmbedOptions::new(
            room.room_name,
            room.display_name_for(identity, balance),
            identity.paymail.clone(),
            avatar_url(&self.avatar_base_url, &identity.paymail),
        )
    }

    /// Initialize the embed with the given room metadata
    pub fn launch_room(
        &self,
        room_name: &str,
        display_name: &str,
        email: &str,
        avatar_url: &str,
    ) -> Result<EmbedOptions, LaunchError> {
        let options = EmbedOptions::new(
            room_name,
            display_name.to_string(),
            email.to_string(),
            avatar_url.to_string(),
        );
        self.client.mount(&self.domain, &options)?;
        info!("Launched room {} on {}", room_name, self.domain);
        Ok(options)
    }

    /// Launch a room for a user; refused unless the decision is granted
    pub fn enter(
        &self,
        room: &Room,
        identity: &Identity,
        balance: &Balance,
        decision: AccessDecision,
    ) -> Result<EmbedOptions, LaunchError> {
        if !decision.granted {
            warn!(
                "Refusing to launch {} for {}: balance {} below {}",
                room.room_name, identity.paymail, balance, room.threshold
            );
            return Err(LaunchError::AccessDenied {
                required: room.threshold.tokens(),
                balance: balance.to_string(),
            });
        }

        let options = self.options_for(room, identity, balance);
        self.client.mount(&self.domain, &options)?;
        info!("{} entered {} on {}", identity.paymail, room.room_name, self.domain);
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::evaluate;
    use crate::session::{AuthClaims, IssuedAt};
    use std::sync::{Arc, Mutex};

    fn identity() -> Identity {
        AuthClaims {
            paymail: "alice@relayx.io".into(),
            pubkey: "02ab".into(),
            origin: "meet.pow.co".into(),
            issued_at: IssuedAt::Unix(1_650_000_000),
        }
        .identity()
        .unwrap()
    }

    #[derive(Clone, Default)]
    struct RecordingEmbed(Arc<Mutex<Vec<(String, EmbedOptions)>>>);

    impl EmbedClient for RecordingEmbed {
        fn mount(&self, domain: &str, options: &EmbedOptions) -> Result<(), LaunchError> {
            self.0.lock().unwrap().push((domain.to_string(), options.clone()));
            Ok(())
        }
    }

    fn launcher() -> (RoomLauncher, RecordingEmbed) {
        let embed = RecordingEmbed::default();
        let launcher = RoomLauncher::new(
            "meet.pow.co",
            "https://bitpic.network/u",
            Box::new(embed.clone()),
        );
        (launcher, embed)
    }

    #[test]
    fn test_room_catalog() {
        assert_eq!(Room::by_route("/daily-standup").unwrap().threshold, Threshold(10));
        assert_eq!(Room::by_route("/meet/").unwrap().threshold, Threshold(1000));
        assert!(Room::by_route("/lobby").is_none());
        assert!(DAILY_STANDUP_THRESHOLD < CLUB_THRESHOLD);
    }

    #[test]
    fn test_paywall_copy() {
        assert_eq!(
            Room::daily_standup().paywall().message,
            "Error: 10 POWCO required to attend daily meetings."
        );
        let club = Room::club().paywall();
        assert_eq!(club.message, "1000 Tokens required to enter the Video Chat.");
        assert_eq!(club.call_to_action, Some("JOIN THE CLUB"));
    }

    #[test]
    fn test_display_names() {
        let balance = Balance::from_raw(1_250_000_000);
        assert_eq!(
            Room::daily_standup().display_name_for(&identity(), &balance),
            "alice@relayx.io 12.5 POWCO"
        );
        assert_eq!(Room::club().display_name_for(&identity(), &balance), "alice@relayx.io");
    }

    #[test]
    fn test_embed_options_shape() {
        let (launcher, _) = launcher();
        let options = launcher.options_for(&Room::club(), &identity(), &Balance::ZERO);
        let value = serde_json::to_value(&options).unwrap();

        assert_eq!(value["roomName"], "be-the-broadcast-club-meeting-room");
        assert_eq!(value["width"], "100%");
        assert_eq!(value["height"], 700);
        assert_eq!(value["parentNode"], "#jitsi-daily-meeting");
        assert_eq!(value["lang"], "en");
        assert_eq!(value["userInfo"]["email"], "alice@relayx.io");
        assert_eq!(value["userInfo"]["avatarUrl"], "https://bitpic.network/u/alice@relayx.io");
        assert_eq!(value["configOverwrite"]["prejoinPageEnabled"], false);
        assert_eq!(value["configOverwrite"]["startWithAudioMuted"], true);
        assert_eq!(value["configOverwrite"]["startWithVideoMuted"], true);
    }

    #[test]
    fn test_enter_granted_mounts() {
        let (launcher, embed) = launcher();
        let balance = Balance::from_raw(150_000_000_000);
        let room = Room::club();

        let options = launcher
            .enter(&room, &identity(), &balance, evaluate(&balance, room.threshold))
            .unwrap();

        let mounted = embed.0.lock().unwrap();
        assert_eq!(mounted.len(), 1);
        assert_eq!(mounted[0].0, "meet.pow.co");
        assert_eq!(mounted[0].1, options);
    }

    #[test]
    fn test_enter_denied_never_mounts() {
        let (launcher, embed) = launcher();
        let balance = Balance::from_raw(250_000_000);
        let room = Room::daily_standup();

        let err = launcher
            .enter(&room, &identity(), &balance, evaluate(&balance, room.threshold))
            .unwrap_err();

        assert!(matches!(err, LaunchError::AccessDenied { required: 10, .. }));
        assert!(embed.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_launch_room_direct() {
        let (launcher, embed) = launcher();
        let options = launcher
            .launch_room("standup", "Alice", "alice@relayx.io", "https://bitpic.network/u/alice@relayx.io")
            .unwrap();
        assert_eq!(options.room_name, "standup");
        assert_eq!(options.user_info.display_name, "Alice");
        assert_eq!(embed.0.lock().unwrap().len(), 1);
    }
}
