//! ============================================================================
//! Embed Clients - Getting a Jitsi room in front of the user
//! ============================================================================
//! - BrowserEmbed: opens the room URL with config in the URL fragment
//! - HostPageEmbed: writes a page that mounts `JitsiMeetExternalAPI`
//! ============================================================================

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::EmbedOptions;
use crate::error::LaunchError;

/// Element the embed iframe is mounted into
pub const EMBED_PARENT_SELECTOR: &str = "#jitsi-daily-meeting";

/// Something that can mount a room on a Jitsi domain
pub trait EmbedClient: Send + Sync {
    fn mount(&self, domain: &str, options: &EmbedOptions) -> Result<(), LaunchError>;
}

/// Opens `https://<domain>/<room>#<config>` in the default browser
pub struct BrowserEmbed;

impl BrowserEmbed {
    /// Room URL carrying the embed options as Jitsi fragment parameters
    pub fn room_url(domain: &str, options: &EmbedOptions) -> String {
        let params = [
            ("config.prejoinPageEnabled", options.config_overwrite.prejoin_page_enabled.to_string()),
            ("config.startWithAudioMuted", options.config_overwrite.start_with_audio_muted.to_string()),
            ("config.startWithVideoMuted", options.config_overwrite.start_with_video_muted.to_string()),
            ("config.defaultLanguage", json_string(&options.lang)),
            ("userInfo.displayName", json_string(&options.user_info.display_name)),
            ("userInfo.email", json_string(&options.user_info.email)),
        ];

        let fragment = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!(
            "https://{}/{}#{}",
            domain,
            urlencoding::encode(&options.room_name),
            fragment
        )
    }
}

fn json_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

impl EmbedClient for BrowserEmbed {
    fn mount(&self, domain: &str, options: &EmbedOptions) -> Result<(), LaunchError> {
        let url = Self::room_url(domain, options);
        debug!("Opening room URL {}", url);
        open::that(&url).map_err(|e| LaunchError::Embed(format!("failed to open browser: {}", e)))
    }
}

/// Writes an HTML host page that loads the external API script
pub struct HostPageEmbed {
    path: PathBuf,
    script_url: String,
    open_browser: bool,
}

impl HostPageEmbed {
    pub fn new(path: impl Into<PathBuf>, script_url: &str) -> Self {
        Self {
            path: path.into(),
            script_url: script_url.to_string(),
            open_browser: false,
        }
    }

    /// Open the written page in the default browser
    pub fn and_open(mut self) -> Self {
        self.open_browser = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn render(&self, domain: &str, options: &EmbedOptions) -> Result<String, LaunchError> {
        let options_json = serde_json::to_string_pretty(options)
            .map_err(|e| LaunchError::Embed(format!("failed to encode options: {}", e)))?
            .replace("</", "<\\/");

        Ok(format!(
            r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
    <meta charset="utf-8">
    <title>{room}</title>
    <script src="{script}"></script>
</head>
<body>
    <div id="{parent_id}"></div>
    <script>
        const options = {options};
        options.parentNode = document.querySelector(options.parentNode);
        new JitsiMeetExternalAPI({domain}, options);
    </script>
</body>
</html>
"#,
            lang = options.lang,
            room = options.room_name,
            script = self.script_url,
            parent_id = options.parent_node.trim_start_matches('#'),
            options = options_json,
            domain = json_string(domain),
        ))
    }
}

impl EmbedClient for HostPageEmbed {
    fn mount(&self, domain: &str, options: &EmbedOptions) -> Result<(), LaunchError> {
        let page = self.render(domain, options)?;
        std::fs::write(&self.path, page).map_err(|e| {
            LaunchError::Embed(format!("failed to write {}: {}", self.path.display(), e))
        })?;
        info!("Wrote room page to {}", self.path.display());

        if self.open_browser {
            if let Err(e) = open::that(&self.path) {
                warn!("Could not open {}: {}", self.path.display(), e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> EmbedOptions {
        EmbedOptions::new(
            "powco-holders-daily-meeting",
            "alice@relayx.io 12.5 POWCO".to_string(),
            "alice@relayx.io".to_string(),
            "https://bitpic.network/u/alice@relayx.io".to_string(),
        )
    }

    #[test]
    fn test_room_url_fragment() {
        let url = BrowserEmbed::room_url("meet.pow.co", &options());

        assert!(url.starts_with("https://meet.pow.co/powco-holders-daily-meeting#"));
        assert!(url.contains("config.prejoinPageEnabled=false"));
        assert!(url.contains("config.startWithAudioMuted=true"));
        assert!(url.contains("config.startWithVideoMuted=true"));
        assert!(url.contains("userInfo.displayName=%22alice%40relayx.io%2012.5%20POWCO%22"));
    }

    #[test]
    fn test_host_page_written() {
        let dir = tempfile::tempdir().unwrap();
        let embed = HostPageEmbed::new(dir.path().join("room.html"), "https://meet.jit.si/external_api.js");

        embed.mount("meet.pow.co", &options()).unwrap();
        let page = std::fs::read_to_string(embed.path()).unwrap();

        assert!(page.contains(r#"<script src="https://meet.jit.si/external_api.js"></script>"#));
        assert!(page.contains(r#"<div id="jitsi-daily-meeting"></div>"#));
        assert!(page.contains(r#"new JitsiMeetExternalAPI("meet.pow.co", options)"#));
        assert!(page.contains(r#""roomName": "powco-holders-daily-meeting""#));
        assert!(page.contains(r#""startWithVideoMuted": true"#));
    }

    #[test]
    fn test_host_page_escapes_script_close() {
        let mut opts = options();
        opts.user_info.display_name = "</script><b>".to_string();
        let embed = HostPageEmbed::new("unused.html", "https://meet.jit.si/external_api.js");

        let page = embed.render("meet.pow.co", &opts).unwrap();
        assert!(!page.contains("</script><b>"));
    }
}
