//! ============================================================================
//! Configuration - Endpoints, timeouts and paths from the environment
//! ============================================================================
//! | Variable                    | Default                                     |
//! |-----------------------------|---------------------------------------------|
//! | `POWCO_REGISTRY_URL`        | `https://staging-backend.relayx.com/api`    |
//! | `POWCO_TOKEN_ID`            | club token id                               |
//! | `POWCO_MARKET_URL`          | `https://relayx.com/market`                 |
//! | `POWCO_MEET_DOMAIN`         | `meet.pow.co`                               |
//! | `POWCO_EMBED_SCRIPT_URL`    | `https://meet.jit.si/external_api.js`       |
//! | `POWCO_AVATAR_BASE_URL`     | `https://bitpic.network/u`                  |
//! | `POWCO_LOOKUP_TIMEOUT_SECS` | `10`                                        |
//! | `POWCO_AUTH_TIMEOUT_SECS`   | `300`                                       |
//! | `POWCO_CALLBACK_PORT`       | `9877`                                      |
//! | `POWCO_SESSION_PATH`        | `~/.powco/session.redb`                     |
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::access::POWCO_TOKEN_ID;
use crate::auth::DEFAULT_CALLBACK_PORT;

pub const DEFAULT_REGISTRY_URL: &str = "https://staging-backend.relayx.com/api";
pub const DEFAULT_MARKET_URL: &str = "https://relayx.com/market";
pub const DEFAULT_MEET_DOMAIN: &str = "meet.pow.co";
pub const DEFAULT_EMBED_SCRIPT_URL: &str = "https://meet.jit.si/external_api.js";
pub const DEFAULT_AVATAR_BASE_URL: &str = "https://bitpic.network/u";
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetConfig {
    pub registry_url: String,
    pub token_id: String,
    pub market_url: String,
    pub meet_domain: String,
    pub embed_script_url: String,
    pub avatar_base_url: String,
    pub lookup_timeout_secs: u64,
    pub auth_timeout_secs: u64,
    pub callback_port: u16,
    /// None lets the session store pick its default location
    pub session_path: Option<PathBuf>,
}

impl Default for MeetConfig {
    fn default() -> Self {
        Self {
            registry_url: env_or("POWCO_REGISTRY_URL", DEFAULT_REGISTRY_URL),
            token_id: env_or("POWCO_TOKEN_ID", POWCO_TOKEN_ID),
            market_url: env_or("POWCO_MARKET_URL", DEFAULT_MARKET_URL),
            meet_domain: env_or("POWCO_MEET_DOMAIN", DEFAULT_MEET_DOMAIN),
            embed_script_url: env_or("POWCO_EMBED_SCRIPT_URL", DEFAULT_EMBED_SCRIPT_URL),
            avatar_base_url: env_or("POWCO_AVATAR_BASE_URL", DEFAULT_AVATAR_BASE_URL),
            lookup_timeout_secs: env_parse("POWCO_LOOKUP_TIMEOUT_SECS", DEFAULT_LOOKUP_TIMEOUT_SECS),
            auth_timeout_secs: env_parse("POWCO_AUTH_TIMEOUT_SECS", DEFAULT_AUTH_TIMEOUT_SECS),
            callback_port: env_parse("POWCO_CALLBACK_PORT", DEFAULT_CALLBACK_PORT),
            session_path: std::env::var("POWCO_SESSION_PATH").ok().map(PathBuf::from),
        }
    }
}

impl MeetConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    /// Market page where the token can be bought
    pub fn market_link(&self) -> String {
        format!("{}/{}", self.market_url.trim_end_matches('/'), self.token_id)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {}={}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_link() {
        let config = MeetConfig {
            market_url: "https://relayx.com/market/".to_string(),
            token_id: "tok_o2".to_string(),
            ..MeetConfig::default()
        };
        assert_eq!(config.market_link(), "https://relayx.com/market/tok_o2");
    }

    #[test]
    fn test_env_parse_fallback() {
        std::env::set_var("POWCO_TEST_PARSE_BAD", "soon");
        std::env::set_var("POWCO_TEST_PARSE_GOOD", " 42 ");
        assert_eq!(env_parse("POWCO_TEST_PARSE_BAD", 7u64), 7);
        assert_eq!(env_parse("POWCO_TEST_PARSE_GOOD", 7u64), 42);
        assert_eq!(env_parse("POWCO_TEST_PARSE_MISSING", 9u16), 9);
    }
}
