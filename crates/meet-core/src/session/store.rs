// ============================================================================
// SessionStore - Persisted login state (redb)
// ============================================================================
// Flat string key/value table holding the wallet credential and its decoded
// claims under the same keys the web front-end kept in local storage.
// Default path: ~/.powco/session.redb (override via POWCO_SESSION_PATH env var)
// ============================================================================

use anyhow::{anyhow, Result};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::types::AuthClaims;

const LOCAL_STORAGE: TableDefinition<&str, &str> = TableDefinition::new("local_storage");

/// Where the shell lands after login when no route was recorded
pub const DEFAULT_ROUTE_ON_LOGIN: &str = "/meet";

/// Persisted key names
pub mod keys {
    pub const AUTH_TYPE: &str = "powco.auth.type";
    pub const RELAYX_TOKEN: &str = "powco.auth.relayx.token";
    pub const RELAYX_AUTH: &str = "powco.auth.relayx.auth";
    pub const RELAYX_PAYMAIL: &str = "powco.auth.relayx.paymail";
    pub const RELAYX_PUBKEY: &str = "powco.auth.relayx.pubkey";
    pub const RELAYX_ORIGIN: &str = "powco.auth.relayx.origin";
    pub const RELAYX_ISSUED_AT: &str = "powco.auth.relayx.issued_at";
    pub const USER_DATA: &str = "userData";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const ROUTE_ON_LOGIN: &str = "powco.auth.routeOnLogin";

    /// Everything removed on logout. The login route survives.
    pub const IDENTITY_KEYS: [&str; 10] = [
        AUTH_TYPE,
        RELAYX_TOKEN,
        RELAYX_AUTH,
        RELAYX_PAYMAIL,
        RELAYX_PUBKEY,
        RELAYX_ORIGIN,
        RELAYX_ISSUED_AT,
        USER_DATA,
        REFRESH_TOKEN,
        ACCESS_TOKEN,
    ];
}

pub const AUTH_TYPE_RELAYX: &str = "relayx";

/// Embedded key-value file backing the session
pub struct SessionStore {
    db: Database,
    path: PathBuf,
}

impl SessionStore {
    /// Open (or create) the store at the given path.
    /// If `path` is None, uses POWCO_SESSION_PATH env var or ~/.powco/session.redb
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            p.to_path_buf()
        } else if let Ok(env_path) = std::env::var("POWCO_SESSION_PATH") {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
            let powco_dir = home.join(".powco");
            std::fs::create_dir_all(&powco_dir)
                .map_err(|e| anyhow!("Failed to create .powco directory: {}", e))?;
            powco_dir.join("session.redb")
        };

        debug!("Opening session store at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open session store: {}", e))?;

        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(LOCAL_STORAGE)
                .map_err(|e| anyhow!("Failed to create session table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        Ok(Self { db, path: db_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Raw key/value access
    // ========================================================================

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(LOCAL_STORAGE)
            .map_err(|e| anyhow!("Failed to open session table: {}", e))?;

        let value = table
            .get(key)
            .map_err(|e| anyhow!("Failed to get {}: {}", key, e))?
            .map(|v| v.value().to_string());
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value.to_string())])
    }

    /// Write several keys in one transaction
    pub fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(LOCAL_STORAGE)
                .map_err(|e| anyhow!("Failed to open session table: {}", e))?;
            for (key, value) in entries {
                table.insert(*key, value.as_str())
                    .map_err(|e| anyhow!("Failed to insert {}: {}", key, e))?;
            }
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;
        Ok(())
    }

    /// Remove keys, returning how many existed
    pub fn remove_many(&self, keys: &[&str]) -> Result<usize> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let mut removed = 0;
        {
            let mut table = write_txn.open_table(LOCAL_STORAGE)
                .map_err(|e| anyhow!("Failed to open session table: {}", e))?;
            for key in keys {
                if table.remove(*key)
                    .map_err(|e| anyhow!("Failed to remove {}: {}", key, e))?
                    .is_some()
                {
                    removed += 1;
                }
            }
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;
        Ok(removed)
    }

    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(LOCAL_STORAGE)
            .map_err(|e| anyhow!("Failed to open session table: {}", e))?;

        let mut results = Vec::new();
        let iter = table.range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate session: {}", e))?;
        for entry in iter {
            let (key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            results.push((key.value().to_string(), value.value().to_string()));
        }
        Ok(results)
    }

    // ========================================================================
    // Login state
    // ========================================================================

    /// Persist a successful wallet login
    pub fn save_login(&self, token: &str, claims: &AuthClaims) -> Result<()> {
        let auth_json = serde_json::to_string(claims)
            .map_err(|e| anyhow!("Failed to serialize claims: {}", e))?;

        let mut user_data = serde_json::to_value(claims)
            .map_err(|e| anyhow!("Failed to serialize user data: {}", e))?;
        if let Some(obj) = user_data.as_object_mut() {
            obj.insert("email".to_string(), claims.paymail.clone().into());
            obj.insert("role".to_string(), AUTH_TYPE_RELAYX.into());
        }

        self.set_many(&[
            (keys::AUTH_TYPE, AUTH_TYPE_RELAYX.to_string()),
            (keys::RELAYX_TOKEN, token.to_string()),
            (keys::RELAYX_AUTH, auth_json),
            (keys::RELAYX_PAYMAIL, claims.paymail.clone()),
            (keys::RELAYX_PUBKEY, claims.pubkey.clone()),
            (keys::RELAYX_ORIGIN, claims.origin.clone()),
            (keys::RELAYX_ISSUED_AT, claims.issued_at.as_stored()),
            (keys::USER_DATA, user_data.to_string()),
            (keys::REFRESH_TOKEN, token.to_string()),
            (keys::ACCESS_TOKEN, token.to_string()),
        ])?;

        info!("Persisted login for {}", claims.paymail);
        Ok(())
    }

    /// Raw credential from the last login
    pub fn token(&self) -> Result<Option<String>> {
        match self.get(keys::RELAYX_TOKEN)? {
            Some(token) => Ok(Some(token)),
            None => self.get(keys::ACCESS_TOKEN),
        }
    }

    /// Decoded claims from the last login; None if missing or unreadable
    pub fn claims(&self) -> Result<Option<AuthClaims>> {
        let Some(raw) = self.get(keys::RELAYX_AUTH)? else {
            return Ok(None);
        };
        match serde_json::from_str::<AuthClaims>(&raw) {
            Ok(claims) => Ok(Some(claims)),
            Err(e) => {
                warn!("Stored auth claims unreadable: {}", e);
                Ok(None)
            }
        }
    }

    /// Remove everything tied to the signed-in identity
    pub fn clear_login(&self) -> Result<usize> {
        let removed = self.remove_many(&keys::IDENTITY_KEYS)?;
        info!("Cleared {} session keys", removed);
        Ok(removed)
    }

    // ========================================================================
    // Post-login route
    // ========================================================================

    /// Remember where to go once login completes
    pub fn set_route_on_login(&self, route: &str) -> Result<()> {
        self.set(keys::ROUTE_ON_LOGIN, route)
    }

    /// Recorded route (falling back to the default). The stored value is
    /// reset to the default so it is only used once.
    pub fn take_route_on_login(&self) -> Result<String> {
        match self.get(keys::ROUTE_ON_LOGIN)? {
            Some(route) if !route.is_empty() => {
                self.set(keys::ROUTE_ON_LOGIN, DEFAULT_ROUTE_ON_LOGIN)?;
                Ok(route)
            }
            _ => Ok(DEFAULT_ROUTE_ON_LOGIN.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::IssuedAt;

    fn claims() -> AuthClaims {
        AuthClaims {
            paymail: "alice@relayx.io".into(),
            pubkey: "02ab".into(),
            origin: "meet.pow.co".into(),
            issued_at: IssuedAt::Text("2022-04-15T05:20:00Z".into()),
        }
    }

    fn temp_store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.redb");
        let store = SessionStore::open(Some(path.as_path())).unwrap();
        (dir, store)
    }

    #[test]
    fn test_save_login_writes_all_keys() {
        let (_dir, store) = temp_store();
        store.save_login("payload.sig", &claims()).unwrap();

        assert_eq!(store.get(keys::AUTH_TYPE).unwrap().as_deref(), Some("relayx"));
        assert_eq!(store.get(keys::RELAYX_PAYMAIL).unwrap().as_deref(), Some("alice@relayx.io"));
        assert_eq!(store.get(keys::RELAYX_PUBKEY).unwrap().as_deref(), Some("02ab"));
        assert_eq!(store.get(keys::RELAYX_ORIGIN).unwrap().as_deref(), Some("meet.pow.co"));
        assert_eq!(
            store.get(keys::RELAYX_ISSUED_AT).unwrap().as_deref(),
            Some("2022-04-15T05:20:00Z")
        );
        assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap().as_deref(), Some("payload.sig"));
        assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap().as_deref(), Some("payload.sig"));

        let user_data: serde_json::Value =
            serde_json::from_str(&store.get(keys::USER_DATA).unwrap().unwrap()).unwrap();
        assert_eq!(user_data["email"], "alice@relayx.io");
        assert_eq!(user_data["role"], "relayx");
        assert_eq!(user_data["pubkey"], "02ab");
    }

    #[test]
    fn test_login_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.redb");
        {
            let store = SessionStore::open(Some(path.as_path())).unwrap();
            store.save_login("payload.sig", &claims()).unwrap();
        }

        let store = SessionStore::open(Some(path.as_path())).unwrap();
        assert_eq!(store.claims().unwrap(), Some(claims()));
        assert_eq!(store.token().unwrap().as_deref(), Some("payload.sig"));
    }

    #[test]
    fn test_clear_login_keeps_route() {
        let (_dir, store) = temp_store();
        store.save_login("payload.sig", &claims()).unwrap();
        store.set_route_on_login("/daily-standup").unwrap();

        assert_eq!(store.clear_login().unwrap(), keys::IDENTITY_KEYS.len());
        assert!(store.claims().unwrap().is_none());
        assert!(store.token().unwrap().is_none());
        assert_eq!(
            store.get(keys::ROUTE_ON_LOGIN).unwrap().as_deref(),
            Some("/daily-standup")
        );
    }

    #[test]
    fn test_route_on_login_used_once() {
        let (_dir, store) = temp_store();
        assert_eq!(store.take_route_on_login().unwrap(), DEFAULT_ROUTE_ON_LOGIN);

        store.set_route_on_login("/daily-standup").unwrap();
        assert_eq!(store.take_route_on_login().unwrap(), "/daily-standup");
        assert_eq!(store.take_route_on_login().unwrap(), DEFAULT_ROUTE_ON_LOGIN);
    }

    #[test]
    fn test_unreadable_claims_are_ignored() {
        let (_dir, store) = temp_store();
        store.set(keys::RELAYX_AUTH, "{not json").unwrap();
        assert!(store.claims().unwrap().is_none());
    }

    #[test]
    fn test_entries_sorted_by_key() {
        let (_dir, store) = temp_store();
        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();
        let entries = store.entries().unwrap();
        assert_eq!(entries, vec![("a".into(), "1".into()), ("b".into(), "2".into())]);
    }
}
