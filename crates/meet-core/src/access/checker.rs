//! ============================================================================
//! Balance Checker - Token holdings from the ownership registry
//! ============================================================================
//! Queries the registry owners list and derives the identity's balance.
//! Lookup failures surface as LookupError; they are never read as zero.
//! ============================================================================

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::types::Balance;
use crate::error::LookupError;
use crate::session::Identity;

/// One holder in the registry owners list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OwnerEntry {
    pub paymail: String,
    /// Smallest token units
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
struct OwnersResponse {
    data: OwnersData,
}

#[derive(Debug, Deserialize)]
struct OwnersData {
    owners: Vec<OwnerEntry>,
}

/// Validate a raw registry body against `{data: {owners: [{paymail, amount}]}}`
pub fn parse_owners(body: &[u8]) -> Result<Vec<OwnerEntry>, LookupError> {
    let parsed: OwnersResponse =
        serde_json::from_slice(body).map_err(|e| LookupError::Schema(e.to_string()))?;
    Ok(parsed.data.owners)
}

/// Source of token ownership records
#[async_trait]
pub trait OwnershipRegistry: Send + Sync {
    async fn owners(&self) -> Result<Vec<OwnerEntry>, LookupError>;
}

/// RelayX token owners endpoint
pub struct RelayxRegistry {
    client: Client,
    owners_url: String,
    timeout_secs: u64,
}

impl RelayxRegistry {
    /// `base_url` is the API root, e.g. `https://staging-backend.relayx.com/api`
    pub fn new(base_url: &str, token_id: &str, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            owners_url: format!("{}/token/{}/owners", base_url.trim_end_matches('/'), token_id),
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn owners_url(&self) -> &str {
        &self.owners_url
    }
}

#[async_trait]
impl OwnershipRegistry for RelayxRegistry {
    async fn owners(&self) -> Result<Vec<OwnerEntry>, LookupError> {
        debug!("Fetching token owners from {}", self.owners_url);

        let response = self
            .client
            .get(&self.owners_url)
            .send()
            .await
            .map_err(|e| LookupError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LookupError::from_reqwest(e, self.timeout_secs))?;

        let owners = parse_owners(&body)?;
        debug!("Registry returned {} owners", owners.len());
        Ok(owners)
    }
}

/// Derives an identity's balance from a registry
pub struct BalanceChecker<R> {
    registry: R,
}

impl<R: OwnershipRegistry> BalanceChecker<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    /// Balance of the first owner entry matching the paymail; 0 when absent
    pub async fn fetch_balance(&self, identity: &Identity) -> Result<Balance, LookupError> {
        let owners = self.registry.owners().await?;

        let balance = owners
            .iter()
            .find(|owner| identity.matches_paymail(&owner.paymail))
            .map(|owner| Balance::from_raw(owner.amount))
            .unwrap_or(Balance::ZERO);

        info!("Token balance for {}: {}", identity.paymail, balance);
        Ok(balance)
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }
}

#[async_trait]
impl<T: OwnershipRegistry + ?Sized> OwnershipRegistry for std::sync::Arc<T> {
    async fn owners(&self) -> Result<Vec<OwnerEntry>, LookupError> {
        (**self).owners().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AuthClaims, IssuedAt};
    use tiny_http::{Response, Server};

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

    struct FixedRegistry(Vec<OwnerEntry>);

    #[async_trait]
    impl OwnershipRegistry for FixedRegistry {
        async fn owners(&self) -> Result<Vec<OwnerEntry>, LookupError> {
            Ok(self.0.clone())
        }
    }

    fn owner(paymail: &str, amount: u64) -> OwnerEntry {
        OwnerEntry { paymail: paymail.to_string(), amount }
    }

    /// Serve one request with the given status and body, returning the API root
    fn serve_once(status: u16, body: &'static str) -> String {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let _ = request.respond(Response::from_string(body).with_status_code(status));
            }
        });
        format!("http://{}/api", addr)
    }

    #[test]
    fn test_parse_owners() {
        let body = br#"{"data":{"owners":[{"paymail":"a@relayx.io","amount":250000000,"extra":1}]},"code":200}"#;
        let owners = parse_owners(body).unwrap();
        assert_eq!(owners, vec![owner("a@relayx.io", 250_000_000)]);
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        let bad: [&[u8]; 5] = [
            br#"{"owners":[]}"#,
            br#"{"data":{}}"#,
            br#"{"data":{"owners":[{"paymail":"a@relayx.io","amount":"12"}]}}"#,
            br#"{"data":{"owners":[{"paymail":"a@relayx.io","amount":-5}]}}"#,
            b"<html>gateway</html>",
        ];
        for body in bad {
            assert!(matches!(parse_owners(body), Err(LookupError::Schema(_))));
        }
    }

    #[tokio::test]
    async fn test_balance_from_matching_owner() {
        let checker = BalanceChecker::new(FixedRegistry(vec![
            owner("bob@relayx.io", 5),
            owner("alice@relayx.io", 150_000_000_000),
            owner("alice@relayx.io", 1),
        ]));
        let balance = checker.fetch_balance(&identity("alice@relayx.io")).await.unwrap();
        assert_eq!(balance.amount(), 1500.0);
    }

    #[tokio::test]
    async fn test_no_matching_owner_is_zero() {
        let checker = BalanceChecker::new(FixedRegistry(vec![owner("bob@relayx.io", 5)]));
        let balance = checker.fetch_balance(&identity("alice@relayx.io")).await.unwrap();
        assert!(balance.is_zero());
    }

    #[tokio::test]
    async fn test_relayx_registry_over_http() {
        let base = serve_once(200, r#"{"data":{"owners":[{"paymail":"alice@relayx.io","amount":250000000}]}}"#);
        let registry = RelayxRegistry::new(&base, "tok_o2", Duration::from_secs(5)).unwrap();
        assert!(registry.owners_url().ends_with("/api/token/tok_o2/owners"));

        let balance = BalanceChecker::new(registry)
            .fetch_balance(&identity("alice@relayx.io"))
            .await
            .unwrap();
        assert_eq!(balance.amount(), 2.5);
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        let base = serve_once(503, "unavailable");
        let registry = RelayxRegistry::new(&base, "tok_o2", Duration::from_secs(5)).unwrap();
        let err = BalanceChecker::new(registry)
            .fetch_balance(&identity("alice@relayx.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Status(503)));
    }

    #[tokio::test]
    async fn test_hung_registry_times_out() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                std::thread::sleep(Duration::from_secs(3));
                let _ = request.respond(Response::from_string("{}"));
            }
        });

        let base = format!("http://{}/api", addr);
        let registry = RelayxRegistry::new(&base, "tok_o2", Duration::from_millis(300)).unwrap();
        let err = registry.owners().await.unwrap_err();
        assert!(matches!(err, LookupError::Timeout(_)));
    }
}
