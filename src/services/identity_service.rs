// src/services/identity_service.rs
//
// Resolves bearer credentials to caller identities. The credential itself is
// never inspected here; whatever the provider answers is trusted.
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing;

use crate::{
    errors::{RideError, RideResult},
    models::identity::{Identity, Role},
    utils::retry::RetryPolicy,
};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, bearer: &str) -> RideResult<Identity>;
}

/// Fixed token table, configured as `token=id:role,token=id:role`.
#[derive(Debug, Default, Clone)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    pub fn parse(table: &str) -> RideResult<Self> {
        let invalid = |reason: String| RideError::InvalidConfiguration {
            variable: "STATIC_TOKENS".to_string(),
            reason,
        };

        let mut provider = Self::new();
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (token, subject) = entry
                .split_once('=')
                .ok_or_else(|| invalid(format!("expected token=id:role, got '{}'", entry)))?;
            let (id, role) = subject
                .split_once(':')
                .ok_or_else(|| invalid(format!("expected id:role, got '{}'", subject)))?;
            let role: Role = role.parse().map_err(invalid)?;

            if token.trim().is_empty() || id.trim().is_empty() {
                return Err(invalid(format!("empty token or id in '{}'", entry)));
            }
            provider = provider.with_token(token.trim(), Identity::new(id.trim(), role));
        }
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, bearer: &str) -> RideResult<Identity> {
        self.tokens.get(bearer).cloned().ok_or(RideError::TokenInvalid)
    }
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    id: String,
    role: String,
}

/// Asks an external identity service who owns a bearer token.
pub struct HttpIdentityProvider {
    client: Client,
    url: String,
    retry: RetryPolicy,
}

impl HttpIdentityProvider {
    pub fn new(url: &str, timeout: Duration, retry: RetryPolicy) -> RideResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RideError::ConfigurationError(format!("failed to build identity client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            retry: retry.with_timeout(timeout),
        })
    }

    async fn lookup(&self, bearer: &str) -> RideResult<Identity> {
        let response = self.client.get(&self.url).bearer_auth(bearer).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                return Err(RideError::TokenInvalid);
            }
            status if !status.is_success() => {
                return Err(RideError::upstream(format!("identity provider returned {}", status)));
            }
            _ => {}
        }

        let body: IdentityResponse = response.json().await?;
        let role: Role = body.role.parse().map_err(|_| RideError::TokenInvalid)?;
        Ok(Identity::new(body.id, role))
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve(&self, bearer: &str) -> RideResult<Identity> {
        let identity = self
            .retry
            .run("identity.resolve", move || self.lookup(bearer))
            .await?;
        tracing::debug!("Resolved caller {} ({})", identity.id, identity.role);
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_table() {
        let provider =
            StaticIdentityProvider::parse("t-student=student-1:student, t-ops=ops-1:operator,").unwrap();
        assert_eq!(provider.len(), 2);

        let caller = provider.resolve("t-ops").await.unwrap();
        assert_eq!(caller, Identity::new("ops-1", Role::Operator));
        assert!(caller.is_operator());

        assert!(matches!(provider.resolve("t-unknown").await, Err(RideError::TokenInvalid)));
    }

    #[test]
    fn test_static_table_rejects_bad_entries() {
        assert!(StaticIdentityProvider::parse("").unwrap().is_empty());
        assert!(matches!(
            StaticIdentityProvider::parse("token-without-subject"),
            Err(RideError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            StaticIdentityProvider::parse("t=someone:pilot"),
            Err(RideError::InvalidConfiguration { .. })
        ));
    }
}
