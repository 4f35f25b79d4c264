//! OAuth2 client-credentials token management
//!
//! Owns acquisition and renewal of the provider access token. The cached
//! token is shared between the polling read path and the control write path;
//! renewal is coalesced to a single in-flight request so that concurrent
//! callers never produce parallel token calls for the same credentials.

use crate::api::ApiEndpoints;
use crate::config::CredentialsConfig;
use crate::error::{Result, VoltlinkError};
use crate::logging::get_logger;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::sync::Mutex;

/// Seconds before expiry at which a cached token is no longer handed out
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 300;

/// Fallback validity when the token response omits `expires_in`
const DEFAULT_TOKEN_VALIDITY_SECS: i64 = 3600;

const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A provider access token with its absolute expiry
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Whether the token may still be handed out at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - ChronoDuration::seconds(TOKEN_EXPIRY_MARGIN_SECS)
    }
}

/// Source of valid access tokens
///
/// Seam between the token cache and its consumers (refresh coordinator,
/// control dispatcher) so those can be tested without an OAuth endpoint.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a currently valid access token, renewing if necessary
    async fn access_token(&self) -> Result<String>;

    /// Drop the cached token so the next call performs a fresh renewal
    async fn invalidate(&self);
}

/// Token manager with cached client-credentials tokens
pub struct TokenManager {
    credentials: CredentialsConfig,
    endpoints: ApiEndpoints,
    http: reqwest::Client,
    cache: Mutex<Option<AccessToken>>,
    logger: crate::logging::StructuredLogger,
}

impl TokenManager {
    /// Create a new token manager for one set of credentials
    pub fn new(credentials: CredentialsConfig, endpoints: ApiEndpoints) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            credentials,
            endpoints,
            http,
            cache: Mutex::new(None),
            logger: get_logger("token"),
        })
    }

    /// Expiry of the currently cached token, if any
    pub async fn expiry(&self) -> Option<DateTime<Utc>> {
        self.cache.lock().await.as_ref().map(|t| t.expires_at)
    }

    /// Perform one client-credentials request against the token endpoint
    async fn renew(&self) -> Result<AccessToken> {
        let response = self
            .http
            .post(self.endpoints.oauth_token_url())
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoltlinkError::auth(format!(
                "Token endpoint returned {}",
                status
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VoltlinkError::auth(format!("Token response not valid JSON: {}", e)))?;

        let access_token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| VoltlinkError::auth("Token response missing access_token"))?
            .to_string();
        let validity_secs = body
            .get("expires_in")
            .and_then(|v| v.as_i64())
            .unwrap_or(DEFAULT_TOKEN_VALIDITY_SECS);

        Ok(AccessToken {
            access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(validity_secs),
        })
    }
}

#[async_trait]
impl TokenSource for TokenManager {
    async fn access_token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;

        if let Some(token) = cache.as_ref()
            && token.is_valid_at(Utc::now())
        {
            return Ok(token.access_token.clone());
        }

        // Renewal happens while holding the cache lock: concurrent callers in
        // an expired window all await this single request and read its result.
        self.logger.debug("Cached token missing or near expiry, renewing");
        match self.renew().await {
            Ok(token) => {
                self.logger.info(&format!(
                    "Access token renewed, valid until {}",
                    token.expires_at.to_rfc3339()
                ));
                let value = token.access_token.clone();
                *cache = Some(token);
                Ok(value)
            }
            Err(e) => {
                // A known-bad token must not linger in the cache
                *cache = None;
                self.logger.error(&format!("Token renewal failed: {}", e));
                Err(e)
            }
        }
    }

    async fn invalidate(&self) {
        let mut cache = self.cache.lock().await;
        if cache.take().is_some() {
            self.logger.debug("Cached token invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_validity_respects_margin() {
        let now = Utc::now();
        let token = AccessToken {
            access_token: "abc".to_string(),
            expires_at: now + ChronoDuration::seconds(3600),
        };

        assert!(token.is_valid_at(now));
        // Inside the renewal margin the token counts as expired
        assert!(!token.is_valid_at(now + ChronoDuration::seconds(3301)));
        assert!(!token.is_valid_at(now + ChronoDuration::seconds(3600)));
        assert!(token.is_valid_at(now + ChronoDuration::seconds(3299)));
    }
}
