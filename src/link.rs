//! Account-linking helpers
//!
//! One-time operations used while connecting a vehicle-manufacturer account
//! to the provider: creating a link session the user completes in a browser,
//! and listing the vehicles available on the account afterwards. Both share
//! the Token Manager and environment switch with the polling core but run
//! outside it.

use crate::api::ApiEndpoints;
use crate::error::{Result, VoltlinkError};
use crate::logging::get_logger;
use crate::token::TokenSource;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const LINK_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters for a link session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSessionRequest {
    /// Vendor category to link, e.g. "vehicle"
    pub vendor_type: String,

    /// Requested data scopes
    pub scopes: Vec<String>,

    /// UI language for the provider's linking pages
    pub language: String,

    /// Where the provider redirects after linking completes
    pub redirect_uri: String,
}

/// One vehicle as listed during setup
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSummary {
    pub id: String,
    pub display_name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
}

/// Client for the linking endpoints
pub struct LinkClient {
    endpoints: ApiEndpoints,
    tokens: Arc<dyn TokenSource>,
    http: reqwest::Client,
    logger: crate::logging::StructuredLogger,
}

impl LinkClient {
    pub fn new(endpoints: ApiEndpoints, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(LINK_TIMEOUT).build()?;
        Ok(Self {
            endpoints,
            tokens,
            http,
            logger: get_logger("link"),
        })
    }

    /// Create a link session and return the URL the user must visit
    pub async fn create_link_session(
        &self,
        user_id: &str,
        request: &LinkSessionRequest,
    ) -> Result<String> {
        let token = self.tokens.access_token().await?;
        let url = self.endpoints.user_link_url(user_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoltlinkError::api(format!(
                "Link session request returned {}",
                status
            )));
        }

        let body: serde_json::Value = response.json().await?;
        let link_url = body
            .get("linkUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| VoltlinkError::api("Link session response missing linkUrl"))?;

        self.logger
            .info(&format!("Created link session for user {}", user_id));
        Ok(link_url.to_string())
    }

    /// List vehicles on the linked account, for vehicle selection at setup
    pub async fn list_vehicles(&self, user_id: &str) -> Result<Vec<VehicleSummary>> {
        let token = self.tokens.access_token().await?;
        let url = self.endpoints.user_vehicles_url(user_id);

        let response = self.http.get(&url).bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoltlinkError::api(format!(
                "Vehicle listing returned {}",
                status
            )));
        }

        let body: serde_json::Value = response.json().await?;
        let vehicles = body
            .get("data")
            .and_then(|d| d.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let id = entry.get("id").and_then(|v| v.as_str())?.to_string();
                        let info = entry.get("information");
                        Some(VehicleSummary {
                            id,
                            display_name: info_field(info, "displayName"),
                            brand: info_field(info, "brand"),
                            model: info_field(info, "model"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(vehicles)
    }
}

fn info_field(info: Option<&serde_json::Value>, key: &str) -> Option<String> {
    info.and_then(|i| i.get(key))
        .and_then(|v| v.as_str())
        .map(String::from)
}
