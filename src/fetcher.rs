//! Vehicle data fetching against the provider's read endpoints
//!
//! One fetch is one authenticated read of the linked user's vehicle list,
//! narrowed to the configured vehicle. HTTP and transport failures are
//! folded into the [`FetchOutcome`] taxonomy here so the coordinator only
//! deals with typed outcomes, never raw HTTP errors.

use crate::api::ApiEndpoints;
use crate::logging::{LogContext, get_logger_with_context};
use crate::snapshot::VehicleSnapshot;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of one refresh attempt
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Payload received and parsed
    Success(VehicleSnapshot),

    /// Provider rejected the access token (401/403)
    AuthFailure,

    /// Provider asked us to back off (429)
    RateLimited { retry_after: Option<Duration> },

    /// Connectivity problem, timeout or provider-side failure (5xx)
    TransientNetworkError(String),

    /// Request the provider will keep rejecting as-is (other 4xx)
    PermanentClientError(String),
}

/// Read access to one vehicle's provider state
///
/// The coordinator depends on this trait so its state machine can be tested
/// with scripted outcomes instead of a live provider.
#[async_trait]
pub trait VehicleFetch: Send + Sync {
    /// Fetch the configured vehicle's current state
    async fn fetch(&self, access_token: &str) -> FetchOutcome;
}

/// Fetcher for the Enode vehicle read endpoints
pub struct EnodeFetcher {
    endpoints: ApiEndpoints,
    user_id: String,
    vehicle_id: String,
    http: reqwest::Client,
    logger: crate::logging::StructuredLogger,
}

impl EnodeFetcher {
    /// Create a fetcher bound to one user/vehicle pair
    pub fn new(
        endpoints: ApiEndpoints,
        user_id: String,
        vehicle_id: String,
    ) -> crate::error::Result<Self> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        let logger =
            get_logger_with_context(LogContext::new("fetcher").with_vehicle_id(vehicle_id.clone()));
        Ok(Self {
            endpoints,
            user_id,
            vehicle_id,
            http,
            logger,
        })
    }
}

#[async_trait]
impl VehicleFetch for EnodeFetcher {
    async fn fetch(&self, access_token: &str) -> FetchOutcome {
        let url = self.endpoints.user_vehicles_url(&self.user_id);
        self.logger.debug(&format!("Fetching vehicle state from {}", url));

        let response = match self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // Timeouts and connection errors are both transient blips
                return FetchOutcome::TransientNetworkError(e.to_string());
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.logger
                .warn(&format!("Provider rejected token: {}", status));
            return FetchOutcome::AuthFailure;
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return FetchOutcome::RateLimited { retry_after };
        }
        if status.is_server_error() {
            return FetchOutcome::TransientNetworkError(format!("Provider returned {}", status));
        }
        if !status.is_success() {
            return FetchOutcome::PermanentClientError(format!("Provider returned {}", status));
        }

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                return FetchOutcome::TransientNetworkError(format!("Invalid JSON body: {}", e));
            }
        };
        self.extract_vehicle(&body)
    }
}

impl EnodeFetcher {
    /// Select the configured vehicle from the listing payload
    fn extract_vehicle(&self, body: &serde_json::Value) -> FetchOutcome {
        let vehicle = body
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|vehicles| {
                vehicles
                    .iter()
                    .find(|v| {
                        v.get("id").and_then(|id| id.as_str()) == Some(self.vehicle_id.as_str())
                    })
            });

        match vehicle {
            Some(payload) => {
                let snapshot = VehicleSnapshot::from_payload(payload, Utc::now());
                self.logger.debug(&format!(
                    "Fetched vehicle state: reachable={:?} battery={:?}",
                    snapshot.is_reachable, snapshot.battery_level
                ));
                FetchOutcome::Success(snapshot)
            }
            None => FetchOutcome::PermanentClientError(format!(
                "Vehicle {} not found in provider response",
                self.vehicle_id
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_debug_representation_names_variant() {
        let outcome = FetchOutcome::RateLimited {
            retry_after: Some(Duration::from_secs(120)),
        };
        assert!(format!("{:?}", outcome).contains("RateLimited"));
    }
}
