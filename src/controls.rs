//! Charging control dispatch
//!
//! Translates user-triggered actions into authenticated write calls against
//! the provider. The dispatcher shares the token cache with the read path
//! but none of its scheduling state, so commands go out even while the
//! coordinator is refreshing or backing off. State changes become visible
//! through a later poll cycle; the shared snapshot is never touched here.

use crate::api::ApiEndpoints;
use crate::error::{Result, VoltlinkError};
use crate::logging::get_logger;
use crate::token::TokenSource;
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const CONTROL_TIMEOUT: Duration = Duration::from_secs(15);

/// Charging command accepted by the provider's charging endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeAction {
    Start,
    Stop,
}

impl ChargeAction {
    /// Wire representation expected by the provider
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Stop => "STOP",
        }
    }
}

/// Dispatcher for vehicle control commands
pub struct ControlDispatcher {
    endpoints: ApiEndpoints,
    tokens: Arc<dyn TokenSource>,
    http: reqwest::Client,
    logger: crate::logging::StructuredLogger,
}

impl ControlDispatcher {
    /// Create a dispatcher sharing the given token source
    pub fn new(endpoints: ApiEndpoints, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(CONTROL_TIMEOUT)
            .build()?;
        Ok(Self {
            endpoints,
            tokens,
            http,
            logger: get_logger("controls"),
        })
    }

    /// Start or stop charging for one vehicle
    pub async fn set_charging(&self, vehicle_id: &str, action: ChargeAction) -> Result<()> {
        let url = self.endpoints.vehicle_charging_url(vehicle_id);
        self.logger.info(&format!(
            "Sending {} charging command for {}",
            action.as_str(),
            vehicle_id
        ));
        self.post_command(&url, json!({ "action": action.as_str() }))
            .await
    }

    /// Convenience wrapper for [`ChargeAction::Start`]
    pub async fn start_charging(&self, vehicle_id: &str) -> Result<()> {
        self.set_charging(vehicle_id, ChargeAction::Start).await
    }

    /// Convenience wrapper for [`ChargeAction::Stop`]
    pub async fn stop_charging(&self, vehicle_id: &str) -> Result<()> {
        self.set_charging(vehicle_id, ChargeAction::Stop).await
    }

    /// Enable or disable the provider's smart charging policy
    pub async fn set_smart_charging(&self, vehicle_id: &str, enabled: bool) -> Result<()> {
        let url = self.endpoints.vehicle_smart_charging_url(vehicle_id);
        self.logger.info(&format!(
            "Setting smart charging to {} for {}",
            enabled, vehicle_id
        ));
        self.post_command(&url, json!({ "isEnabled": enabled }))
            .await
    }

    async fn post_command(&self, url: &str, body: serde_json::Value) -> Result<()> {
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            // Same discipline as the read path: do not reuse a rejected token
            self.tokens.invalidate().await;
            return Err(VoltlinkError::control(format!(
                "Command rejected with {}",
                status
            )));
        }

        if status == StatusCode::BAD_REQUEST {
            // The provider explains command rejections in the body
            let reason = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|b| {
                    b.get("message")
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or_else(|| "Unknown error".to_string());
            self.logger
                .warn(&format!("Provider declined command: {}", reason));
            return Err(VoltlinkError::control(reason));
        }

        Err(VoltlinkError::control(format!(
            "Provider returned {}",
            status
        )))
    }
}
