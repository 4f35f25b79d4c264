//! Enode API surface: environments and endpoint construction
//!
//! The provider runs separate production and sandbox deployments with
//! distinct hostnames. Everything that talks to the provider derives its
//! URLs from here so that the environment switch stays in one place.

use serde::{Deserialize, Serialize};

/// Enode deployment selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    /// Hostname segment shared by the API and OAuth hosts
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Sandbox => "sandbox",
        }
    }
}

/// Resolved endpoint URLs for one environment
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    api_base: String,
    oauth_token_url: String,
}

impl ApiEndpoints {
    /// Derive endpoints from an environment
    pub fn for_environment(environment: Environment) -> Self {
        let domain = environment.as_str();
        Self {
            api_base: format!("https://enode-api.{}.enode.io", domain),
            oauth_token_url: format!("https://oauth.{}.enode.io/oauth2/token", domain),
        }
    }

    /// Explicit base URLs, for self-hosted gateways and tests
    pub fn custom<S: Into<String>>(api_base: S, oauth_token_url: S) -> Self {
        Self {
            api_base: api_base.into(),
            oauth_token_url: oauth_token_url.into(),
        }
    }

    /// Client-credentials token endpoint
    pub fn oauth_token_url(&self) -> &str {
        &self.oauth_token_url
    }

    /// Vehicle listing for a linked user
    pub fn user_vehicles_url(&self, user_id: &str) -> String {
        format!("{}/users/{}/vehicles", self.api_base, user_id)
    }

    /// Charging command endpoint for one vehicle (START and STOP share it)
    pub fn vehicle_charging_url(&self, vehicle_id: &str) -> String {
        format!("{}/vehicles/{}/charging", self.api_base, vehicle_id)
    }

    /// Smart charging policy endpoint for one vehicle
    pub fn vehicle_smart_charging_url(&self, vehicle_id: &str) -> String {
        format!("{}/vehicles/{}/smart-charging", self.api_base, vehicle_id)
    }

    /// One-time account-linking session endpoint
    pub fn user_link_url(&self, user_id: &str) -> String {
        format!("{}/users/{}/link", self.api_base, user_id)
    }
}
