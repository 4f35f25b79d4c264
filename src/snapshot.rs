//! Last-known-good vehicle state
//!
//! A [`VehicleSnapshot`] is the unit of data the refresh coordinator hands
//! to its dependents. Fields the provider did not include in a payload stay
//! `None` ("unavailable") so that an unsupported reading is never presented
//! as a zero or `false` value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// GPS position as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Static vehicle identification data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VehicleInfo {
    pub display_name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i64>,
    pub vin: Option<String>,
}

/// Provider-reported command capabilities
///
/// A capability the payload does not advertise counts as absent, matching
/// the provider's own capability gating for control surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Capabilities {
    pub start_charging: bool,
    pub smart_charging: bool,
}

/// State of one vehicle as of the most recent successful fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VehicleSnapshot {
    /// Whether the provider can currently reach the vehicle
    pub is_reachable: Option<bool>,

    /// Battery state of charge in percent
    pub battery_level: Option<f64>,

    /// Usable battery capacity in kWh
    pub battery_capacity_kwh: Option<f64>,

    /// Whether a charge is in progress
    pub charging: Option<bool>,

    /// Whether a charge cable is connected
    pub plugged_in: Option<bool>,

    /// Whether the configured charge limit has been reached
    pub fully_charged: Option<bool>,

    /// Configured charge limit in percent
    pub charge_limit: Option<f64>,

    /// Current charge rate in kW
    pub charge_rate_kw: Option<f64>,

    /// Estimated minutes until the charge limit is reached
    pub charge_time_remaining_min: Option<i64>,

    /// Raw power delivery state label from the provider
    pub power_delivery_state: Option<String>,

    /// Estimated remaining range in km
    pub range_km: Option<f64>,

    /// Odometer reading in km
    pub odometer_km: Option<f64>,

    /// Central locking state, where the vehicle reports it
    pub is_locked: Option<bool>,

    /// Last known GPS position
    pub location: Option<Location>,

    /// When the provider last heard from the vehicle
    pub last_seen: Option<DateTime<Utc>>,

    /// Identification data for device registration
    pub information: Option<VehicleInfo>,

    /// Command capabilities advertised by the provider
    pub capabilities: Capabilities,

    /// Whether the provider's smart charging policy is enabled
    pub smart_charging_enabled: Option<bool>,

    /// When this snapshot was fetched; `None` only for the initial empty state
    pub fetched_at: Option<DateTime<Utc>>,

    /// Raw provider payload, retained for diagnostics only
    pub raw_payload: serde_json::Value,
}

impl VehicleSnapshot {
    /// Whether this is the initial placeholder with no fetched data
    pub fn is_empty(&self) -> bool {
        self.fetched_at.is_none()
    }

    /// Parse a single vehicle object from the provider's JSON
    pub fn from_payload(payload: &serde_json::Value, fetched_at: DateTime<Utc>) -> Self {
        let charge_state = payload.get("chargeState");

        let location = payload.get("location").and_then(|loc| {
            let latitude = loc.get("latitude").and_then(|v| v.as_f64())?;
            let longitude = loc.get("longitude").and_then(|v| v.as_f64())?;
            Some(Location {
                latitude,
                longitude,
                accuracy: loc.get("accuracy").and_then(|v| v.as_f64()),
                last_updated: loc
                    .get("lastUpdated")
                    .and_then(|v| v.as_str())
                    .and_then(parse_timestamp),
            })
        });

        let information = payload.get("information").map(|info| VehicleInfo {
            display_name: string_field(info, "displayName"),
            brand: string_field(info, "brand"),
            model: string_field(info, "model"),
            year: info.get("year").and_then(|v| v.as_i64()),
            vin: string_field(info, "vin"),
        });

        let capabilities = Capabilities {
            start_charging: capability_flag(payload, "startCharging"),
            smart_charging: capability_flag(payload, "smartCharging"),
        };

        Self {
            is_reachable: payload.get("isReachable").and_then(|v| v.as_bool()),
            battery_level: charge_field(charge_state, "batteryLevel", |v| v.as_f64()),
            battery_capacity_kwh: charge_field(charge_state, "batteryCapacity", |v| v.as_f64()),
            charging: charge_field(charge_state, "isCharging", |v| v.as_bool()),
            plugged_in: charge_field(charge_state, "isPluggedIn", |v| v.as_bool()),
            fully_charged: charge_field(charge_state, "isFullyCharged", |v| v.as_bool()),
            charge_limit: charge_field(charge_state, "chargeLimit", |v| v.as_f64()),
            charge_rate_kw: charge_field(charge_state, "chargeRate", |v| v.as_f64()),
            charge_time_remaining_min: charge_field(charge_state, "chargeTimeRemaining", |v| {
                v.as_i64()
            }),
            power_delivery_state: charge_field(charge_state, "powerDeliveryState", |v| {
                v.as_str().map(String::from)
            }),
            range_km: charge_field(charge_state, "range", |v| v.as_f64()),
            odometer_km: payload
                .get("odometer")
                .and_then(|o| o.get("distance"))
                .and_then(|v| v.as_f64()),
            is_locked: payload.get("isLocked").and_then(|v| v.as_bool()),
            location,
            last_seen: payload
                .get("lastSeen")
                .and_then(|v| v.as_str())
                .and_then(parse_timestamp),
            information,
            capabilities,
            smart_charging_enabled: payload
                .get("smartChargingPolicy")
                .and_then(|p| p.get("isEnabled"))
                .and_then(|v| v.as_bool()),
            fetched_at: Some(fetched_at),
            raw_payload: payload.clone(),
        }
    }
}

fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn charge_field<T>(
    charge_state: Option<&serde_json::Value>,
    key: &str,
    extract: impl Fn(&serde_json::Value) -> Option<T>,
) -> Option<T> {
    charge_state.and_then(|c| c.get(key)).and_then(|v| extract(v))
}

fn capability_flag(payload: &serde_json::Value, key: &str) -> bool {
    payload
        .get("capabilities")
        .and_then(|c| c.get(key))
        .and_then(|cap| cap.get("isCapable"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
