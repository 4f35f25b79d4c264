//! # Voltlink - Enode Vehicle Telemetry Bridge
//!
//! A Rust implementation of a vehicle telemetry bridge that links a
//! manufacturer account, via the Enode aggregator, to a home-automation
//! host. The bridge polls per-vehicle state (battery, charging, odometer,
//! location) on a configurable cadence and exposes charging controls,
//! while shielding dependents from provider failures.
//!
//! ## Features
//!
//! - **Refresh coordination**: one polling loop per vehicle with
//!   stale-but-available snapshot semantics on any fetch failure
//! - **OAuth2 client credentials**: cached tokens with single-flight renewal
//!   shared between the read and write paths
//! - **Backoff**: provider rate limits suspend polling instead of flooding
//!   the operator with errors
//! - **Diagnostics**: rate-limited raw payload/error notifications
//! - **Controls**: start/stop charging and smart charging commands
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `api`: Environment selection and endpoint construction
//! - `token`: OAuth2 token cache and renewal
//! - `snapshot`: Last-known-good vehicle state
//! - `fetcher`: Provider reads mapped to typed outcomes
//! - `coordinator`: Polling state machine and dependent notification
//! - `notifier`: Rate-limited diagnostic notifications
//! - `controls`: Charging command dispatch
//! - `link`: One-time account-linking helpers

pub mod api;
pub mod config;
pub mod controls;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod link;
pub mod logging;
pub mod notifier;
pub mod snapshot;
pub mod token;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{CoordinatorHandle, CoordinatorState, RefreshCoordinator};
pub use error::{Result, VoltlinkError};
pub use snapshot::VehicleSnapshot;
