//! Refresh coordination for vehicle state
//!
//! The coordinator owns the polling schedule for one vehicle: it obtains a
//! token, fetches provider state, folds the outcome into the shared
//! last-known-good snapshot and notifies dependents. Failures never clear
//! the previous snapshot; dependents only ever observe "not updated this
//! cycle". At most one refresh is in flight at a time, for both timer ticks
//! and manual refresh requests.

use crate::error::VoltlinkError;
use crate::fetcher::{FetchOutcome, VehicleFetch};
use crate::logging::{LogContext, get_logger_with_context};
use crate::notifier::{DiagnosticNotifier, DiagnosticPayload};
use crate::snapshot::VehicleSnapshot;
use crate::token::TokenSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval};

/// Consecutive transient failures before the diagnostic notifier is involved
pub const TRANSIENT_FAILURE_THRESHOLD: u32 = 3;

/// Consecutive auth failures before a user-visible error is raised
pub const AUTH_FAILURE_THRESHOLD: u32 = 2;

/// Cap on the rate-limit backoff doubling
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Externally visible coordinator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Waiting for the next tick or manual refresh
    Idle,

    /// A refresh is in flight
    Refreshing,

    /// Polling suspended after a rate-limit signal
    Backoff,

    /// A user-visible error is pending operator attention
    Error(String),
}

/// Commands accepted by the coordinator from dependents
#[derive(Debug, Clone)]
pub enum CoordinatorCommand {
    /// Refresh outside the regular cadence
    Refresh,
}

/// Cheap, cloneable access to a running coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    vehicle_id: String,
    snapshot_rx: watch::Receiver<Arc<VehicleSnapshot>>,
    state_rx: watch::Receiver<CoordinatorState>,
    commands_tx: mpsc::UnboundedSender<CoordinatorCommand>,
    shutdown_tx: mpsc::UnboundedSender<()>,
}

impl CoordinatorHandle {
    /// Current snapshot (possibly the initial empty one)
    pub fn snapshot(&self) -> Arc<VehicleSnapshot> {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to snapshot replacements
    pub fn subscribe(&self) -> watch::Receiver<Arc<VehicleSnapshot>> {
        self.snapshot_rx.clone()
    }

    /// Current coordinator state
    pub fn state(&self) -> CoordinatorState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to state transitions
    pub fn watch_state(&self) -> watch::Receiver<CoordinatorState> {
        self.state_rx.clone()
    }

    /// Ask for a refresh outside the regular cadence. During backoff this is
    /// a no-op and the stale snapshot remains current.
    pub fn request_refresh(&self) {
        let _ = self.commands_tx.send(CoordinatorCommand::Refresh);
    }

    /// Stop the polling loop
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }
}

/// Scheduling heart of the integration, one instance per configured vehicle
pub struct RefreshCoordinator {
    vehicle_id: String,
    update_interval: Duration,
    tokens: Arc<dyn TokenSource>,
    fetcher: Arc<dyn VehicleFetch>,
    notifier: DiagnosticNotifier,
    logger: crate::logging::StructuredLogger,

    snapshot_tx: watch::Sender<Arc<VehicleSnapshot>>,
    state_tx: watch::Sender<CoordinatorState>,
    commands_tx: mpsc::UnboundedSender<CoordinatorCommand>,
    commands_rx: mpsc::UnboundedReceiver<CoordinatorCommand>,
    shutdown_tx: mpsc::UnboundedSender<()>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,

    backoff_until: Option<Instant>,
    consecutive_auth_failures: u32,
    consecutive_transient_failures: u32,
    consecutive_rate_limits: u32,
}

impl RefreshCoordinator {
    /// Create a coordinator for one vehicle
    pub fn new(
        vehicle_id: String,
        update_interval: Duration,
        tokens: Arc<dyn TokenSource>,
        fetcher: Arc<dyn VehicleFetch>,
        notifier: DiagnosticNotifier,
    ) -> Self {
        let logger = get_logger_with_context(
            LogContext::new("coordinator").with_vehicle_id(vehicle_id.clone()),
        );
        let (snapshot_tx, _) = watch::channel(Arc::new(VehicleSnapshot::default()));
        let (state_tx, _) = watch::channel(CoordinatorState::Idle);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();

        Self {
            vehicle_id,
            update_interval,
            tokens,
            fetcher,
            notifier,
            logger,
            snapshot_tx,
            state_tx,
            commands_tx,
            commands_rx,
            shutdown_tx,
            shutdown_rx,
            backoff_until: None,
            consecutive_auth_failures: 0,
            consecutive_transient_failures: 0,
            consecutive_rate_limits: 0,
        }
    }

    /// Handle for dependents; may be cloned freely
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            vehicle_id: self.vehicle_id.clone(),
            snapshot_rx: self.snapshot_tx.subscribe(),
            state_rx: self.state_tx.subscribe(),
            commands_tx: self.commands_tx.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    /// Run the polling loop until shutdown is requested
    ///
    /// The interval is read once here; a changed configuration value applies
    /// only after the coordinator is restarted. The first tick fires
    /// immediately, giving dependents an initial snapshot.
    pub async fn run(&mut self) {
        self.logger.info(&format!(
            "Starting refresh loop, interval {}s",
            self.update_interval.as_secs()
        ));

        let mut ticker = interval(self.update_interval);
        // A tick arriving while a refresh is still in flight is dropped,
        // never queued, so fetches against one vehicle cannot overlap.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.handle_tick().await;
                }
                Some(cmd) = self.commands_rx.recv() => {
                    match cmd {
                        CoordinatorCommand::Refresh => self.handle_manual_refresh().await,
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }

        self.logger.info("Refresh loop stopped");
    }

    /// One timer-driven refresh attempt
    async fn handle_tick(&mut self) {
        if self.in_backoff() {
            self.logger.debug("Tick suppressed, backoff active");
            return;
        }
        self.refresh_once().await;
    }

    /// One externally requested refresh attempt
    async fn handle_manual_refresh(&mut self) {
        if self.in_backoff() {
            // Dependents keep reading the stale snapshot; no provider call
            self.logger
                .debug("Manual refresh ignored during backoff, serving stale snapshot");
            return;
        }
        self.logger.debug("Manual refresh requested");
        self.refresh_once().await;
    }

    fn in_backoff(&mut self) -> bool {
        match self.backoff_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                self.backoff_until = None;
                false
            }
            None => false,
        }
    }

    async fn refresh_once(&mut self) {
        self.set_state(CoordinatorState::Refreshing);

        let outcome = match self.tokens.access_token().await {
            Ok(token) => self.fetcher.fetch(&token).await,
            Err(e @ VoltlinkError::Auth { .. }) => {
                self.logger.warn(&format!("Token acquisition failed: {}", e));
                FetchOutcome::AuthFailure
            }
            Err(e) => FetchOutcome::TransientNetworkError(e.to_string()),
        };

        self.apply_outcome(outcome).await;
    }

    /// Fold a fetch outcome into coordinator state and the shared snapshot
    async fn apply_outcome(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Success(snapshot) => {
                self.consecutive_auth_failures = 0;
                self.consecutive_transient_failures = 0;
                self.consecutive_rate_limits = 0;
                self.backoff_until = None;

                let raw = snapshot.raw_payload.clone();
                // Whole-object replacement: readers see either the previous
                // snapshot or this one, never a partial merge.
                self.snapshot_tx.send_replace(Arc::new(snapshot));
                self.set_state(CoordinatorState::Idle);
                self.logger.debug("Snapshot updated");

                self.notifier
                    .maybe_notify(&self.vehicle_id, DiagnosticPayload::Raw(&raw))
                    .await;
            }
            FetchOutcome::AuthFailure => {
                self.consecutive_transient_failures = 0;
                self.consecutive_rate_limits = 0;
                self.consecutive_auth_failures += 1;

                // A rejected token must not be reused on the next cycle
                self.tokens.invalidate().await;

                if self.consecutive_auth_failures >= AUTH_FAILURE_THRESHOLD {
                    let message = format!(
                        "Authentication failed on {} consecutive refreshes, check client credentials",
                        self.consecutive_auth_failures
                    );
                    self.logger.error(&message);
                    self.notifier
                        .maybe_notify(&self.vehicle_id, DiagnosticPayload::Error(&message))
                        .await;
                    self.set_state(CoordinatorState::Error(message));
                } else {
                    self.logger
                        .warn("Provider rejected access token, re-authenticating on next cycle");
                    self.set_state(CoordinatorState::Idle);
                }
            }
            FetchOutcome::RateLimited { retry_after } => {
                self.consecutive_auth_failures = 0;
                self.consecutive_transient_failures = 0;
                self.consecutive_rate_limits += 1;

                let backoff = backoff_for(
                    self.update_interval,
                    self.consecutive_rate_limits,
                    retry_after,
                );
                self.backoff_until = Some(Instant::now() + backoff);
                self.logger.warn(&format!(
                    "Rate limited by provider, suspending polling for {}s",
                    backoff.as_secs()
                ));
                // Never surfaced through the notifier: stale data beats an
                // error flood for a provider-imposed pause.
                self.set_state(CoordinatorState::Backoff);
            }
            FetchOutcome::TransientNetworkError(reason) => {
                self.consecutive_auth_failures = 0;
                self.consecutive_rate_limits = 0;
                self.consecutive_transient_failures += 1;

                self.logger.warn(&format!(
                    "Transient fetch failure ({} consecutive): {}",
                    self.consecutive_transient_failures, reason
                ));

                if self.consecutive_transient_failures == TRANSIENT_FAILURE_THRESHOLD {
                    let message = format!(
                        "{} consecutive fetch failures, last error: {}",
                        self.consecutive_transient_failures, reason
                    );
                    self.notifier
                        .maybe_notify(&self.vehicle_id, DiagnosticPayload::Error(&message))
                        .await;
                }
                self.set_state(CoordinatorState::Idle);
            }
            FetchOutcome::PermanentClientError(reason) => {
                self.consecutive_auth_failures = 0;
                self.consecutive_transient_failures = 0;
                self.consecutive_rate_limits = 0;

                self.logger
                    .error(&format!("Provider rejected request: {}", reason));
                self.notifier
                    .maybe_notify(&self.vehicle_id, DiagnosticPayload::Error(&reason))
                    .await;
                self.set_state(CoordinatorState::Idle);
            }
        }
    }

    fn set_state(&self, state: CoordinatorState) {
        self.state_tx.send_replace(state);
    }
}

/// Backoff window after the n-th consecutive rate limit
///
/// A provider-specified Retry-After wins when present; either way the pause
/// is never shorter than the configured poll interval.
fn backoff_for(
    update_interval: Duration,
    consecutive_rate_limits: u32,
    retry_after: Option<Duration>,
) -> Duration {
    match retry_after {
        Some(requested) => requested.max(update_interval),
        None => {
            let exponent = consecutive_rate_limits.min(MAX_BACKOFF_EXPONENT);
            update_interval.saturating_mul(2u32.saturating_pow(exponent))
        }
    }
}
