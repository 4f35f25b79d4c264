use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};
use voltlink::api::ApiEndpoints;
use voltlink::coordinator::RefreshCoordinator;
use voltlink::fetcher::EnodeFetcher;
use voltlink::notifier::{DiagnosticNotifier, LogNotificationSink};
use voltlink::token::{TokenManager, TokenSource};
use voltlink::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    voltlink::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Voltlink Enode telemetry bridge starting up ({} environment)",
        config.credentials.environment.as_str()
    );

    let endpoints = ApiEndpoints::for_environment(config.credentials.environment);
    let tokens: Arc<dyn TokenSource> = Arc::new(TokenManager::new(
        config.credentials.clone(),
        endpoints.clone(),
    )?);
    let fetcher = Arc::new(EnodeFetcher::new(
        endpoints.clone(),
        config.vehicle.user_id.clone(),
        config.vehicle.vehicle_id.clone(),
    )?);
    let notifier = DiagnosticNotifier::new(
        config.notifications.debug_notifications,
        Arc::new(LogNotificationSink::new()),
    );

    let mut coordinator = RefreshCoordinator::new(
        config.vehicle.vehicle_id.clone(),
        config.update_interval(),
        tokens,
        fetcher,
        notifier,
    );
    let handle = coordinator.handle();

    // Log snapshot replacements so the operator can follow along
    let mut updates = handle.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            info!(
                battery = ?snapshot.battery_level,
                charging = ?snapshot.charging,
                reachable = ?snapshot.is_reachable,
                "Vehicle state updated"
            );
        }
    });

    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                shutdown_handle.request_shutdown();
            }
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
    });

    coordinator.run().await;
    info!("Voltlink shutdown complete");
    Ok(())
}
