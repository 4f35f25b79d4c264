use std::sync::Arc;
use std::time::Duration;
use serde_json::json;
use voltlink::api::{ApiEndpoints, Environment};
use voltlink::config::CredentialsConfig;
use voltlink::coordinator::RefreshCoordinator;
use voltlink::fetcher::EnodeFetcher;
use voltlink::notifier::{DiagnosticNotifier, LogNotificationSink};
use voltlink::token::{TokenManager, TokenSource};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> CredentialsConfig {
    CredentialsConfig {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        environment: Environment::Sandbox,
    }
}

fn listing(battery: f64) -> serde_json::Value {
    json!({
        "data": [{
            "id": "v1",
            "isReachable": true,
            "chargeState": { "batteryLevel": battery }
        }]
    })
}

fn build_coordinator(server: &MockServer) -> RefreshCoordinator {
    let endpoints = ApiEndpoints::custom(server.uri(), format!("{}/oauth2/token", server.uri()));
    let tokens: Arc<dyn TokenSource> =
        Arc::new(TokenManager::new(credentials(), endpoints.clone()).unwrap());
    let fetcher = Arc::new(
        EnodeFetcher::new(endpoints, "u1".to_string(), "v1".to_string()).unwrap(),
    );
    let notifier = DiagnosticNotifier::new(false, Arc::new(LogNotificationSink::new()));
    RefreshCoordinator::new(
        "v1".to_string(),
        Duration::from_secs(60),
        tokens,
        fetcher,
        notifier,
    )
}

#[tokio::test]
async fn initial_cycle_renews_token_once_and_updates_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/u1/vehicles"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(64.0)))
        .expect(1)
        .mount(&server)
        .await;

    let mut coordinator = build_coordinator(&server);
    let handle = coordinator.handle();
    let mut updates = handle.subscribe();
    assert!(handle.snapshot().is_empty());

    let task = tokio::spawn(async move { coordinator.run().await });

    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updates.borrow_and_update().battery_level, Some(64.0));

    handle.request_shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn manual_refresh_reuses_the_cached_token() {
    let server = MockServer::start().await;
    // One renewal serves both the initial cycle and the manual refresh
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/u1/vehicles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(64.0)))
        .expect(2)
        .mount(&server)
        .await;

    let mut coordinator = build_coordinator(&server);
    let handle = coordinator.handle();
    let mut updates = handle.subscribe();

    let task = tokio::spawn(async move { coordinator.run().await });

    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .unwrap()
        .unwrap();
    updates.borrow_and_update();

    handle.request_refresh();
    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(!updates.borrow_and_update().is_empty());

    handle.request_shutdown();
    task.await.unwrap();
}
