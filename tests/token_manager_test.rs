use std::sync::Arc;
use serde_json::json;
use voltlink::VoltlinkError;
use voltlink::api::{ApiEndpoints, Environment};
use voltlink::config::CredentialsConfig;
use voltlink::token::{TokenManager, TokenSource};
use wiremock::matchers::{basic_auth, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> CredentialsConfig {
    CredentialsConfig {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        environment: Environment::Sandbox,
    }
}

fn manager_for(server: &MockServer) -> TokenManager {
    let endpoints = ApiEndpoints::custom(server.uri(), format!("{}/oauth2/token", server.uri()));
    TokenManager::new(credentials(), endpoints).unwrap()
}

fn token_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": token,
        "expires_in": 3600,
        "token_type": "bearer"
    }))
}

#[tokio::test]
async fn concurrent_token_requests_issue_exactly_one_renewal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_response("tok-1"))
        .expect(1)
        .mount(&server)
        .await;

    let manager = Arc::new(manager_for(&server));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        tasks.push(tokio::spawn(
            async move { manager.access_token().await.unwrap() },
        ));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap(), "tok-1");
    }
}

#[tokio::test]
async fn cached_token_is_reused_without_network_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_response("tok-1"))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    assert_eq!(manager.access_token().await.unwrap(), "tok-1");
    assert_eq!(manager.access_token().await.unwrap(), "tok-1");
    assert!(manager.expiry().await.is_some());
}

#[tokio::test]
async fn renewal_uses_basic_auth_and_client_credentials_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(basic_auth("client-id", "client-secret"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(token_response("tok-1"))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    assert_eq!(manager.access_token().await.unwrap(), "tok-1");
}

#[tokio::test]
async fn rejected_credentials_fail_with_auth_error_and_recover() {
    let server = MockServer::start().await;
    let manager = manager_for(&server);

    {
        let _rejection = Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount_as_scoped(&server)
            .await;

        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, VoltlinkError::Auth { .. }));
        assert!(manager.expiry().await.is_none());
    }

    // The cache holds no bad token, so the next call retries fresh
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_response("tok-2"))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(manager.access_token().await.unwrap(), "tok-2");
}

#[tokio::test]
async fn response_missing_token_field_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "expires_in": 3600 })))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let err = manager.access_token().await.unwrap_err();
    assert!(matches!(err, VoltlinkError::Auth { .. }));
}

#[tokio::test]
async fn invalidate_forces_a_fresh_renewal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_response("tok-1"))
        .expect(2)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    assert_eq!(manager.access_token().await.unwrap(), "tok-1");
    manager.invalidate().await;
    assert!(manager.expiry().await.is_none());
    assert_eq!(manager.access_token().await.unwrap(), "tok-1");
}

#[tokio::test]
async fn token_expiring_within_margin_is_renewed_on_next_call() {
    let server = MockServer::start().await;
    // expires_in below the 300s renewal margin, so the cached token is
    // already considered expired when the second call arrives
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-short",
            "expires_in": 120
        })))
        .expect(2)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    assert_eq!(manager.access_token().await.unwrap(), "tok-short");
    assert_eq!(manager.access_token().await.unwrap(), "tok-short");
}
