use std::sync::Arc;
use async_trait::async_trait;
use serde_json::json;
use voltlink::VoltlinkError;
use voltlink::api::ApiEndpoints;
use voltlink::error::Result;
use voltlink::link::{LinkClient, LinkSessionRequest};
use voltlink::token::TokenSource;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StaticTokens;

#[async_trait]
impl TokenSource for StaticTokens {
    async fn access_token(&self) -> Result<String> {
        Ok("tok".to_string())
    }

    async fn invalidate(&self) {}
}

fn client_for(server: &MockServer) -> LinkClient {
    let endpoints = ApiEndpoints::custom(server.uri(), format!("{}/oauth2/token", server.uri()));
    LinkClient::new(endpoints, Arc::new(StaticTokens)).unwrap()
}

fn link_request() -> LinkSessionRequest {
    LinkSessionRequest {
        vendor_type: "vehicle".to_string(),
        scopes: vec![
            "vehicle:read:data".to_string(),
            "vehicle:control:charging".to_string(),
        ],
        language: "en-US".to_string(),
        redirect_uri: "https://example.invalid/linked".to_string(),
    }
}

#[tokio::test]
async fn create_link_session_returns_the_link_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/u1/link"))
        .and(header("authorization", "Bearer tok"))
        .and(body_json(json!({
            "vendorType": "vehicle",
            "scopes": ["vehicle:read:data", "vehicle:control:charging"],
            "language": "en-US",
            "redirectUri": "https://example.invalid/linked"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "linkUrl": "https://link.enode.example/s/abc" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = client_for(&server)
        .create_link_session("u1", &link_request())
        .await
        .unwrap();
    assert_eq!(url, "https://link.enode.example/s/abc");
}

#[tokio::test]
async fn missing_link_url_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/u1/link"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_link_session("u1", &link_request())
        .await
        .unwrap_err();
    assert!(matches!(err, VoltlinkError::Api { .. }));
}

#[tokio::test]
async fn failed_link_session_surfaces_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/u1/link"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_link_session("u1", &link_request())
        .await
        .unwrap_err();
    match err {
        VoltlinkError::Api { message } => assert!(message.contains("403")),
        other => panic!("expected api error, got {:?}", other),
    }
}

#[tokio::test]
async fn list_vehicles_returns_display_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/u1/vehicles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "id": "v1",
                    "information": { "displayName": "My e-Niro", "brand": "Kia", "model": "e-Niro" }
                },
                { "id": "v2" },
                { "information": { "displayName": "No id, skipped" } }
            ]
        })))
        .mount(&server)
        .await;

    let vehicles = client_for(&server).list_vehicles("u1").await.unwrap();
    assert_eq!(vehicles.len(), 2);
    assert_eq!(vehicles[0].id, "v1");
    assert_eq!(vehicles[0].display_name.as_deref(), Some("My e-Niro"));
    assert_eq!(vehicles[0].brand.as_deref(), Some("Kia"));
    assert_eq!(vehicles[1].id, "v2");
    assert_eq!(vehicles[1].display_name, None);
}
