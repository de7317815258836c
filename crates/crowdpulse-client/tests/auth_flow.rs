//! Login and logout against a mock backend with a temporary session file

#![allow(clippy::unwrap_used)]

use crowdpulse_client::{ApiClient, AuthService, SessionStore};
use crowdpulse_core::Error;
use crowdpulse_core::types::LoginRequest;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> LoginRequest {
    LoginRequest {
        email: "ops@mall.example".to_string(),
        password: "hunter2".to_string(),
    }
}

async fn mock_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": token})))
        .mount(server)
        .await;
}

fn service(server: &MockServer, dir: &TempDir) -> AuthService {
    let store = SessionStore::open(dir.path().join("session.json")).unwrap();
    AuthService::new(ApiClient::new(server.uri()), Arc::new(store))
}

#[tokio::test]
async fn test_login_stores_token_and_first_site() {
    let server = MockServer::start().await;
    mock_login(&server, "tok-1").await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"siteId": "site-a", "name": "North Mall"},
            {"siteId": "site-b", "name": "South Mall"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let auth = service(&server, &dir);
    auth.login(&credentials()).await.unwrap();

    assert!(auth.is_authenticated());
    assert_eq!(auth.token().as_deref(), Some("tok-1"));
    assert_eq!(auth.stored_site_id().as_deref(), Some("site-a"));

    // persisted for the next process
    let reopened = SessionStore::open(dir.path().join("session.json")).unwrap();
    assert_eq!(reopened.site_id().as_deref(), Some("site-a"));
}

#[tokio::test]
async fn test_site_lookup_failure_keeps_login() {
    let server = MockServer::start().await;
    mock_login(&server, "tok-2").await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let auth = service(&server, &dir);
    auth.store().set_site_id("stale-site").unwrap();

    auth.login(&credentials()).await.unwrap();

    assert!(auth.is_authenticated());
    assert!(auth.stored_site_id().is_none());
}

#[tokio::test]
async fn test_empty_site_list_leaves_site_unset() {
    let server = MockServer::start().await;
    mock_login(&server, "tok-3").await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let auth = service(&server, &dir);
    auth.login(&credentials()).await.unwrap();

    assert!(auth.is_authenticated());
    assert!(auth.stored_site_id().is_none());
}

#[tokio::test]
async fn test_rejected_login_stores_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Bad password"})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let auth = service(&server, &dir);
    let err = auth.login(&credentials()).await.unwrap_err();

    assert_eq!(err.user_message(), Some("Bad password"));
    assert!(!auth.is_authenticated());
    assert!(matches!(auth.authorized_client(), Err(Error::NotAuthenticated)));
}

#[tokio::test]
async fn test_empty_credentials_fail_validation_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "x"})))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let auth = service(&server, &dir);
    let err = auth
        .login(&LoginRequest {
            email: String::new(),
            password: "pw".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(err.user_message(), Some("Email or login ID is required"));
}

#[tokio::test]
async fn test_logout_clears_session() {
    let server = MockServer::start().await;
    mock_login(&server, "tok-4").await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"siteId": "s"}])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let auth = service(&server, &dir);
    auth.login(&credentials()).await.unwrap();
    assert!(auth.authorized_client().unwrap().has_token());

    auth.logout().unwrap();

    assert!(!auth.is_authenticated());
    assert!(auth.stored_site_id().is_none());
    assert!(matches!(auth.authorized_client(), Err(Error::NotAuthenticated)));
}
