//! Integration tests for the REST client against a mock backend

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use chrono::{TimeZone, Utc};
use crowdpulse_client::ApiClient;
use crowdpulse_core::Error;
use crowdpulse_core::types::{EntriesQuery, LoginRequest, TimeWindow};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn window() -> TimeWindow {
    TimeWindow::new(
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        Utc.timestamp_millis_opt(1_700_086_400_000).unwrap(),
    )
}

#[tokio::test]
async fn test_login_posts_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "ops@mall.example", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri());
    let response = client
        .login(&LoginRequest {
            email: "ops@mall.example".to_string(),
            password: "hunter2".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(response.token, "tok-1");
}

#[tokio::test]
async fn test_login_rejection_maps_to_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
        )
        .mount(&server)
        .await;

    let err = ApiClient::new(server.uri())
        .login(&LoginRequest {
            email: "ops".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();

    assert!(err.is_auth_failure());
    assert_eq!(err.user_message(), Some("Invalid credentials"));
}

#[tokio::test]
async fn test_analytics_requests_carry_token_and_window() {
    let server = MockServer::start().await;
    let expected_body = json!({
        "siteId": "site-1",
        "fromUtc": 1_700_000_000_000_i64,
        "toUtc": 1_700_086_400_000_i64,
    });

    Mock::given(method("POST"))
        .and(path("/analytics/occupancy"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_json(expected_body.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "buckets": [{"utc": 1_700_000_000_000_i64, "avg": 120}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/analytics/footfall"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_json(expected_body.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"todayFootfall": 431})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/analytics/dwell"))
        .and(body_json(expected_body.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"avgDwellMinutes": 42.5})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/analytics/demographics"))
        .and(body_json(expected_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "buckets": [{"utc": 1_700_000_000_000_i64, "male": 30, "female": 45}]
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).with_token("tok-1");

    let occupancy = client.occupancy_timeseries("site-1", window()).await.unwrap();
    assert_eq!(occupancy.current(), 120.0);

    let footfall = client.today_footfall("site-1", window()).await.unwrap();
    assert_eq!(footfall.value(), 431.0);

    let dwell = client.average_dwell_time("site-1", window()).await.unwrap();
    assert_eq!(dwell.minutes(), 42.5);

    let demographics = client.demographics("site-1", window()).await.unwrap();
    assert_eq!(demographics.current_split().total(), 75.0);
}

#[tokio::test]
async fn test_entry_exit_page_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analytics/entry-exit"))
        .and(body_json(json!({"pageNumber": 2, "pageSize": 10, "siteId": "site-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                {"personName": "Visitor 12", "gender": "female", "entryUtc": 1_700_000_000_000_i64, "dwellMinutes": 18}
            ],
            "totalRecords": 37,
            "totalPages": 4
        })))
        .mount(&server)
        .await;

    let page = ApiClient::new(server.uri())
        .with_token("tok-1")
        .entry_exit_records(&EntriesQuery {
            page_number: 2,
            page_size: 10,
            site_id: Some("site-1".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(page.total_pages, Some(4));
    assert_eq!(page.total_records, Some(37));
    let records = page.records.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].person_name.as_deref(), Some("Visitor 12"));
}

#[tokio::test]
async fn test_server_error_maps_to_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = ApiClient::new(server.uri()).sites().await.unwrap_err();
    match err {
        Error::Http { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_unparseable_success_body_is_serialization_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let err = ApiClient::new(server.uri()).sites().await.unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = ApiClient::new(server.uri())
        .with_timeout(Duration::from_millis(50))
        .sites()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { duration_ms: 50 }));
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    // Port 9 (discard) is not expected to accept HTTP
    let err = ApiClient::new("http://127.0.0.1:9")
        .with_timeout(Duration::from_secs(2))
        .sites()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Network(_) | Error::Timeout { .. }));
}
