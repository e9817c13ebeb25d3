//! Integration tests for the health check, the schema document and
//! general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with versions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_versions() {
    let app = common::build_test_app().await;
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], flowgate_core::version::PACKAGE_VERSION);
    assert_eq!(json["schema_version"], flowgate_schema::SCHEMA_VERSION);
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = common::build_test_app().await;
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = common::build_test_app().await;
    let response = get(app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36, "x-request-id should be a UUID string");
}

// ---------------------------------------------------------------------------
// Test: CORS preflight allows the configured origin
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let app = common::build_test_app().await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/runs")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:5173"
    );
}

// ---------------------------------------------------------------------------
// Test: GET /api/v1/schema lists every type and operation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn schema_document_lists_types_and_operations() {
    let app = common::build_test_app().await;
    let json = body_json(get(app, "/api/v1/schema").await).await;
    let data = &json["data"];

    assert_eq!(data["version"], flowgate_schema::SCHEMA_VERSION);
    assert_eq!(data["fingerprint"], flowgate_schema::SCHEMA.fingerprint());

    let types = data["types"].as_array().unwrap();
    assert_eq!(types.len(), flowgate_schema::SCHEMA.types().len());

    let launch = types
        .iter()
        .find(|t| t["name"] == "LaunchRunResult")
        .expect("LaunchRunResult is registered");
    assert_eq!(launch["kind"], "UNION");
    let members = launch["members"].as_array().unwrap();
    assert!(members.iter().any(|m| m == "PipelineConfigValidationInvalid"));
    assert!(members.iter().any(|m| m == "InvalidOutputError"));

    let operations = data["operations"].as_array().unwrap();
    let subscription = operations
        .iter()
        .find(|op| op["name"] == "pipelineRunLogs")
        .unwrap();
    assert_eq!(subscription["kind"], "SUBSCRIPTION");
    assert_eq!(subscription["result"], "PipelineRunLogsSubscriptionPayload");
}
