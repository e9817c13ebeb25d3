#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use flowgate_core::definition::RepositoryDef;
use flowgate_core::status::RunStatus;
use flowgate_engine::{Instance, InstanceSettings, StaticLocationSource};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use flowgate_api::config::ServerConfig;
use flowgate_api::router::build_app_router;
use flowgate_api::state::AppState;
use flowgate_api::ws::WsManager;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        locations: Vec::new(),
        step_delay: Duration::ZERO,
    }
}

/// Repository served by the `analytics` test location.
///
/// `etl` runs extract -> transform -> load, plus an independent `audit`.
/// `extract` requires a `source`; a step configured with `"fail": true`
/// fails. `broken` wires a `Table` output into a `Rows` input.
pub fn analytics_json() -> Value {
    json!({
        "name": "analytics",
        "pipelines": [
            {
                "name": "etl",
                "description": "Nightly event ETL",
                "tags": {"team": "data"},
                "solids": [
                    {
                        "name": "extract",
                        "config": {"kind": "Shape", "key": "ExtractConfig", "fields": {
                            "source": {"type": {"kind": "String"}},
                            "batch_size": {"type": {"kind": "Int"}, "default_value": 500},
                            "fail": {"type": {"kind": "Bool"}, "is_required": false}
                        }},
                        "outputs": [{"name": "rows", "dagster_type": "Rows"}]
                    },
                    {
                        "name": "transform",
                        "inputs": [{"name": "rows", "dagster_type": "Rows",
                                    "from": {"solid": "extract", "output": "rows"}}],
                        "outputs": [{"name": "table", "dagster_type": "Table"}]
                    },
                    {
                        "name": "load",
                        "inputs": [{"name": "table", "dagster_type": "Table",
                                    "from": {"solid": "transform", "output": "table"}}],
                        "materializes": ["warehouse/events"]
                    },
                    {"name": "audit"}
                ],
                "modes": [
                    {"name": "prod"},
                    {"name": "test"}
                ],
                "presets": [{
                    "name": "nightly",
                    "mode": "prod",
                    "run_config": {"solids": {"extract": {"config": {"source": "s3://events"}}}},
                    "tags": {"schedule": "nightly"}
                }]
            },
            {
                "name": "broken",
                "solids": [
                    {"name": "transform", "outputs": [{"name": "table", "dagster_type": "Table"}]},
                    {
                        "name": "load",
                        "inputs": [{"name": "table", "dagster_type": "Rows",
                                    "from": {"solid": "transform", "output": "table"}}]
                    }
                ]
            }
        ]
    })
}

pub fn analytics_repository() -> RepositoryDef {
    serde_json::from_value(analytics_json()).expect("test repository is valid")
}

/// Run config that lets `etl` launch.
pub fn etl_run_config() -> Value {
    json!({"solids": {"extract": {"config": {"source": "s3://events"}}}})
}

/// An instance serving the `analytics` location.
pub async fn test_instance(step_delay: Duration) -> Arc<Instance> {
    let instance = Arc::new(Instance::new(InstanceSettings { step_delay }));
    instance
        .add_location(Arc::new(StaticLocationSource::new(
            "analytics",
            analytics_repository(),
        )))
        .await;
    instance
}

/// Build the full application router around `instance`, with the same
/// middleware stack production uses.
pub fn build_app(instance: Arc<Instance>) -> Router {
    let config = test_config();
    let state = AppState {
        instance,
        config: Arc::new(config.clone()),
        ws_manager: Arc::new(WsManager::new()),
    };
    build_app_router(state, &config)
}

/// Router over a fresh instance whose steps complete immediately.
pub async fn build_test_app() -> Router {
    build_app(test_instance(Duration::ZERO).await)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// GET `uri` and return the `data` member of the envelope.
pub async fn get_data(app: &Router, uri: &str) -> Value {
    body_json(get(app.clone(), uri).await).await["data"].take()
}

/// POST `body` to `uri` and return the `data` member of the envelope.
pub async fn post_data(app: &Router, uri: &str, body: Value) -> Value {
    body_json(post_json(app.clone(), uri, body).await).await["data"].take()
}

/// Launch `etl` with a valid config and return the new run's id.
pub async fn launch_etl(app: &Router) -> String {
    let data = post_data(
        app,
        "/api/v1/runs",
        json!({
            "selector": {"pipeline_name": "etl"},
            "run_config": etl_run_config(),
        }),
    )
    .await;
    assert_eq!(data["__typename"], "LaunchRunSuccess", "{data}");
    data["run"]["run_id"].as_str().unwrap().to_string()
}

/// Poll a run until it reaches a terminal status.
pub async fn wait_for_terminal(app: &Router, run_id: &str) -> Value {
    for _ in 0..200 {
        let run = get_data(app, &format!("/api/v1/runs/{run_id}")).await;
        let status: RunStatus = run["status"].as_str().unwrap().parse().unwrap();
        if status.is_terminal() {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {run_id} did not finish");
}
