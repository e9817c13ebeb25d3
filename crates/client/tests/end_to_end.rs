//! Client against a live gateway on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use flowgate_client::{
    ClientConfig, ClientError, GatewayClient, JobSubmission, PollConfig, ReloadRepositoryLocationStatus,
    TerminateOutcome,
};
use flowgate_core::event::EventType;
use flowgate_core::status::RunStatus;
use flowgate_engine::{FileLocationSource, Instance, InstanceSettings};
use serde_json::{json, Value};

use flowgate_api::config::ServerConfig;
use flowgate_api::router::build_app_router;
use flowgate_api::state::AppState;
use flowgate_api::ws::WsManager;

fn repository_json(description: &str) -> Value {
    json!({
        "name": "ingest",
        "pipelines": [
            {
                "name": "daily",
                "description": description,
                "solids": [
                    {
                        "name": "fetch",
                        "config": {"kind": "Shape", "key": "FetchConfig", "fields": {
                            "url": {"type": {"kind": "String"}},
                            "fail": {"type": {"kind": "Bool"}, "is_required": false}
                        }},
                        "outputs": [{"name": "rows", "dagster_type": "Rows"}]
                    },
                    {
                        "name": "store",
                        "inputs": [{"name": "rows", "dagster_type": "Rows",
                                    "from": {"solid": "fetch", "output": "rows"}}]
                    }
                ],
                "modes": [{"name": "prod"}]
            },
            {
                "name": "mismatched",
                "solids": [
                    {"name": "fetch", "outputs": [{"name": "rows", "dagster_type": "Rows"}]},
                    {
                        "name": "store",
                        "inputs": [{"name": "rows", "dagster_type": "Table",
                                    "from": {"solid": "fetch", "output": "rows"}}]
                    }
                ]
            }
        ]
    })
}

fn daily_config() -> Value {
    json!({"solids": {"fetch": {"config": {"url": "https://example.test/feed"}}}})
}

/// A gateway serving one location from a file.
struct Gateway {
    client: GatewayClient,
    location_file: tempfile::NamedTempFile,
}

async fn start_gateway(step_delay: Duration) -> Gateway {
    start_gateway_with_location("ingest", step_delay).await
}

async fn start_gateway_with_location(location_name: &str, step_delay: Duration) -> Gateway {
    let location_file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(location_file.path(), repository_json("Daily ingest").to_string()).unwrap();

    let instance = Arc::new(Instance::new(InstanceSettings { step_delay }));
    instance
        .add_location(Arc::new(FileLocationSource::new(location_name, location_file.path())))
        .await;

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: Vec::new(),
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        locations: Vec::new(),
        step_delay,
    };
    let state = AppState {
        instance,
        config: Arc::new(config.clone()),
        ws_manager: Arc::new(WsManager::new()),
    };
    let app = build_app_router(state, &config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client_config = ClientConfig::new(format!("http://{addr}")).with_poll(PollConfig {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(50),
        multiplier: 2.0,
    });
    let client = GatewayClient::connect(client_config).await.unwrap();

    Gateway { client, location_file }
}

// ---------------------------------------------------------------------------
// Test: connect reports the server's versions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_reports_server_versions() {
    let gateway = start_gateway(Duration::ZERO).await;
    let info = gateway.client.server_info();

    assert_eq!(info.status, "ok");
    assert_eq!(info.version, flowgate_core::version::PACKAGE_VERSION);
    assert_eq!(info.schema_version, flowgate_schema::SCHEMA_VERSION);
}

// ---------------------------------------------------------------------------
// Test: submit then poll until success, and until failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submitted_job_runs_to_success() {
    let gateway = start_gateway(Duration::ZERO).await;
    let job = JobSubmission::new("daily").mode("prod").run_config(daily_config()).tag("owner", "e2e");

    let run_id = gateway.client.submit_job(&job).await.unwrap();
    let status = gateway.client.poll_run(run_id, Duration::from_secs(10)).await.unwrap();

    assert_eq!(status, RunStatus::Success);
    let run = gateway.client.get_run(run_id).await.unwrap();
    assert_eq!(run.pipeline_name, "daily");
    assert!(run.tags.iter().any(|tag| tag.key == "owner" && tag.value == "e2e"));
}

#[tokio::test]
async fn failing_step_ends_run_in_failure() {
    let gateway = start_gateway(Duration::ZERO).await;
    let job = JobSubmission::new("daily")
        .run_config(json!({"solids": {"fetch": {"config": {"url": "x", "fail": true}}}}));

    let run_id = gateway.client.submit_job(&job).await.unwrap();
    let status = gateway.client.poll_run(run_id, Duration::from_secs(10)).await.unwrap();

    assert_eq!(status, RunStatus::Failure);
}

// ---------------------------------------------------------------------------
// Test: domain failures are classified
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mismatched_output_type_is_invalid_output() {
    let gateway = start_gateway(Duration::ZERO).await;

    let err = gateway.client.submit_job(&JobSubmission::new("mismatched")).await.unwrap_err();

    assert_matches!(err, ClientError::InvalidOutput(info) => {
        assert_eq!(info.step_key, "store");
        assert_eq!(info.output_name, "rows");
        assert_eq!(info.expected_type, "Table");
        assert_eq!(info.actual_type.as_deref(), Some("Rows"));
    });
}

#[tokio::test]
async fn unknown_mode_and_pipeline_are_invalid_input() {
    let gateway = start_gateway(Duration::ZERO).await;

    let err = gateway
        .client
        .submit_job(&JobSubmission::new("daily").mode("staging").run_config(daily_config()))
        .await
        .unwrap_err();
    assert_matches!(err, ClientError::InvalidInput { typename: "ModeNotFoundError", .. });

    let err = gateway.client.submit_job(&JobSubmission::new("nightly")).await.unwrap_err();
    assert_matches!(err, ClientError::InvalidInput { typename: "PipelineNotFoundError", .. });

    let err = gateway.client.submit_job(&JobSubmission::new("daily")).await.unwrap_err();
    assert_matches!(err, ClientError::InvalidInput { typename: "PipelineConfigValidationInvalid", .. });
}

#[tokio::test]
async fn unknown_run_is_not_found() {
    let gateway = start_gateway(Duration::ZERO).await;

    let err = gateway.client.get_run_status(uuid::Uuid::new_v4()).await.unwrap_err();

    assert_matches!(err, ClientError::NotFound { typename: "PipelineRunNotFoundError", .. });
}

// ---------------------------------------------------------------------------
// Test: terminate an active run, then again once it is canceled
// ---------------------------------------------------------------------------

#[tokio::test]
async fn terminate_active_run() {
    let gateway = start_gateway(Duration::from_secs(5)).await;
    let run_id = gateway
        .client
        .submit_job(&JobSubmission::new("daily").run_config(daily_config()))
        .await
        .unwrap();

    let outcome = gateway.client.terminate_run(run_id).await.unwrap();
    assert_matches!(outcome, TerminateOutcome::Requested { .. });

    let status = gateway.client.poll_run(run_id, Duration::from_secs(10)).await.unwrap();
    assert_eq!(status, RunStatus::Canceled);

    let outcome = gateway.client.terminate_run(run_id).await.unwrap();
    assert_matches!(outcome, TerminateOutcome::NotTerminable { status: RunStatus::Canceled, .. });
}

#[tokio::test]
async fn poll_times_out_without_touching_the_run() {
    let gateway = start_gateway(Duration::from_secs(5)).await;
    let run_id = gateway
        .client
        .submit_job(&JobSubmission::new("daily").run_config(daily_config()))
        .await
        .unwrap();

    let err = gateway.client.poll_run(run_id, Duration::from_millis(100)).await.unwrap_err();
    assert_matches!(err, ClientError::Timeout { .. });

    let status = gateway.client.get_run_status(run_id).await.unwrap();
    assert!(!status.is_terminal());
    gateway.client.terminate_run(run_id).await.unwrap();
}

// ---------------------------------------------------------------------------
// Test: reload outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reload_skips_unchanged_and_picks_up_changes() {
    let gateway = start_gateway(Duration::ZERO).await;

    let unchanged = gateway.client.reload_repository_location("ingest").await.unwrap();
    assert_eq!(unchanged.status, ReloadRepositoryLocationStatus::Skipped);

    std::fs::write(gateway.location_file.path(), repository_json("Daily ingest v2").to_string()).unwrap();
    let reloaded = gateway.client.reload_repository_location("ingest").await.unwrap();
    assert_eq!(reloaded.status, ReloadRepositoryLocationStatus::Success);

    std::fs::write(gateway.location_file.path(), "{ not json").unwrap();
    let failed = gateway.client.reload_repository_location("ingest").await.unwrap();
    assert_eq!(failed.status, ReloadRepositoryLocationStatus::Error);

    let err = gateway.client.reload_repository_location("elsewhere").await.unwrap_err();
    assert_matches!(err, ClientError::NotFound { typename: "RepositoryLocationNotFound", .. });
}

#[tokio::test]
async fn reload_addresses_location_names_with_reserved_characters() {
    let gateway = start_gateway_with_location("team/ingest daily", Duration::ZERO).await;

    let info = gateway.client.reload_repository_location("team/ingest daily").await.unwrap();
    assert_eq!(info.status, ReloadRepositoryLocationStatus::Skipped);
    assert!(info.message.unwrap().contains("team/ingest daily"));

    let err = gateway.client.reload_repository_location("team/other").await.unwrap_err();
    assert_matches!(err, ClientError::NotFound { typename: "RepositoryLocationNotFound", .. });
}

// ---------------------------------------------------------------------------
// Test: log subscriptions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscription_streams_until_run_success() {
    let gateway = start_gateway(Duration::from_millis(20)).await;
    let run_id = gateway
        .client
        .submit_job(&JobSubmission::new("daily").run_config(daily_config()))
        .await
        .unwrap();

    let stream = gateway.client.subscribe_run_logs(run_id).await.unwrap();
    let events = tokio::time::timeout(Duration::from_secs(10), stream.collect_all())
        .await
        .expect("subscription did not finish")
        .unwrap();

    assert_eq!(events.first().map(|e| e.event_type()), Some(EventType::RunEnqueued));
    assert_eq!(events.last().map(|e| e.event_type()), Some(EventType::RunSuccess));
    let step_successes = events.iter().filter(|e| e.event_type() == EventType::StepSuccess).count();
    assert_eq!(step_successes, 2);
    assert!(events.windows(2).all(|pair| pair[0].sequence() < pair[1].sequence()));
}

#[tokio::test]
async fn subscription_to_unknown_run_is_not_found() {
    let gateway = start_gateway(Duration::ZERO).await;

    let mut stream = gateway.client.subscribe_run_logs(uuid::Uuid::new_v4()).await.unwrap();

    let first = stream.next_batch().await.expect("one failure frame");
    assert_matches!(first, Err(ClientError::NotFound { .. }));
    assert!(stream.next_batch().await.is_none());
}

#[tokio::test]
async fn closing_a_subscription_leaves_the_run_running() {
    let gateway = start_gateway(Duration::from_secs(5)).await;
    let run_id = gateway
        .client
        .submit_job(&JobSubmission::new("daily").run_config(daily_config()))
        .await
        .unwrap();

    let mut stream = gateway.client.subscribe_run_logs(run_id).await.unwrap();
    let history = stream.next_batch().await.expect("history batch").unwrap();
    assert_eq!(history.first().map(|e| e.event_type()), Some(EventType::RunEnqueued));
    assert_eq!(stream.run_id(), Some(run_id));

    stream.close().await.unwrap();

    let status = gateway.client.get_run_status(run_id).await.unwrap();
    assert!(!status.is_terminal());
    gateway.client.terminate_run(run_id).await.unwrap();
}
