//! Integration tests for `/runs` and `/assets`.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{get, get_data, launch_etl, post_data, post_json, wait_for_terminal};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: a launched run executes every step and succeeds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn launched_run_succeeds() {
    let app = common::build_test_app().await;
    let data = post_data(
        &app,
        "/api/v1/runs",
        json!({
            "selector": {"pipeline_name": "etl"},
            "run_config": common::etl_run_config(),
        }),
    )
    .await;

    assert_eq!(data["__typename"], "LaunchRunSuccess");
    let run = &data["run"];
    assert_eq!(run["pipeline_name"], "etl");
    assert_eq!(run["mode"], "prod");
    assert_eq!(run["pipeline"]["__typename"], "Pipeline");
    assert_eq!(
        run["run_config"]["solids"]["extract"]["config"]["batch_size"],
        500
    );

    let run_id = run["run_id"].as_str().unwrap();
    let finished = wait_for_terminal(&app, run_id).await;
    assert_eq!(finished["__typename"], "PipelineRun");
    assert_eq!(finished["status"], "SUCCESS");
    assert_eq!(finished["can_terminate"], false);
}

#[tokio::test]
async fn run_stats_count_steps_and_materializations() {
    let app = common::build_test_app().await;
    let run_id = launch_etl(&app).await;
    wait_for_terminal(&app, &run_id).await;

    let stats = get_data(&app, &format!("/api/v1/runs/{run_id}/stats")).await;
    assert_eq!(stats["__typename"], "PipelineRunStatsSnapshot");
    assert_eq!(stats["steps_succeeded"], 4);
    assert_eq!(stats["steps_failed"], 0);
    assert_eq!(stats["materializations"], 1);
    assert!(stats["end_time"].is_string());
}

#[tokio::test]
async fn configured_step_failure_fails_the_run() {
    let app = common::build_test_app().await;
    let data = post_data(
        &app,
        "/api/v1/runs",
        json!({
            "selector": {"pipeline_name": "etl"},
            "run_config": {"solids": {"extract": {"config": {"source": "s3://events", "fail": true}}}},
        }),
    )
    .await;
    let run_id = data["run"]["run_id"].as_str().unwrap();

    let finished = wait_for_terminal(&app, run_id).await;
    assert_eq!(finished["status"], "FAILURE");

    let events = get_data(
        &app,
        &format!("/api/v1/runs/{run_id}/events?filter=type:STEP_FAILURE"),
    )
    .await;
    let events = events["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["__typename"], "ExecutionStepFailureEvent");
    assert_eq!(events[0]["step_key"], "extract");
}

// ---------------------------------------------------------------------------
// Test: launch failures come back as typed union members
// ---------------------------------------------------------------------------

#[tokio::test]
async fn launch_with_unknown_mode_names_the_mode() {
    let app = common::build_test_app().await;
    let data = post_data(
        &app,
        "/api/v1/runs",
        json!({
            "selector": {"pipeline_name": "etl"},
            "mode": "staging",
            "run_config": common::etl_run_config(),
        }),
    )
    .await;

    assert_eq!(data["__typename"], "ModeNotFoundError");
    assert_eq!(data["mode"], "staging");
    assert_eq!(data["pipeline_name"], "etl");
}

#[tokio::test]
async fn launch_with_unknown_preset_is_typed_error() {
    let app = common::build_test_app().await;
    let data = post_data(
        &app,
        "/api/v1/runs",
        json!({"selector": {"pipeline_name": "etl"}, "preset": "weekly"}),
    )
    .await;

    assert_eq!(data["__typename"], "PresetNotFoundError");
    assert_eq!(data["preset"], "weekly");
}

#[tokio::test]
async fn preset_supplies_mode_config_and_tags() {
    let app = common::build_test_app().await;
    let data = post_data(
        &app,
        "/api/v1/runs",
        json!({"selector": {"pipeline_name": "etl"}, "preset": "nightly"}),
    )
    .await;

    assert_eq!(data["__typename"], "LaunchRunSuccess");
    let tags = data["run"]["tags"].as_array().unwrap();
    assert!(tags.contains(&json!({"key": "schedule", "value": "nightly"})));
    assert!(tags.contains(&json!({"key": "team", "value": "data"})));
}

#[tokio::test]
async fn preset_with_explicit_mode_is_invalid_request() {
    let app = common::build_test_app().await;
    let data = post_data(
        &app,
        "/api/v1/runs",
        json!({"selector": {"pipeline_name": "etl"}, "preset": "nightly", "mode": "test"}),
    )
    .await;

    assert_eq!(data["__typename"], "InvalidRequestError");
    assert_eq!(data["reason"], "INVALID_REQUEST");
}

#[tokio::test]
async fn launch_with_invalid_config_creates_no_run() {
    let app = common::build_test_app().await;
    let data = post_data(
        &app,
        "/api/v1/runs",
        json!({"selector": {"pipeline_name": "etl"}, "run_config": {"solids": {"extract": {"config": {"source": 7}}}}}),
    )
    .await;

    assert_eq!(data["__typename"], "PipelineConfigValidationInvalid");
    assert_eq!(data["errors"][0]["__typename"], "RuntimeMismatchConfigError");

    let runs = get_data(&app, "/api/v1/runs").await;
    assert_eq!(runs["count"], 0);
}

#[tokio::test]
async fn launch_with_mismatched_wiring_is_invalid_output() {
    let app = common::build_test_app().await;
    let data = post_data(
        &app,
        "/api/v1/runs",
        json!({"selector": {"pipeline_name": "broken"}}),
    )
    .await;

    assert_eq!(data["__typename"], "InvalidOutputError");
    assert_eq!(data["step_key"], "load");
}

// ---------------------------------------------------------------------------
// Test: unknown and malformed run ids are not found, with HTTP 200
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_run_is_typed_not_found() {
    let app = common::build_test_app().await;
    let missing = uuid::Uuid::new_v4().to_string();

    let response = get(app.clone(), &format!("/api/v1/runs/{missing}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let data = get_data(&app, &format!("/api/v1/runs/{missing}")).await;
    assert_eq!(data["__typename"], "PipelineRunNotFoundError");
    assert_eq!(data["run_id"], missing);
}

#[tokio::test]
async fn malformed_run_id_is_typed_not_found() {
    let app = common::build_test_app().await;

    for path in ["", "/stats", "/events"] {
        let data = get_data(&app, &format!("/api/v1/runs/not-a-uuid{path}")).await;
        assert_eq!(data["__typename"], "PipelineRunNotFoundError", "{path}");
        assert_eq!(data["run_id"], "not-a-uuid");
    }
}

// ---------------------------------------------------------------------------
// Test: run listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn runs_are_listed_newest_first_and_filtered() {
    let app = common::build_test_app().await;
    let first = launch_etl(&app).await;
    let second = launch_etl(&app).await;
    wait_for_terminal(&app, &first).await;
    wait_for_terminal(&app, &second).await;

    let runs = get_data(&app, "/api/v1/runs").await;
    assert_eq!(runs["__typename"], "PipelineRuns");
    assert_eq!(runs["count"], 2);
    assert_eq!(runs["results"][0]["run_id"], second);
    assert_eq!(runs["results"][1]["run_id"], first);

    let limited = get_data(&app, "/api/v1/runs?limit=1").await;
    assert_eq!(limited["count"], 1);

    let failed = get_data(&app, "/api/v1/runs?status=failure").await;
    assert_eq!(failed["count"], 0);

    let other = get_data(&app, "/api/v1/runs?pipeline=broken").await;
    assert_eq!(other["count"], 0);
}

#[tokio::test]
async fn unknown_status_filter_is_invalid_request() {
    let app = common::build_test_app().await;
    let data = get_data(&app, "/api/v1/runs?status=sleeping").await;

    assert_eq!(data["__typename"], "InvalidRequestError");
    assert_eq!(data["reason"], "INVALID_REQUEST");
}

// ---------------------------------------------------------------------------
// Test: event log paging and filters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn events_are_filtered_and_paged() {
    let app = common::build_test_app().await;
    let run_id = launch_etl(&app).await;
    wait_for_terminal(&app, &run_id).await;

    let all = get_data(&app, &format!("/api/v1/runs/{run_id}/events")).await;
    assert_eq!(all["__typename"], "EventConnection");
    assert_eq!(all["filter"], json!(null));
    let events = all["events"].as_array().unwrap();
    assert_eq!(events[0]["event_type"], "RUN_ENQUEUED");
    assert_eq!(events.last().unwrap()["event_type"], "RUN_SUCCESS");
    let cursor = all["cursor"].as_u64().unwrap();

    let rest = get_data(&app, &format!("/api/v1/runs/{run_id}/events?after={cursor}")).await;
    assert_eq!(rest["events"], json!([]));
    assert_eq!(rest["cursor"], cursor);

    let load = get_data(&app, &format!("/api/v1/runs/{run_id}/events?filter=step:load")).await;
    assert_eq!(load["filter"], "step:load");
    let load_events = load["events"].as_array().unwrap();
    assert!(!load_events.is_empty());
    assert!(load_events.iter().all(|e| e["step_key"] == "load"));
    assert!(load_events
        .iter()
        .any(|e| e["__typename"] == "StepMaterializationEvent"));
}

#[tokio::test]
async fn unknown_level_is_invalid_request() {
    let app = common::build_test_app().await;
    let run_id = launch_etl(&app).await;

    let data = get_data(&app, &format!("/api/v1/runs/{run_id}/events?levels=LOUD")).await;
    assert_eq!(data["__typename"], "InvalidRequestError");
}

// ---------------------------------------------------------------------------
// Test: termination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn terminating_an_active_run_cancels_it() {
    let app = common::build_app(common::test_instance(Duration::from_secs(5)).await);
    let run_id = launch_etl(&app).await;

    let data = post_data(&app, &format!("/api/v1/runs/{run_id}/terminate"), json!({})).await;
    assert_eq!(data["__typename"], "TerminateRunSuccess");
    assert_eq!(data["run"]["status"], "CANCELING");

    let finished = wait_for_terminal(&app, &run_id).await;
    assert_eq!(finished["status"], "CANCELED");

    let again = post_data(&app, &format!("/api/v1/runs/{run_id}/terminate"), json!({})).await;
    assert_eq!(again["__typename"], "TerminateRunFailure");
    assert_eq!(again["run"]["status"], "CANCELED");
}

#[tokio::test]
async fn terminating_a_finished_run_fails_with_the_run() {
    let app = common::build_test_app().await;
    let run_id = launch_etl(&app).await;
    wait_for_terminal(&app, &run_id).await;

    let data = post_data(&app, &format!("/api/v1/runs/{run_id}/terminate"), json!({})).await;
    assert_eq!(data["__typename"], "TerminateRunFailure");
    assert_eq!(data["run"]["run_id"], run_id);
    assert_eq!(data["run"]["status"], "SUCCESS");
}

#[tokio::test]
async fn terminating_an_unknown_run_is_not_found() {
    let app = common::build_test_app().await;
    let missing = uuid::Uuid::new_v4();
    let data = post_data(&app, &format!("/api/v1/runs/{missing}/terminate"), json!({})).await;

    assert_eq!(data["__typename"], "PipelineRunNotFoundError");
}

// ---------------------------------------------------------------------------
// Test: assets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn asset_lists_materializations() {
    let app = common::build_test_app().await;
    let run_id = launch_etl(&app).await;
    wait_for_terminal(&app, &run_id).await;

    let asset = get_data(&app, "/api/v1/assets/warehouse/events").await;
    assert_eq!(asset["__typename"], "Asset");
    assert_eq!(asset["asset_key"], "warehouse/events");
    assert_eq!(asset["path"], json!(["warehouse", "events"]));

    let materializations = asset["materializations"].as_array().unwrap();
    assert_eq!(materializations.len(), 1);
    assert_eq!(materializations[0]["run_id"], run_id);
    assert_eq!(materializations[0]["step_key"], "load");
}

#[tokio::test]
async fn unknown_asset_is_typed_error() {
    let app = common::build_test_app().await;
    let data = get_data(&app, "/api/v1/assets/nothing/here").await;

    assert_eq!(data["__typename"], "AssetNotFoundError");
    assert_eq!(data["asset_key"], "nothing/here");
}

// ---------------------------------------------------------------------------
// Test: malformed bodies are rejected before reaching the engine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn launch_without_selector_is_rejected() {
    let app = common::build_test_app().await;
    let response = post_json(app, "/api/v1/runs", json!({"mode": "prod"})).await;

    assert!(response.status().is_client_error());
    let body = common::body_json(response).await;
    assert_eq!(body["code"], "INVALID_BODY");
    assert!(body["error"].is_string());
}
