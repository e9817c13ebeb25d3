//! Query and mutation facades.
//!
//! Each handler calls one engine operation and answers `200` with the
//! operation's result union, whichever member it holds.

pub mod assets;
pub mod locations;
pub mod pipelines;
pub mod runs;
pub mod schema;

use flowgate_core::run::RunRecord;
use flowgate_engine::{Instance, PipelineSelector, PipelineView, SnapshotRecord};
use flowgate_schema::{Pipeline, PipelineReference, PipelineRun, PipelineSnapshot, UnknownPipeline};

/// Split a comma-separated query parameter. Blank input means "unset".
pub(crate) fn split_param(raw: Option<&str>) -> Option<Vec<String>> {
    let items: Vec<String> = raw?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!items.is_empty()).then_some(items)
}

pub(crate) fn project_pipeline(view: PipelineView, solid_selection: Option<Vec<String>>) -> Pipeline {
    Pipeline::project(
        &view.pipeline,
        &view.location_name,
        view.snapshot_id,
        view.parent_snapshot_id,
        solid_selection,
    )
}

pub(crate) fn project_snapshot(record: SnapshotRecord) -> PipelineSnapshot {
    PipelineSnapshot::project(
        &record.pipeline,
        &record.location_name,
        record.snapshot_id,
        record.parent_snapshot_id,
        record.created_at,
    )
}

/// Project a run, resolving its pipeline against the current workspace.
/// A pipeline that is no longer served becomes an `UnknownPipeline`.
pub(crate) async fn project_run(instance: &Instance, record: &RunRecord) -> PipelineRun {
    let selector = PipelineSelector {
        pipeline_name: record.pipeline_name.clone(),
        location_name: Some(record.location_name.clone()),
        solid_selection: record.solid_selection.clone(),
    };
    let pipeline: PipelineReference = match instance.pipeline(&selector).await {
        Ok(view) => project_pipeline(view, record.solid_selection.clone()).into(),
        Err(_) => UnknownPipeline {
            name: record.pipeline_name.clone(),
            solid_selection: record.solid_selection.clone(),
        }
        .into(),
    };
    PipelineRun::project(record, pipeline)
}
