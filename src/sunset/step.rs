use crate::error::SunsetError;
use crate::sunset::alert::{self, with_alert};
use crate::sunset::archival::{
    StepKind, TaskState, cleanup_archival, kickoff_archival, poll_reindex_task,
};
use crate::sunset::cluster::SearchCluster;
use crate::sunset::config::SunsetConfig;
use crate::sunset::notify::NotificationSink;
use crate::sunset::scan::{scan_large_indexes, threshold_bytes};
use anyhow::{Context, Result};
use serde_json::{Value, json};

/// Route one step-invocation request from an external workflow engine.
///
/// The request names a step; the response is that step's output, ready to
/// be fed back in as the next request. Every step runs under the alerting
/// wrapper, so a scheduler driving this contract needs no alerting of its
/// own.
pub fn dispatch(
    cluster: &dyn SearchCluster,
    sink: &dyn NotificationSink,
    config: &SunsetConfig,
    request: &Value,
) -> Result<Value> {
    let step: Option<StepKind> = request
        .get("step")
        .and_then(|value| serde_json::from_value(value.clone()).ok());
    let Some(step) = step else {
        return Err(SunsetError::Validation(format!(
            "invalid or missing 'step' in payload: {request}"
        ))
        .into());
    };

    match step {
        StepKind::FindLargeIndexes => with_alert(sink, step.as_str(), || {
            find_large_indexes_step(cluster, sink, config, request)
        }),
        StepKind::KickoffArchival => with_alert(sink, step.as_str(), || {
            let index = request
                .get("index")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|index| !index.is_empty())
                .ok_or_else(|| {
                    anyhow::Error::from(SunsetError::Validation(format!(
                        "missing 'index' in payload: {request}"
                    )))
                })?;
            let state = kickoff_archival(cluster, index)?;
            serde_json::to_value(&state).context("failed to serialize task state")
        }),
        StepKind::PollReindexTask => with_alert(sink, step.as_str(), || {
            let state = task_state_from(request)?;
            let next = poll_reindex_task(cluster, &state)?;
            serde_json::to_value(&next).context("failed to serialize task state")
        }),
        StepKind::CleanupArchival => with_alert(sink, step.as_str(), || {
            let state = task_state_from(request)?;
            let outcome = cleanup_archival(cluster, sink, &state)?;
            serde_json::to_value(&outcome).context("failed to serialize cleanup outcome")
        }),
    }
}

fn find_large_indexes_step(
    cluster: &dyn SearchCluster,
    sink: &dyn NotificationSink,
    config: &SunsetConfig,
    request: &Value,
) -> Result<Value> {
    let override_gb = request
        .get("execution_input")
        .and_then(|input| input.get("threshold_override"))
        .and_then(Value::as_f64);
    let gb = override_gb.unwrap_or(config.scan.threshold_gb);
    if !(gb > 0.0) {
        return Err(SunsetError::Validation(format!("invalid threshold_override: {gb}")).into());
    }

    let threshold = threshold_bytes(gb);
    let candidates = scan_large_indexes(cluster, threshold)?;
    for candidate in &candidates {
        alert::notify_large_index(sink, &candidate.name, candidate.size_bytes, threshold);
    }
    let names: Vec<&str> = candidates
        .iter()
        .map(|candidate| candidate.name.as_str())
        .collect();
    Ok(json!(names))
}

fn task_state_from(request: &Value) -> Result<TaskState> {
    serde_json::from_value(request.clone()).map_err(|err| {
        anyhow::Error::from(SunsetError::Validation(format!(
            "invalid task state payload: {err}"
        )))
    })
}
