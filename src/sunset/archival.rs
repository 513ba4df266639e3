use crate::error::{ArchivalError, SunsetError};
use crate::sunset::cluster::SearchCluster;
use crate::sunset::notify::NotificationSink;
use crate::sunset::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Reindex slices are capped to keep a wide source index from overloading
/// the cluster with parallel copy sub-tasks.
pub const MAX_REINDEX_SLICES: u32 = 64;

/// Index settings the cluster generates and refuses on creation, plus any
/// write block captured from the source.
const STRIPPED_SETTINGS: [&str; 5] = [
    "uuid",
    "version",
    "creation_date",
    "provided_name",
    "blocks",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchivalStatus {
    InProgress,
    Completed,
    Archived,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    FindLargeIndexes,
    KickoffArchival,
    PollReindexTask,
    CleanupArchival,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FindLargeIndexes => "find_large_indexes",
            Self::KickoffArchival => "kickoff_archival",
            Self::PollReindexTask => "poll_reindex_task",
            Self::CleanupArchival => "cleanup_archival",
        }
    }
}

/// The unit handed between orchestration steps. Serializable so an external
/// scheduler can park it between polls; it is the sole carrier of progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub index: String,
    pub new_index: String,
    pub task_id: String,
    pub status: ArchivalStatus,
    pub step: StepKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupOutcome {
    pub index: String,
    pub new_index: String,
    pub status: ArchivalStatus,
}

pub fn archive_index_name(index: &str, date: NaiveDate) -> String {
    format!("{index}-{}", date.format("%m%d%Y"))
}

pub fn combined_alias_name(index: &str) -> String {
    format!("{index}-combined")
}

pub fn reindex_slices(shards: u32) -> u32 {
    (shards * 2).min(MAX_REINDEX_SLICES)
}

fn index_settings_object<'a>(response: &'a Value, index: &str) -> Result<&'a Map<String, Value>> {
    response
        .get(index)
        .and_then(|v| v.get("settings"))
        .and_then(|v| v.get("index"))
        .and_then(Value::as_object)
        .with_context(|| format!("settings payload for {index} missing settings.index object"))
}

/// Copy of the source settings fit for creating the destination: generated
/// identity fields and block flags removed, replicas forced to zero for the
/// duration of the bulk copy.
fn sanitized_settings(response: &Value, index: &str) -> Result<Value> {
    let mut settings = index_settings_object(response, index)?.clone();
    for key in STRIPPED_SETTINGS {
        settings.remove(key);
    }
    settings.insert(
        "number_of_replicas".to_string(),
        Value::String("0".to_string()),
    );
    Ok(Value::Object(settings))
}

fn shard_count(response: &Value, index: &str) -> Result<u32> {
    let raw = index_settings_object(response, index)?
        .get("number_of_shards")
        .with_context(|| format!("settings payload for {index} missing number_of_shards"))?;
    match raw {
        Value::String(s) => s
            .trim()
            .parse()
            .with_context(|| format!("invalid number_of_shards for {index}: {s}")),
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .with_context(|| format!("invalid number_of_shards for {index}: {n}")),
        other => Err(anyhow::anyhow!(
            "invalid number_of_shards for {index}: {other}"
        )),
    }
}

struct SourceSchema {
    mappings: Value,
    settings: Value,
    shards: u32,
}

fn snapshot_source_schema(cluster: &dyn SearchCluster, index: &str) -> Result<SourceSchema> {
    let mapping_response = cluster
        .mapping(index)
        .with_context(|| format!("failed to read mapping of {index}"))?;
    let settings_response = cluster
        .settings(index)
        .with_context(|| format!("failed to read settings of {index}"))?;
    let mappings = mapping_response
        .get(index)
        .and_then(|v| v.get("mappings"))
        .cloned()
        .with_context(|| format!("mapping payload for {index} missing mappings object"))?;
    let shards = shard_count(&settings_response, index)?;
    let settings = sanitized_settings(&settings_response, index)?;
    Ok(SourceSchema {
        mappings,
        settings,
        shards,
    })
}

/// Restore write access after a failed kickoff. The compensation's own
/// failure is escalated as a distinct error naming both indices, never
/// silently folded into the primary failure.
fn compensate_unblock(
    cluster: &dyn SearchCluster,
    index: &str,
    new_index: &str,
    primary: ArchivalError,
) -> anyhow::Error {
    match cluster.set_read_only(index, false) {
        Ok(()) => primary.into(),
        Err(unblock_err) => {
            warn::emit(WarnEvent {
                code: "UNBLOCK_FAILED",
                stage: "kickoff_archival",
                index,
                new_index,
                reason: "compensation-failed",
                err: &format!("{unblock_err:#}"),
            });
            ArchivalError::new(format!(
                "failed to restore write access to {index} while recovering from: {}",
                primary.message
            ))
            .with_index(index)
            .with_new_index(new_index)
            .with_cause(unblock_err)
            .into()
        }
    }
}

pub fn kickoff_archival(cluster: &dyn SearchCluster, index: &str) -> Result<TaskState> {
    kickoff_archival_on(cluster, index, Utc::now().date_naive())
}

pub(crate) fn kickoff_archival_on(
    cluster: &dyn SearchCluster,
    index: &str,
    date: NaiveDate,
) -> Result<TaskState> {
    if index.trim().is_empty() {
        return Err(SunsetError::Validation("missing index name".to_string()).into());
    }
    if !cluster
        .exists(index)
        .with_context(|| format!("failed to check index {index}"))?
    {
        return Err(SunsetError::Validation(format!("index {index} does not exist")).into());
    }

    let new_index = archive_index_name(index, date);
    if cluster
        .exists(&new_index)
        .with_context(|| format!("failed to check index {new_index}"))?
    {
        return Err(SunsetError::Validation(format!("index {new_index} already exists")).into());
    }

    // The write block is the consistency boundary for the whole migration.
    // Nothing was mutated before it, so a failure here needs no rollback.
    cluster.set_read_only(index, true).map_err(|err| {
        ArchivalError::new(format!("failed to set {index} read-only"))
            .with_index(index)
            .with_cause(err)
    })?;

    let schema = match snapshot_source_schema(cluster, index) {
        Ok(schema) => schema,
        Err(err) => {
            let primary =
                ArchivalError::new(format!("failed to snapshot mapping and settings of {index}"))
                    .with_index(index)
                    .with_cause(err);
            return Err(compensate_unblock(cluster, index, &new_index, primary));
        }
    };

    if let Err(err) = cluster.create_index(&new_index, &schema.settings, &schema.mappings) {
        let primary = ArchivalError::new(format!(
            "failed to create {new_index} from the schema of {index}"
        ))
        .with_index(index)
        .with_new_index(&new_index)
        .with_cause(err);
        return Err(compensate_unblock(cluster, index, &new_index, primary));
    }

    match cluster.start_reindex(index, &new_index, reindex_slices(schema.shards)) {
        Ok(task_id) => Ok(TaskState {
            index: index.to_string(),
            new_index,
            task_id,
            status: ArchivalStatus::InProgress,
            step: StepKind::PollReindexTask,
        }),
        Err(err) => {
            let primary =
                ArchivalError::new(format!("failed to start reindex of {index} into {new_index}"))
                    .with_index(index)
                    .with_new_index(&new_index)
                    .with_cause(err);
            // The destination exists now; drop it before restoring writes.
            if let Err(delete_err) = cluster.delete_index(&new_index) {
                warn::emit(WarnEvent {
                    code: "DELETE_FAILED",
                    stage: "kickoff_archival",
                    index,
                    new_index: &new_index,
                    reason: "compensation-failed",
                    err: &format!("{delete_err:#}"),
                });
                return Err(ArchivalError::new(format!(
                    "failed to delete {new_index} while recovering from: {}",
                    primary.message
                ))
                .with_index(index)
                .with_new_index(&new_index)
                .with_cause(delete_err)
                .into());
            }
            Err(compensate_unblock(cluster, index, &new_index, primary))
        }
    }
}

/// Single status probe of the asynchronous reindex. No cluster state
/// changes here, so a transient failure is safe to re-invoke; waiting
/// between probes is the caller's job.
pub fn poll_reindex_task(cluster: &dyn SearchCluster, state: &TaskState) -> Result<TaskState> {
    if state.task_id.trim().is_empty() {
        return Err(SunsetError::Validation("missing task_id in task state".to_string()).into());
    }

    let progress = cluster
        .task_status(&state.task_id)
        .with_context(|| format!("failed to read status of task {}", state.task_id))?;

    if progress.completed {
        Ok(TaskState {
            status: ArchivalStatus::Completed,
            step: StepKind::CleanupArchival,
            ..state.clone()
        })
    } else {
        Ok(TaskState {
            status: ArchivalStatus::InProgress,
            step: StepKind::PollReindexTask,
            ..state.clone()
        })
    }
}

pub fn cleanup_archival(
    cluster: &dyn SearchCluster,
    sink: &dyn NotificationSink,
    state: &TaskState,
) -> Result<CleanupOutcome> {
    let index = state.index.as_str();
    let new_index = state.new_index.as_str();
    if index.trim().is_empty() || new_index.trim().is_empty() {
        return Err(
            SunsetError::Validation("task state missing index or new_index".to_string()).into(),
        );
    }

    cluster.refresh(new_index).map_err(|err| {
        ArchivalError::new(format!("failed to refresh {new_index}"))
            .with_index(index)
            .with_new_index(new_index)
            .with_cause(err)
    })?;

    // Count divergence means documents were lost in the copy. The source is
    // the only intact copy at this point: raise without deleting anything.
    let source_docs = cluster
        .count(index)
        .with_context(|| format!("failed to count documents in {index}"))?;
    let dest_docs = cluster
        .count(new_index)
        .with_context(|| format!("failed to count documents in {new_index}"))?;
    if source_docs != dest_docs {
        return Err(SunsetError::DataLoss {
            index: index.to_string(),
            new_index: new_index.to_string(),
            source_docs,
            dest_docs,
        }
        .into());
    }

    // Unblock before deleting, so a late failure leaves a writable index
    // rather than a stuck read-only one.
    cluster.set_read_only(index, false).map_err(|err| {
        ArchivalError::new(format!("failed to remove write block on {index}"))
            .with_index(index)
            .with_new_index(new_index)
            .with_cause(err)
    })?;

    let replicas = cluster
        .settings(index)
        .and_then(|response| {
            index_settings_object(&response, index)?
                .get("number_of_replicas")
                .cloned()
                .with_context(|| format!("settings payload for {index} missing number_of_replicas"))
        })
        .map_err(|err| {
            ArchivalError::new(format!("failed to read replica count of {index}"))
                .with_index(index)
                .with_new_index(new_index)
                .with_cause(err)
        })?;
    cluster
        .put_settings(new_index, &json!({"number_of_replicas": replicas}))
        .map_err(|err| {
            ArchivalError::new(format!("failed to restore replica count on {new_index}"))
                .with_index(index)
                .with_new_index(new_index)
                .with_cause(err)
        })?;

    cluster.delete_index(index).map_err(|err| {
        ArchivalError::new(format!("failed to delete {index} after archival"))
            .with_index(index)
            .with_new_index(new_index)
            .with_cause(err)
    })?;

    // Ensure, not create-exclusive: every generation matching `{index}*`
    // stays reachable through one combined alias.
    let alias = combined_alias_name(index);
    let actions = json!([
        {"add": {"index": format!("{index}*"), "alias": alias}}
    ]);
    cluster.update_aliases(&actions).map_err(|err| {
        ArchivalError::new(format!("failed to ensure combined alias for {index}"))
            .with_index(index)
            .with_new_index(new_index)
            .with_cause(err)
    })?;

    let payload = json!({
        "msg": format!("completed archival of {index} into {new_index}"),
        "index": index,
        "new_index": new_index,
    });
    sink.notify("ArchivalComplete", "Archival Complete", &payload)
        .context("failed to send archival completion notice")?;

    Ok(CleanupOutcome {
        index: index.to_string(),
        new_index: new_index.to_string(),
        status: ArchivalStatus::Archived,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sunset::cluster::mock::{MockCluster, MockIndex};
    use crate::sunset::notify::LogSink;

    fn aug_6_2026() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 6).expect("valid date")
    }

    fn kickoff(cluster: &MockCluster, index: &str) -> Result<TaskState> {
        kickoff_archival_on(cluster, index, aug_6_2026())
    }

    #[test]
    fn destination_name_carries_the_date_stamp() {
        assert_eq!(
            archive_index_name("telemetry-data", aug_6_2026()),
            "telemetry-data-08062026"
        );
    }

    #[test]
    fn slice_count_scales_with_shards_and_is_capped() {
        assert_eq!(reindex_slices(1), 2);
        assert_eq!(reindex_slices(5), 10);
        assert_eq!(reindex_slices(32), 64);
        assert_eq!(reindex_slices(40), 64);
    }

    #[test]
    fn kickoff_rejects_missing_source() {
        let cluster = MockCluster::new();
        let err = kickoff(&cluster, "telemetry-data").expect_err("should fail");
        assert!(matches!(
            err.downcast_ref::<SunsetError>(),
            Some(SunsetError::Validation(_))
        ));
    }

    #[test]
    fn kickoff_rejects_same_day_repeat() {
        let cluster = MockCluster::new();
        cluster.add_index("telemetry-data", MockIndex::with_docs(500, 1024));
        cluster.add_index("telemetry-data-08062026", MockIndex::with_docs(0, 0));

        let err = kickoff(&cluster, "telemetry-data").expect_err("should fail");
        let message = err.to_string();
        assert!(matches!(
            err.downcast_ref::<SunsetError>(),
            Some(SunsetError::Validation(_))
        ));
        assert!(message.contains("telemetry-data-08062026"));
        // No mutation happened: the source is still writable.
        assert_eq!(cluster.is_read_only("telemetry-data"), Some(false));
    }

    #[test]
    fn kickoff_blocks_source_and_creates_sanitized_destination() {
        let cluster = MockCluster::new();
        cluster.add_index("telemetry-data", MockIndex::with_docs(500, 1024));

        let state = kickoff(&cluster, "telemetry-data").expect("kickoff");
        assert_eq!(state.index, "telemetry-data");
        assert_eq!(state.new_index, "telemetry-data-08062026");
        assert_eq!(state.status, ArchivalStatus::InProgress);
        assert_eq!(state.step, StepKind::PollReindexTask);
        assert!(!state.task_id.is_empty());

        assert_eq!(cluster.is_read_only("telemetry-data"), Some(true));
        let created = cluster
            .created_settings("telemetry-data-08062026")
            .expect("destination created");
        for key in STRIPPED_SETTINGS {
            assert!(created.get(key).is_none(), "{key} should be stripped");
        }
        assert_eq!(
            created.get("number_of_replicas").and_then(Value::as_str),
            Some("0")
        );
        assert_eq!(
            created.get("number_of_shards").and_then(Value::as_str),
            Some("2")
        );
    }

    #[test]
    fn kickoff_reindex_failure_deletes_destination_and_unblocks_source() {
        let cluster = MockCluster::new();
        cluster.add_index("telemetry-data", MockIndex::with_docs(500, 1024));
        cluster.fail_on("start_reindex");

        let err = kickoff(&cluster, "telemetry-data").expect_err("should fail");
        let archival = err
            .downcast_ref::<ArchivalError>()
            .expect("archival error with context");
        assert_eq!(archival.index.as_deref(), Some("telemetry-data"));
        assert_eq!(archival.new_index.as_deref(), Some("telemetry-data-08062026"));

        assert_eq!(
            cluster.exists("telemetry-data-08062026").expect("exists"),
            false
        );
        assert_eq!(cluster.is_read_only("telemetry-data"), Some(false));
    }

    #[test]
    fn kickoff_schema_failure_unblocks_source() {
        let cluster = MockCluster::new();
        cluster.add_index("telemetry-data", MockIndex::with_docs(500, 1024));
        cluster.fail_on("settings");

        let err = kickoff(&cluster, "telemetry-data").expect_err("should fail");
        assert!(err.downcast_ref::<ArchivalError>().is_some());
        assert_eq!(cluster.is_read_only("telemetry-data"), Some(false));
        assert!(!cluster.exists("telemetry-data-08062026").expect("exists"));
    }

    #[test]
    fn failed_unblock_compensation_is_escalated_distinctly() {
        let cluster = MockCluster::new();
        cluster.add_index("telemetry-data", MockIndex::with_docs(500, 1024));
        cluster.fail_on("start_reindex");
        cluster.fail_on("unblock_writes");

        let err = kickoff(&cluster, "telemetry-data").expect_err("should fail");
        let archival = err.downcast_ref::<ArchivalError>().expect("archival error");
        assert!(archival.message.contains("restore write access"));
        assert!(archival.message.contains("while recovering from"));
    }

    #[test]
    fn poll_reports_in_progress_until_the_task_finishes() {
        let cluster = MockCluster::new();
        cluster.add_index("telemetry-data", MockIndex::with_docs(500, 1024));
        cluster.set_polls_before_complete(3);

        let state = kickoff(&cluster, "telemetry-data").expect("kickoff");
        let mut current = state.clone();
        for _ in 0..3 {
            current = poll_reindex_task(&cluster, &current).expect("poll");
            assert_eq!(current.status, ArchivalStatus::InProgress);
            assert_eq!(current.step, StepKind::PollReindexTask);
            assert_eq!(current.index, state.index);
            assert_eq!(current.new_index, state.new_index);
            assert_eq!(current.task_id, state.task_id);
        }

        current = poll_reindex_task(&cluster, &current).expect("poll");
        assert_eq!(current.status, ArchivalStatus::Completed);
        assert_eq!(current.step, StepKind::CleanupArchival);

        // Completion never reverts.
        let again = poll_reindex_task(&cluster, &current).expect("poll");
        assert_eq!(again.status, ArchivalStatus::Completed);
    }

    #[test]
    fn cleanup_archives_and_aliases_the_full_history() {
        let cluster = MockCluster::new();
        cluster.add_index("telemetry-data", MockIndex::with_docs(500, 1024));

        let state = kickoff(&cluster, "telemetry-data").expect("kickoff");
        let state = poll_reindex_task(&cluster, &state).expect("first poll");
        assert_eq!(state.status, ArchivalStatus::InProgress);
        let state = poll_reindex_task(&cluster, &state).expect("second poll");
        assert_eq!(state.status, ArchivalStatus::Completed);

        let outcome = cleanup_archival(&cluster, &LogSink, &state).expect("cleanup");
        assert_eq!(outcome.status, ArchivalStatus::Archived);
        assert_eq!(outcome.index, "telemetry-data");
        assert_eq!(outcome.new_index, "telemetry-data-08062026");

        assert!(!cluster.exists("telemetry-data").expect("exists"));
        assert!(
            cluster
                .alias_exists("telemetry-data-combined")
                .expect("alias")
        );
        assert_eq!(
            cluster.count("telemetry-data-combined").expect("count"),
            500
        );
        // Replica count is restored onto the new generation after the copy.
        assert_eq!(cluster.replicas("telemetry-data-08062026"), Some(1));
    }

    #[test]
    fn cleanup_count_mismatch_preserves_the_source() {
        let cluster = MockCluster::new();
        cluster.add_index("telemetry-data", MockIndex::with_docs(500, 1024));
        cluster.lose_docs_on_reindex(5);

        let state = kickoff(&cluster, "telemetry-data").expect("kickoff");
        let state = poll_reindex_task(&cluster, &state).expect("poll");
        let state = poll_reindex_task(&cluster, &state).expect("poll");
        assert_eq!(state.status, ArchivalStatus::Completed);

        let err = cleanup_archival(&cluster, &LogSink, &state).expect_err("should fail");
        assert!(matches!(
            err.downcast_ref::<SunsetError>(),
            Some(SunsetError::DataLoss {
                source_docs: 500,
                dest_docs: 495,
                ..
            })
        ));

        // The source is the only intact copy: it must not have been deleted.
        assert!(cluster.exists("telemetry-data").expect("exists"));
        assert_eq!(cluster.docs("telemetry-data"), Some(500));
    }

    #[test]
    fn cleanup_delete_failure_reports_both_indices() {
        let cluster = MockCluster::new();
        cluster.add_index("telemetry-data", MockIndex::with_docs(500, 1024));

        let state = kickoff(&cluster, "telemetry-data").expect("kickoff");
        let state = poll_reindex_task(&cluster, &state).expect("poll");
        let state = poll_reindex_task(&cluster, &state).expect("poll");
        cluster.fail_on("delete_index");

        let err = cleanup_archival(&cluster, &LogSink, &state).expect_err("should fail");
        let archival = err.downcast_ref::<ArchivalError>().expect("archival error");
        assert_eq!(archival.index.as_deref(), Some("telemetry-data"));
        assert_eq!(
            archival.new_index.as_deref(),
            Some("telemetry-data-08062026")
        );
        // Writes were already unblocked; both copies hold the full data.
        assert_eq!(cluster.is_read_only("telemetry-data"), Some(false));
        assert_eq!(cluster.docs("telemetry-data-08062026"), Some(500));
    }

    #[test]
    fn task_state_serializes_with_wire_vocabulary() {
        let state = TaskState {
            index: "telemetry-data".to_string(),
            new_index: "telemetry-data-08062026".to_string(),
            task_id: "node-0:1".to_string(),
            status: ArchivalStatus::InProgress,
            step: StepKind::PollReindexTask,
        };
        let wire = serde_json::to_value(&state).expect("serialize");
        assert_eq!(wire["status"], "IN_PROGRESS");
        assert_eq!(wire["step"], "poll_reindex_task");

        let back: TaskState = serde_json::from_value(wire).expect("deserialize");
        assert_eq!(back, state);
    }
}
