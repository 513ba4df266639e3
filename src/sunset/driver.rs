use crate::error::ArchivalError;
use crate::sunset::alert::{self, with_alert};
use crate::sunset::archival::{
    ArchivalStatus, CleanupOutcome, cleanup_archival, kickoff_archival, poll_reindex_task,
};
use crate::sunset::cluster::SearchCluster;
use crate::sunset::config::DriverConfig;
use crate::sunset::notify::NotificationSink;
use crate::sunset::scan::{scan_large_indexes, threshold_bytes};
use anyhow::Result;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct DriveOptions {
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl DriveOptions {
    pub fn from_config(cfg: &DriverConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            deadline: Duration::from_secs(cfg.deadline_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FailedArchival {
    pub index: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct CycleOutcome {
    pub candidates: Vec<String>,
    pub archived: Vec<CleanupOutcome>,
    pub failed: Vec<FailedArchival>,
}

/// Drive one index to a terminal state: kickoff, then sleep/poll until the
/// reindex task finishes or the deadline lapses, then cleanup. The engine
/// never waits on the cluster itself; this loop is the in-process stand-in
/// for an external scheduler.
pub fn drive_index(
    cluster: &dyn SearchCluster,
    sink: &dyn NotificationSink,
    index: &str,
    opts: DriveOptions,
) -> Result<CleanupOutcome> {
    let mut state = kickoff_archival(cluster, index)?;
    let started = Instant::now();

    while state.status != ArchivalStatus::Completed {
        if started.elapsed() >= opts.deadline {
            return Err(ArchivalError::new(format!(
                "reindex of {index} did not finish within {}s",
                opts.deadline.as_secs()
            ))
            .with_index(&state.index)
            .with_new_index(&state.new_index)
            .into());
        }
        thread::sleep(opts.poll_interval);
        state = poll_reindex_task(cluster, &state)?;
    }

    cleanup_archival(cluster, sink, &state)
}

/// One full archival cycle: scan once, then drive every candidate
/// independently. A candidate's failure is recorded and alerted but never
/// aborts the rest of the fan-out.
pub fn run_cycle(
    cluster: &dyn SearchCluster,
    sink: &dyn NotificationSink,
    threshold_gb: f64,
    opts: DriveOptions,
) -> Result<CycleOutcome> {
    let threshold = threshold_bytes(threshold_gb);
    let candidates = scan_large_indexes(cluster, threshold)?;

    let mut outcome = CycleOutcome::default();
    for candidate in &candidates {
        alert::notify_large_index(sink, &candidate.name, candidate.size_bytes, threshold);
        outcome.candidates.push(candidate.name.clone());
    }

    for index in &outcome.candidates {
        match with_alert(sink, "archive", || drive_index(cluster, sink, index, opts)) {
            Ok(archived) => outcome.archived.push(archived),
            Err(err) => outcome.failed.push(FailedArchival {
                index: index.clone(),
                error: format!("{err:#}"),
            }),
        }
    }

    Ok(outcome)
}
