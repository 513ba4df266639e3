use anyhow::Result;

use crate::commands::{CommandReport, cluster_from_config, sink_from_config};
use crate::sunset::audit;
use crate::sunset::config::load_config;
use crate::sunset::driver::{DriveOptions, run_cycle};
use crate::sunset::paths::resolve_paths;

#[derive(Debug, Clone)]
pub struct CycleOptions {
    pub threshold_gb: Option<f64>,
}

pub fn run(opts: &CycleOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("cycle");

    let gb = opts.threshold_gb.unwrap_or(cfg.scan.threshold_gb);
    if !(gb > 0.0) {
        report.issue(format!("invalid threshold: {gb} GB"));
        return Ok(report);
    }
    report.detail(format!("endpoint={}", cfg.cluster.endpoint));
    report.detail(format!("threshold_gb={gb}"));

    let cluster = cluster_from_config(&cfg)?;
    let sink = sink_from_config(&cfg)?;
    let drive = DriveOptions::from_config(&cfg.driver);

    match run_cycle(cluster.as_ref(), sink.as_ref(), gb, drive) {
        Ok(outcome) => {
            report.detail(format!("candidates={}", outcome.candidates.len()));
            for archived in &outcome.archived {
                report.detail(format!(
                    "archived {} into {}",
                    archived.index, archived.new_index
                ));
            }
            for failed in &outcome.failed {
                report.issue(format!("archival of {} failed: {}", failed.index, failed.error));
            }
            audit::append_event(
                &paths,
                "cycle",
                if outcome.failed.is_empty() { "ok" } else { "failed" },
                &format!(
                    "{} candidate(s), {} archived, {} failed",
                    outcome.candidates.len(),
                    outcome.archived.len(),
                    outcome.failed.len()
                ),
            )?;
        }
        Err(err) => {
            audit::append_event(&paths, "cycle", "failed", &format!("{err:#}"))?;
            report.issue(format!("cycle failed: {err:#}"));
        }
    }

    Ok(report)
}
