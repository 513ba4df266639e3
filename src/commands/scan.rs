use anyhow::Result;

use crate::commands::{CommandReport, cluster_from_config, sink_from_config};
use crate::sunset::alert::{self, with_alert};
use crate::sunset::audit;
use crate::sunset::config::load_config;
use crate::sunset::paths::resolve_paths;
use crate::sunset::scan::{scan_large_indexes, threshold_bytes};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub threshold_gb: Option<f64>,
}

pub fn run(opts: &ScanOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("scan");

    let gb = opts.threshold_gb.unwrap_or(cfg.scan.threshold_gb);
    if !(gb > 0.0) {
        report.issue(format!("invalid threshold: {gb} GB"));
        return Ok(report);
    }
    let threshold = threshold_bytes(gb);
    report.detail(format!("endpoint={}", cfg.cluster.endpoint));
    report.detail(format!("threshold_gb={gb}"));

    let cluster = cluster_from_config(&cfg)?;
    let sink = sink_from_config(&cfg)?;

    match with_alert(sink.as_ref(), "find_large_indexes", || {
        scan_large_indexes(cluster.as_ref(), threshold)
    }) {
        Ok(candidates) => {
            if candidates.is_empty() {
                report.detail("no indices at or above threshold");
            }
            for candidate in &candidates {
                alert::notify_large_index(
                    sink.as_ref(),
                    &candidate.name,
                    candidate.size_bytes,
                    threshold,
                );
                report.detail(format!(
                    "candidate {} size_bytes={}",
                    candidate.name, candidate.size_bytes
                ));
            }
            audit::append_event(
                &paths,
                "scan",
                "ok",
                &format!("{} candidate(s)", candidates.len()),
            )?;
        }
        Err(err) => {
            audit::append_event(&paths, "scan", "failed", &format!("{err:#}"))?;
            report.issue(format!("scan failed: {err:#}"));
        }
    }

    Ok(report)
}
