use anyhow::Result;

use crate::commands::{CommandReport, cluster_from_config, sink_from_config};
use crate::sunset::alert::with_alert;
use crate::sunset::archival::combined_alias_name;
use crate::sunset::audit;
use crate::sunset::config::load_config;
use crate::sunset::driver::{DriveOptions, drive_index};
use crate::sunset::paths::resolve_paths;

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub index: String,
    pub poll_interval_secs: Option<u64>,
    pub deadline_secs: Option<u64>,
}

pub fn run(opts: &ArchiveOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("archive");

    let mut driver_cfg = cfg.driver.clone();
    if let Some(poll) = opts.poll_interval_secs {
        driver_cfg.poll_interval_secs = poll;
    }
    if let Some(deadline) = opts.deadline_secs {
        driver_cfg.deadline_secs = deadline;
    }
    let drive = DriveOptions::from_config(&driver_cfg);

    report.detail(format!("endpoint={}", cfg.cluster.endpoint));
    report.detail(format!("index={}", opts.index));
    report.detail(format!(
        "poll_interval_secs={} deadline_secs={}",
        driver_cfg.poll_interval_secs, driver_cfg.deadline_secs
    ));

    let cluster = cluster_from_config(&cfg)?;
    let sink = sink_from_config(&cfg)?;

    match with_alert(sink.as_ref(), "archive", || {
        drive_index(cluster.as_ref(), sink.as_ref(), &opts.index, drive)
    }) {
        Ok(outcome) => {
            report.detail(format!(
                "archived {} into {}",
                outcome.index, outcome.new_index
            ));
            let alias = combined_alias_name(&outcome.index);
            match cluster.alias_indices(&alias) {
                Ok(generations) => report.detail(format!(
                    "alias {alias} spans {} generation(s)",
                    generations.len()
                )),
                Err(err) => report.detail(format!("alias {alias} not resolvable yet: {err:#}")),
            }
            audit::append_event(
                &paths,
                "archive",
                "ok",
                &format!("{} -> {}", outcome.index, outcome.new_index),
            )?;
        }
        Err(err) => {
            audit::append_event(&paths, "archive", "failed", &format!("{err:#}"))?;
            report.issue(format!("archival of {} failed: {err:#}", opts.index));
        }
    }

    Ok(report)
}
