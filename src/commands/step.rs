use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use crate::commands::{cluster_from_config, sink_from_config};
use crate::error::SunsetError;
use crate::sunset::audit;
use crate::sunset::config::load_config;
use crate::sunset::paths::resolve_paths;
use crate::sunset::step::dispatch;

#[derive(Debug, Clone)]
pub struct StepOptions {
    pub payload: Option<String>,
    pub payload_file: Option<PathBuf>,
}

fn read_payload(opts: &StepOptions) -> Result<String> {
    if let Some(payload) = &opts.payload {
        return Ok(payload.clone());
    }
    if let Some(path) = &opts.payload_file {
        return fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read step payload from stdin")?;
    Ok(raw)
}

/// Execute one step of the archival contract. The response JSON goes to
/// stdout, ready to be fed back in as the next request; reports and errors
/// stay on stderr.
pub fn run(opts: &StepOptions) -> Result<()> {
    let raw = read_payload(opts)?;
    let request: Value = serde_json::from_str(raw.trim()).map_err(|err| {
        anyhow::Error::from(SunsetError::Validation(format!(
            "step payload is not valid JSON: {err}"
        )))
    })?;

    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let cluster = cluster_from_config(&cfg)?;
    let sink = sink_from_config(&cfg)?;

    let step_name = request
        .get("step")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    match dispatch(cluster.as_ref(), sink.as_ref(), &cfg, &request) {
        Ok(response) => {
            audit::append_event(&paths, "step", "ok", &step_name)?;
            println!("{response}");
            Ok(())
        }
        Err(err) => {
            audit::append_event(&paths, "step", "failed", &format!("{step_name}: {err:#}"))?;
            Err(err)
        }
    }
}
