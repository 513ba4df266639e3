pub mod archive;
pub mod cycle;
pub mod scan;
pub mod step;

use crate::sunset::cluster::SearchCluster;
use crate::sunset::config::SunsetConfig;
use crate::sunset::http::HttpCluster;
use crate::sunset::notify::{self, NotificationSink};
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

pub fn cluster_from_config(cfg: &SunsetConfig) -> Result<Box<dyn SearchCluster>> {
    Ok(Box::new(HttpCluster::from_config(&cfg.cluster)?))
}

pub fn sink_from_config(cfg: &SunsetConfig) -> Result<Box<dyn NotificationSink>> {
    notify::sink_from_config(cfg)
}
