use crate::sunset::config::SunsetConfig;
use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::time::Duration;

/// Fire-and-forget alert transport. Categories route downstream filtering;
/// the payload is structured data, not prose.
pub trait NotificationSink {
    fn notify(&self, category: &str, subject: &str, payload: &Value) -> Result<()>;
}

/// Posts alerts as JSON to a configured webhook.
pub struct WebhookSink {
    url: String,
    client: Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build notification client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl NotificationSink for WebhookSink {
    fn notify(&self, category: &str, subject: &str, payload: &Value) -> Result<()> {
        let body = json!({
            "version": "1.0",
            "source": "index-sunset",
            "category": category,
            "subject": subject,
            "payload": payload,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .context("notification webhook unreachable")?;
        if !response.status().is_success() {
            bail!("notification webhook returned status {}", response.status());
        }
        Ok(())
    }
}

/// Stderr-only sink used when no webhook is configured. Never fails, so an
/// unconfigured deployment still surfaces every alert in its logs.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, category: &str, subject: &str, payload: &Value) -> Result<()> {
        eprintln!("SUNSET_NOTICE category={category} subject={subject:?} payload={payload}");
        Ok(())
    }
}

pub fn sink_from_config(cfg: &SunsetConfig) -> Result<Box<dyn NotificationSink>> {
    match cfg.notify.webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Ok(Box::new(WebhookSink::new(
            url.trim(),
            cfg.cluster.timeout_secs,
        )?)),
        _ => Ok(Box::new(LogSink)),
    }
}
