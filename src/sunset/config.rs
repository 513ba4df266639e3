use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            timeout_secs: 45,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub threshold_gb: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { threshold_gb: 30.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    pub poll_interval_secs: u64,
    pub deadline_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 150,
            deadline_secs: 12 * 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SunsetConfig {
    pub cluster: ClusterConfig,
    pub scan: ScanConfig,
    pub driver: DriverConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialSunsetConfig {
    cluster: Option<ClusterConfig>,
    scan: Option<ScanConfig>,
    driver: Option<DriverConfig>,
    notify: Option<NotifyConfig>,
}

fn env_or_f64(var: &str, fallback: f64) -> f64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<f64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_opt_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn validate(cfg: &SunsetConfig) -> Result<()> {
    if cfg.cluster.endpoint.trim().is_empty() {
        return Err(anyhow!("invalid cluster endpoint: cannot be empty"));
    }
    if cfg.cluster.timeout_secs == 0 {
        return Err(anyhow!("invalid cluster timeout: must be >= 1 second"));
    }
    if !(cfg.scan.threshold_gb > 0.0) {
        return Err(anyhow!("invalid size threshold: must be > 0 GB"));
    }
    if cfg.driver.poll_interval_secs == 0 {
        return Err(anyhow!("invalid poll interval: must be >= 1 second"));
    }
    if cfg.driver.deadline_secs <= cfg.driver.poll_interval_secs {
        return Err(anyhow!(
            "invalid driver deadline: must exceed the poll interval"
        ));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("SUNSET_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".sunset").join("sunset.toml"))
}

fn merge_file_config(base: &mut SunsetConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialSunsetConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse sunset config {}: {err}", path.display()))?;
    if let Some(cluster) = parsed.cluster {
        base.cluster = cluster;
    }
    if let Some(scan) = parsed.scan {
        base.scan = scan;
    }
    if let Some(driver) = parsed.driver {
        base.driver = driver;
    }
    if let Some(notify) = parsed.notify {
        base.notify = notify;
    }
    Ok(())
}

pub fn load_config() -> Result<SunsetConfig> {
    let mut cfg = SunsetConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.cluster.endpoint = env_or_string("SUNSET_ENDPOINT", &cfg.cluster.endpoint);
    cfg.cluster.username = env_opt_string("SUNSET_USERNAME", cfg.cluster.username.take());
    cfg.cluster.password = env_opt_string("SUNSET_PASSWORD", cfg.cluster.password.take());
    cfg.cluster.timeout_secs = env_or_u64("SUNSET_TIMEOUT_SECS", cfg.cluster.timeout_secs);
    cfg.scan.threshold_gb = env_or_f64("SUNSET_THRESHOLD_GB", cfg.scan.threshold_gb);
    cfg.driver.poll_interval_secs =
        env_or_u64("SUNSET_POLL_INTERVAL_SECS", cfg.driver.poll_interval_secs);
    cfg.driver.deadline_secs = env_or_u64("SUNSET_DEADLINE_SECS", cfg.driver.deadline_secs);
    cfg.notify.webhook_url = env_opt_string("SUNSET_WEBHOOK_URL", cfg.notify.webhook_url.take());

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let cfg = SunsetConfig::default();
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.scan.threshold_gb, 30.0);
        assert_eq!(cfg.driver.poll_interval_secs, 150);
        assert_eq!(cfg.driver.deadline_secs, 43_200);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut cfg = SunsetConfig::default();
        cfg.scan.threshold_gb = 0.0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn deadline_must_exceed_poll_interval() {
        let mut cfg = SunsetConfig::default();
        cfg.driver.deadline_secs = cfg.driver.poll_interval_secs;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn partial_toml_overrides_only_named_sections() {
        let mut cfg = SunsetConfig::default();
        let parsed: PartialSunsetConfig =
            toml::from_str("[scan]\nthreshold_gb = 10.0\n").expect("parse");
        if let Some(scan) = parsed.scan {
            cfg.scan = scan;
        }
        assert_eq!(cfg.scan.threshold_gb, 10.0);
        assert_eq!(cfg.cluster.endpoint, "http://localhost:9200");
    }
}
