use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SunsetPaths {
    pub sunset_home: PathBuf,
    pub logs_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<SunsetPaths> {
    let home = required_home_dir()?;
    let sunset_home = env_or_default_path("SUNSET_HOME", home.join(".sunset"));
    let logs_dir = env_or_default_path("SUNSET_LOGS_DIR", sunset_home.join("logs"));

    Ok(SunsetPaths {
        sunset_home,
        logs_dir,
    })
}
