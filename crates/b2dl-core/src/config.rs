use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::b2::{B2Credentials, DEFAULT_API_URL};
use crate::scheduler::DEFAULT_THREADS;

pub const ENV_KEY_ID: &str = "B2_APPLICATION_KEY_ID";
pub const ENV_KEY: &str = "B2_APPLICATION_KEY";
pub const ENV_BUCKET: &str = "B2_BUCKET";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Global configuration loaded from `~/.config/b2dl/config.toml`.
/// Missing keys take their [`Default`] values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct B2dlConfig {
    /// Maximum number of objects downloading at once.
    pub threads: usize,
    /// Base URL used for `b2_authorize_account`.
    pub api_url: String,
    pub application_key_id: Option<String>,
    pub application_key: Option<String>,
    /// Bucket used when `--bucket` is not given.
    pub bucket: Option<String>,
    /// TCP connect timeout for every API call and download (None = 30s).
    pub connect_timeout_secs: Option<u64>,
}

impl Default for B2dlConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            api_url: DEFAULT_API_URL.to_string(),
            application_key_id: None,
            application_key: None,
            bucket: None,
            connect_timeout_secs: None,
        }
    }
}

impl B2dlConfig {
    /// Overlay credentials and bucket from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay credentials and bucket using `lookup` for variable values.
    /// Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_KEY_ID) {
            self.application_key_id = Some(v);
        }
        if let Some(v) = get(ENV_KEY) {
            self.application_key = Some(v);
        }
        if let Some(v) = get(ENV_BUCKET) {
            self.bucket = Some(v);
        }
    }

    /// Concurrency for a run: `cli_threads` if given, else the config value,
    /// never below 1.
    pub fn effective_threads(&self, cli_threads: Option<usize>) -> usize {
        cli_threads.unwrap_or(self.threads).max(1)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    pub fn credentials(&self) -> Result<B2Credentials> {
        match (&self.application_key_id, &self.application_key) {
            (Some(id), Some(key)) => Ok(B2Credentials {
                application_key_id: id.clone(),
                application_key: key.clone(),
            }),
            _ => bail!(
                "missing B2 credentials: set {} and {} or add application_key_id/application_key to {}",
                ENV_KEY_ID,
                ENV_KEY,
                config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "config.toml".to_string())
            ),
        }
    }

    /// `cli_bucket` wins over the environment and the config file.
    pub fn bucket<'a>(&'a self, cli_bucket: Option<&'a str>) -> Result<&'a str> {
        cli_bucket
            .or(self.bucket.as_deref())
            .context("no bucket given: pass --bucket or set B2_BUCKET")
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("b2dl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<B2dlConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

pub fn load_or_init_at(path: &Path) -> Result<B2dlConfig> {
    if !path.exists() {
        let default_cfg = B2dlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: B2dlConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
