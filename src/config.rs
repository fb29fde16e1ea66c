use anyhow::{Result, Context};
use crate::errors::{CliError, CliErrorKind};
use tracing::debug;
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};

const DEFAULT_API_GATEWAY_URL: &str = "https://aps-api.appshield.aegiscloud.net";
const DEFAULT_ACCESS_TOKEN_URL: &str = "https://api.appshield.aegiscloud.net/token";
const DEFAULT_PLATFORM_ACCESS_TOKEN_URL: &str = "https://ssoapi.platform.aegiscloud.net/v1/token";

/// Settle delay applied before eventually-consistent list queries.
const DEFAULT_SETTLE_DELAY_SECS: u64 = 2;
/// Interval between protection status polls.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub api_gateway_url: Option<String>,
    pub access_token_url: Option<String>,
    pub platform_access_token_url: Option<String>,
    pub settle_delay_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_gateway_url: String,
    pub access_token_url: String,
    pub platform_access_token_url: String,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_gateway_url: DEFAULT_API_GATEWAY_URL.into(),
            access_token_url: DEFAULT_ACCESS_TOKEN_URL.into(),
            platform_access_token_url: DEFAULT_PLATFORM_ACCESS_TOKEN_URL.into(),
            settle_delay: Duration::from_secs(DEFAULT_SETTLE_DELAY_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let cfg_path = config_file_path();
        debug!(path=?cfg_path, exists=?cfg_path.exists(), "config.load.attempt");
        let file_cfg: FileConfig = if cfg_path.exists() {
            let content = fs::read_to_string(&cfg_path).with_context(|| format!("read config {cfg_path:?}"))
                .map_err(|e| CliError::with_source(CliErrorKind::Config("failed to read config".into()), e))?;
            match toml::from_str(&content) {
                Ok(v) => { debug!("config.parse.success"); v }
                Err(e) => { debug!(error=?e, "config.parse.error"); return Err(CliError::with_source(CliErrorKind::Config("failed to parse config".into()), e).into()); }
            }
        } else { FileConfig::default() };

        let mut cfg = Config::default();
        if let Some(v) = file_cfg.api_gateway_url { cfg.api_gateway_url = v; }
        if let Some(v) = file_cfg.access_token_url { cfg.access_token_url = v; }
        if let Some(v) = file_cfg.platform_access_token_url { cfg.platform_access_token_url = v; }
        if let Some(v) = file_cfg.settle_delay_secs { cfg.settle_delay = Duration::from_secs(v); }
        if let Some(v) = file_cfg.poll_interval_secs { cfg.poll_interval = Duration::from_secs(v); }

        // Env overrides
        if let Ok(v) = std::env::var("AEGIS_API_GATEWAY_URL") { if !v.is_empty() { cfg.api_gateway_url = v; } }
        if let Ok(v) = std::env::var("AEGIS_ACCESS_TOKEN_URL") { if !v.is_empty() { cfg.access_token_url = v; } }
        if let Ok(v) = std::env::var("AEGIS_PLATFORM_ACCESS_TOKEN_URL") { if !v.is_empty() { cfg.platform_access_token_url = v; } }
        if let Ok(v) = std::env::var("AEGIS_SETTLE_DELAY_SECS") { if let Ok(n) = v.parse() { cfg.settle_delay = Duration::from_secs(n); } }
        if let Ok(v) = std::env::var("AEGIS_POLL_INTERVAL_SECS") { if let Ok(n) = v.parse() { cfg.poll_interval = Duration::from_secs(n); } }
        debug!(?cfg, "config.effective");
        Ok(cfg)
    }
}

pub fn config_dir() -> PathBuf { dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("aegis") }
pub fn config_file_path() -> PathBuf { config_dir().join("config.toml") }
