use crate::error::AppError;
use crate::remote::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TASK_GARDEN_CONFIG_PATH";
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub page_size: u32,
    pub stale_after_secs: u64,
    pub default_lookback_days: u32,
    pub full_history_days: u32,
    pub demo_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            page_size: MAX_PAGE_SIZE,
            stale_after_secs: 5 * 60,
            default_lookback_days: 30,
            full_history_days: 365,
            demo_delay_ms: 800,
            request_timeout_secs: 30,
            log_filter: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub api_base_url: Option<String>,
    pub page_size: Option<u32>,
    pub stale_after_secs: Option<u64>,
    pub default_lookback_days: Option<u32>,
    pub full_history_days: Option<u32>,
    pub demo_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub log_filter: Option<String>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("task-garden")
            .join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("task-garden")
            .join(CONFIG_FILE_NAME))
    }
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    Ok(normalize_config(config))
}

fn normalize_config(mut config: Config) -> Config {
    config.api_base_url = config.api_base_url.trim().trim_end_matches('/').to_string();
    if config.api_base_url.is_empty() {
        config.api_base_url = DEFAULT_BASE_URL.to_string();
    }
    config.page_size = config.page_size.clamp(1, MAX_PAGE_SIZE);
    if config.log_filter.trim().is_empty() {
        config.log_filter = Config::default().log_filter;
    }
    config
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(url) = overrides.api_base_url.as_ref() {
        merged.api_base_url = url.clone();
    }
    if let Some(page_size) = overrides.page_size {
        merged.page_size = page_size;
    }
    if let Some(secs) = overrides.stale_after_secs {
        merged.stale_after_secs = secs;
    }
    if let Some(days) = overrides.default_lookback_days {
        merged.default_lookback_days = days;
    }
    if let Some(days) = overrides.full_history_days {
        merged.full_history_days = days;
    }
    if let Some(ms) = overrides.demo_delay_ms {
        merged.demo_delay_ms = ms;
    }
    if let Some(secs) = overrides.request_timeout_secs {
        merged.request_timeout_secs = secs;
    }
    if let Some(filter) = overrides.log_filter.as_ref() {
        merged.log_filter = filter.clone();
    }

    normalize_config(merged)
}
