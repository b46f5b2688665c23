use clap::{Parser, Subcommand};
use garden_core::config::ConfigOverrides;
use garden_core::error::AppError;

#[derive(Parser, Debug)]
#[command(author, version, about = "Grow a garden from your completed tasks", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store an access token and load its completed tasks
    ///
    /// Example: garden connect 1/1234567890:abcdef
    /// Example: garden connect demo
    Connect { token: String },
    /// Forget the access token and every cached task
    ///
    /// Example: garden disconnect
    Disconnect,
    /// Show the garden, refreshing stale data in the background
    ///
    /// Example: garden show
    Show,
    /// Fetch tasks completed since the last sync
    ///
    /// Example: garden refresh
    Refresh,
    /// Rebuild the garden from the last year of completed tasks
    ///
    /// Example: garden history
    History,
    /// Show connection and cache state
    ///
    /// Example: garden status --json
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    ApiBaseUrl,
    PageSize,
    StaleAfterSecs,
    DefaultLookbackDays,
    FullHistoryDays,
    DemoDelayMs,
    RequestTimeoutSecs,
    LogFilter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let canonical_field = canonicalize_flag_name(key_raw)
        .ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match canonical_field.as_str() {
        "api_base_url" | "base_url" => ConfigOverrideTarget::ApiBaseUrl,
        "page_size" => ConfigOverrideTarget::PageSize,
        "stale_after_secs" => ConfigOverrideTarget::StaleAfterSecs,
        "default_lookback_days" => ConfigOverrideTarget::DefaultLookbackDays,
        "full_history_days" => ConfigOverrideTarget::FullHistoryDays,
        "demo_delay_ms" => ConfigOverrideTarget::DemoDelayMs,
        "request_timeout_secs" => ConfigOverrideTarget::RequestTimeoutSecs,
        "log_filter" => ConfigOverrideTarget::LogFilter,
        other => return Err(format!("unknown config field '{other}'")),
    };

    if value.is_empty() {
        return Err(format!("override for '{canonical_field}' needs a value"));
    }

    Ok(ParsedConfigOverride { target, value })
}

/// Collect every `--config-override` argument into one set of overrides.
pub fn collect_config_overrides(raw: &[String]) -> Result<ConfigOverrides, AppError> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry).map_err(AppError::invalid_input)?;
        let value = parsed.value;
        match parsed.target {
            ConfigOverrideTarget::ApiBaseUrl => overrides.api_base_url = Some(value),
            ConfigOverrideTarget::PageSize => overrides.page_size = Some(parse_number(&value)?),
            ConfigOverrideTarget::StaleAfterSecs => {
                overrides.stale_after_secs = Some(parse_number(&value)?)
            }
            ConfigOverrideTarget::DefaultLookbackDays => {
                overrides.default_lookback_days = Some(parse_number(&value)?)
            }
            ConfigOverrideTarget::FullHistoryDays => {
                overrides.full_history_days = Some(parse_number(&value)?)
            }
            ConfigOverrideTarget::DemoDelayMs => {
                overrides.demo_delay_ms = Some(parse_number(&value)?)
            }
            ConfigOverrideTarget::RequestTimeoutSecs => {
                overrides.request_timeout_secs = Some(parse_number(&value)?)
            }
            ConfigOverrideTarget::LogFilter => overrides.log_filter = Some(value),
        }
    }
    Ok(overrides)
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T, AppError> {
    value
        .parse()
        .map_err(|_| AppError::invalid_input(format!("'{value}' is not a valid number")))
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
