pub mod fetch;
pub mod merge;
pub mod policy;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch::fetch_completed_since;
pub use merge::{MergeOutcome, MergeStats, merge_by_identifier};
pub use policy::FetchMode;
pub use session::{
    BackgroundOutcome, Bootstrap, DEMO_CREDENTIAL, SessionStatus, SkipReason, SyncOutcome,
    SyncSession,
};

use crate::config::Config;

/// Timing and paging knobs for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub stale_after: time::Duration,
    pub default_lookback: time::Duration,
    pub full_history_lookback: time::Duration,
    pub page_size: u32,
    pub demo_delay: std::time::Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stale_after: time::Duration::seconds(config.stale_after_secs as i64),
            default_lookback: time::Duration::days(i64::from(config.default_lookback_days)),
            full_history_lookback: time::Duration::days(i64::from(config.full_history_days)),
            page_size: config.page_size,
            demo_delay: std::time::Duration::from_millis(config.demo_delay_ms),
        }
    }
}
