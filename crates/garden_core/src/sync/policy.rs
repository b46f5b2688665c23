use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Resume from the stored cursor, or the default lookback without one.
    Refresh,
    /// Discard the cache and fetch the full history window.
    FullHistory,
}

/// A snapshot with no capture time is always stale.
pub fn is_stale(captured_at: Option<OffsetDateTime>, now: OffsetDateTime, threshold: Duration) -> bool {
    match captured_at {
        Some(captured_at) => now - captured_at > threshold,
        None => true,
    }
}

pub fn foreground_lower_bound(
    mode: FetchMode,
    cursor: Option<OffsetDateTime>,
    now: OffsetDateTime,
    default_lookback: Duration,
    full_history: Duration,
) -> OffsetDateTime {
    match mode {
        FetchMode::Refresh => cursor.unwrap_or(now - default_lookback),
        FetchMode::FullHistory => now - full_history,
    }
}

/// Cursor to store after a fetch that started at `started` from `lower_bound`.
pub fn next_cursor(started: OffsetDateTime, lower_bound: OffsetDateTime) -> OffsetDateTime {
    started.max(lower_bound)
}
