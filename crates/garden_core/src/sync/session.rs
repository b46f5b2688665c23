use crate::clock::{Clock, SystemClock, format_rfc3339, from_unix_millis};
use crate::config::Config;
use crate::error::{AppError, FetchError, FetchErrorKind};
use crate::model::{TaskOrigin, TaskRecord};
use crate::remote::{HttpTaskSource, TaskSource};
use crate::storage::{CredentialStore, FileKvStore, KvStore, TaskCacheStore};
use crate::sync::SyncSettings;
use crate::sync::fetch::fetch_completed_since;
use crate::sync::merge::{MergeStats, merge_by_identifier};
use crate::sync::policy::{self, FetchMode};
use crate::synthetic;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Credential that runs the session on synthetic data only.
pub const DEMO_CREDENTIAL: &str = "demo";

enum Credential {
    Demo,
    Bearer(String),
}

/// Task list handed to the visual layer.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub tasks: Vec<TaskRecord>,
    pub origin: TaskOrigin,
    pub stats: MergeStats,
    /// Set when a foreground fetch failed and `tasks` are placeholders.
    pub error: Option<FetchError>,
}

impl SyncOutcome {
    fn with_origin(tasks: Vec<TaskRecord>, origin: TaskOrigin) -> Self {
        Self {
            tasks,
            origin,
            stats: MergeStats::default(),
            error: None,
        }
    }
}

pub struct Bootstrap {
    pub outcome: SyncOutcome,
    /// Present when cached tasks were stale and a background refresh was spawned.
    pub background: Option<JoinHandle<BackgroundOutcome>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoCredential,
    Demo,
    NoCursor,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundOutcome {
    Skipped(SkipReason),
    Unchanged,
    Merged(MergeStats),
    Failed(FetchErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub connected: bool,
    pub demo: bool,
    pub cached_tasks: usize,
    pub captured_at: Option<String>,
    pub cursor: Option<String>,
    pub stale: bool,
}

struct SessionInner {
    credentials: CredentialStore,
    cache: TaskCacheStore,
    source: Arc<dyn TaskSource>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    demo: AtomicBool,
    // Held for the whole read-fetch-merge-write cycle.
    sync_gate: Mutex<()>,
}

/// Owns the credential, the task cache and the sync cursor.
///
/// All reads and writes of those three values go through this type. Clones
/// share the same state, which is how a background refresh outlives the call
/// that spawned it.
#[derive(Clone)]
pub struct SyncSession {
    inner: Arc<SessionInner>,
}

impl SyncSession {
    pub fn new(
        kv: Arc<dyn KvStore>,
        source: Arc<dyn TaskSource>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                credentials: CredentialStore::new(kv.clone()),
                cache: TaskCacheStore::new(kv, clock.clone()),
                source,
                clock,
                settings,
                demo: AtomicBool::new(false),
                sync_gate: Mutex::new(()),
            }),
        }
    }

    /// Session over the on-disk store and the HTTP task source.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let kv = Arc::new(FileKvStore::from_env()?);
        let source = Arc::new(HttpTaskSource::new(
            config.api_base_url.clone(),
            std::time::Duration::from_secs(config.request_timeout_secs),
        ));
        Ok(Self::new(
            kv,
            source,
            Arc::new(SystemClock),
            SyncSettings::from_config(config),
        ))
    }

    fn credential(&self) -> Option<Credential> {
        if self.inner.demo.load(Ordering::SeqCst) {
            return Some(Credential::Demo);
        }
        match self.inner.credentials.get() {
            Some(value) if value == DEMO_CREDENTIAL => Some(Credential::Demo),
            Some(value) => Some(Credential::Bearer(value)),
            None => None,
        }
    }

    /// Stores the credential and loads tasks for it.
    ///
    /// Switching to a different credential discards the previous user's
    /// cache. The demo credential is kept in memory only.
    pub async fn connect(&self, credential: &str) -> Result<Bootstrap, AppError> {
        let trimmed = credential.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("credential is required"));
        }

        if trimmed == DEMO_CREDENTIAL {
            self.inner.demo.store(true, Ordering::SeqCst);
            info!("connected in demo mode");
            return Ok(Bootstrap {
                outcome: self.demo_outcome().await,
                background: None,
            });
        }

        self.inner.demo.store(false, Ordering::SeqCst);
        {
            let _gate = self.inner.sync_gate.lock().await;
            let previous = self.inner.credentials.get();
            if previous.as_deref() != Some(trimmed) {
                if previous.is_some() {
                    info!("credential changed, discarding cached tasks");
                }
                self.inner.cache.clear();
            }
            self.inner.credentials.save(trimmed)?;
        }

        Ok(self.bootstrap().await)
    }

    pub async fn disconnect(&self) {
        let _gate = self.inner.sync_gate.lock().await;
        self.inner.demo.store(false, Ordering::SeqCst);
        self.inner.credentials.clear();
        self.inner.cache.clear();
        info!("disconnected");
    }

    /// Session start: serve the cache when there is one, otherwise fetch.
    pub async fn bootstrap(&self) -> Bootstrap {
        let credential = match self.credential() {
            None => {
                return Bootstrap {
                    outcome: SyncOutcome::with_origin(Vec::new(), TaskOrigin::None),
                    background: None,
                };
            }
            Some(Credential::Demo) => {
                return Bootstrap {
                    outcome: self.demo_outcome().await,
                    background: None,
                };
            }
            Some(Credential::Bearer(value)) => value,
        };

        let cached = self.inner.cache.load_tasks();
        if cached.is_empty() {
            debug!("no cached tasks, running initial fetch");
            return Bootstrap {
                outcome: self.foreground(&credential, FetchMode::Refresh).await,
                background: None,
            };
        }

        let stale = policy::is_stale(
            self.inner.cache.last_capture_time(),
            self.inner.clock.now(),
            self.inner.settings.stale_after,
        );
        let background = if stale {
            debug!(cached = cached.len(), "cached tasks are stale, refreshing in background");
            Some(self.spawn_background_refresh())
        } else {
            None
        };

        Bootstrap {
            outcome: SyncOutcome::with_origin(cached, TaskOrigin::Cache),
            background,
        }
    }

    pub fn spawn_background_refresh(&self) -> JoinHandle<BackgroundOutcome> {
        let session = self.clone();
        tokio::spawn(async move { session.refresh_in_background().await })
    }

    /// Incremental merge from the stored cursor.
    ///
    /// Never returns an error: failures leave the cache and cursor exactly as
    /// they were and are only logged.
    pub async fn refresh_in_background(&self) -> BackgroundOutcome {
        let credential = match self.credential() {
            None => return BackgroundOutcome::Skipped(SkipReason::NoCredential),
            Some(Credential::Demo) => return BackgroundOutcome::Skipped(SkipReason::Demo),
            Some(Credential::Bearer(value)) => value,
        };

        let Ok(_gate) = self.inner.sync_gate.try_lock() else {
            debug!("sync already in flight, skipping background refresh");
            return BackgroundOutcome::Skipped(SkipReason::Busy);
        };

        let Some(cursor) = self.inner.cache.load_cursor() else {
            debug!("no sync cursor, skipping background refresh");
            return BackgroundOutcome::Skipped(SkipReason::NoCursor);
        };

        let started = self.inner.clock.now();
        let fetched = fetch_completed_since(
            self.inner.source.as_ref(),
            &credential,
            cursor,
            self.inner.settings.page_size,
        )
        .await;

        match fetched {
            Err(err) => {
                warn!(error = %err, "background refresh failed, keeping cached tasks");
                BackgroundOutcome::Failed(err.kind)
            }
            Ok(records) if records.is_empty() => {
                debug!("background refresh found nothing new");
                BackgroundOutcome::Unchanged
            }
            Ok(records) => {
                let merged = merge_by_identifier(self.inner.cache.load_tasks(), records);
                self.inner.cache.save_snapshot(&merged.tasks);
                self.inner.cache.save_cursor(policy::next_cursor(started, cursor));
                info!(
                    new = merged.stats.new,
                    updated = merged.stats.updated,
                    total = merged.tasks.len(),
                    "background refresh merged tasks"
                );
                BackgroundOutcome::Merged(merged.stats)
            }
        }
    }

    /// Manual refresh from the stored cursor, or the default lookback.
    pub async fn refresh(&self) -> Result<SyncOutcome, AppError> {
        self.run_foreground(FetchMode::Refresh).await
    }

    /// Replaces the cache with everything completed in the history window.
    pub async fn fetch_full_history(&self) -> Result<SyncOutcome, AppError> {
        self.run_foreground(FetchMode::FullHistory).await
    }

    async fn run_foreground(&self, mode: FetchMode) -> Result<SyncOutcome, AppError> {
        match self.credential() {
            None => Err(AppError::invalid_input("not connected, run connect first")),
            Some(Credential::Demo) => Ok(self.demo_outcome().await),
            Some(Credential::Bearer(value)) => Ok(self.foreground(&value, mode).await),
        }
    }

    async fn foreground(&self, credential: &str, mode: FetchMode) -> SyncOutcome {
        let _gate = self.inner.sync_gate.lock().await;
        let settings = &self.inner.settings;
        let started = self.inner.clock.now();
        let cursor = match mode {
            FetchMode::Refresh => self.inner.cache.load_cursor(),
            FetchMode::FullHistory => None,
        };
        let lower_bound = policy::foreground_lower_bound(
            mode,
            cursor,
            started,
            settings.default_lookback,
            settings.full_history_lookback,
        );
        info!(?mode, since = %lower_bound, "fetching completed tasks");

        let fetched = fetch_completed_since(
            self.inner.source.as_ref(),
            credential,
            lower_bound,
            settings.page_size,
        )
        .await;

        match fetched {
            Ok(records) => {
                let seed = match mode {
                    FetchMode::Refresh => self.inner.cache.load_tasks(),
                    FetchMode::FullHistory => {
                        self.inner.cache.clear();
                        Vec::new()
                    }
                };
                let merged = merge_by_identifier(seed, records);
                self.inner.cache.save_snapshot(&merged.tasks);
                self.inner
                    .cache
                    .save_cursor(policy::next_cursor(started, lower_bound));
                info!(
                    new = merged.stats.new,
                    updated = merged.stats.updated,
                    total = merged.tasks.len(),
                    "sync finished"
                );

                SyncOutcome {
                    tasks: merged.tasks,
                    origin: TaskOrigin::Remote,
                    stats: merged.stats,
                    error: None,
                }
            }
            Err(err) => {
                warn!(error = %err, "fetch failed, showing placeholder tasks");
                let tasks = synthetic::placeholder_tasks(&mut rand::rng(), started);
                SyncOutcome {
                    tasks,
                    origin: TaskOrigin::Placeholder,
                    stats: MergeStats::default(),
                    error: Some(err),
                }
            }
        }
    }

    async fn demo_outcome(&self) -> SyncOutcome {
        tokio::time::sleep(self.inner.settings.demo_delay).await;
        let tasks = synthetic::demo_tasks(&mut rand::rng(), self.inner.clock.now());
        SyncOutcome::with_origin(tasks, TaskOrigin::Demo)
    }

    pub fn status(&self) -> SessionStatus {
        match self.credential() {
            None => SessionStatus {
                connected: false,
                demo: false,
                cached_tasks: 0,
                captured_at: None,
                cursor: None,
                stale: false,
            },
            Some(Credential::Demo) => SessionStatus {
                connected: true,
                demo: true,
                cached_tasks: 0,
                captured_at: None,
                cursor: None,
                stale: false,
            },
            Some(Credential::Bearer(_)) => {
                let snapshot = self.inner.cache.load_snapshot();
                let cached_tasks = snapshot.as_ref().map_or(0, |snapshot| snapshot.tasks.len());
                let captured_at = snapshot
                    .as_ref()
                    .and_then(|snapshot| from_unix_millis(snapshot.timestamp));
                let stale = cached_tasks > 0
                    && policy::is_stale(
                        captured_at,
                        self.inner.clock.now(),
                        self.inner.settings.stale_after,
                    );

                SessionStatus {
                    connected: true,
                    demo: false,
                    cached_tasks,
                    captured_at: captured_at.and_then(|value| format_rfc3339(value).ok()),
                    cursor: self
                        .inner
                        .cache
                        .load_cursor()
                        .and_then(|value| format_rfc3339(value).ok()),
                    stale,
                }
            }
        }
    }
}
