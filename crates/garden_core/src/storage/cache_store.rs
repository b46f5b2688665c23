use crate::clock::{Clock, format_rfc3339, from_unix_millis, parse_rfc3339, unix_millis};
use crate::model::{CacheSnapshot, TaskRecord};
use crate::storage::{CURSOR_KEY, KvStore, TASKS_KEY};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};

/// Persisted task snapshot and incremental sync cursor.
///
/// Every failure is logged and treated as "absent"; callers never see a
/// storage error from this type.
#[derive(Clone)]
pub struct TaskCacheStore {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl TaskCacheStore {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { kv, clock }
    }

    pub fn save_snapshot(&self, tasks: &[TaskRecord]) {
        let now = unix_millis(self.clock.now());
        // capture time never moves backwards
        let timestamp = match self.load_snapshot() {
            Some(previous) if previous.timestamp > now => previous.timestamp,
            _ => now,
        };
        let snapshot = CacheSnapshot {
            tasks: tasks.to_vec(),
            timestamp,
        };

        let content = match serde_json::to_string(&snapshot) {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "failed to serialize task snapshot");
                return;
            }
        };
        match self.kv.set(TASKS_KEY, &content) {
            Ok(()) => debug!(tasks = tasks.len(), "saved task snapshot"),
            Err(err) => warn!(error = %err, "failed to save task snapshot"),
        }
    }

    pub fn load_snapshot(&self) -> Option<CacheSnapshot> {
        let content = match self.kv.get(TASKS_KEY) {
            Ok(Some(content)) => content,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "failed to read task snapshot");
                return None;
            }
        };

        match serde_json::from_str::<CacheSnapshot>(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(error = %err, "ignoring unreadable task snapshot");
                None
            }
        }
    }

    pub fn load_tasks(&self) -> Vec<TaskRecord> {
        self.load_snapshot()
            .map(|snapshot| snapshot.tasks)
            .unwrap_or_default()
    }

    pub fn last_capture_time(&self) -> Option<OffsetDateTime> {
        self.load_snapshot()
            .and_then(|snapshot| from_unix_millis(snapshot.timestamp))
    }

    pub fn save_cursor(&self, cursor: OffsetDateTime) {
        let formatted = match format_rfc3339(cursor) {
            Ok(formatted) => formatted,
            Err(err) => {
                warn!(error = %err, "failed to format sync cursor");
                return;
            }
        };
        if let Err(err) = self.kv.set(CURSOR_KEY, &formatted) {
            warn!(error = %err, "failed to save sync cursor");
        }
    }

    pub fn load_cursor(&self) -> Option<OffsetDateTime> {
        let raw = match self.kv.get(CURSOR_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "failed to read sync cursor");
                return None;
            }
        };

        match parse_rfc3339(&raw) {
            Ok(cursor) => Some(cursor),
            Err(err) => {
                warn!(error = %err, cursor = %raw, "ignoring unreadable sync cursor");
                None
            }
        }
    }

    pub fn clear(&self) {
        for key in [TASKS_KEY, CURSOR_KEY] {
            if let Err(err) = self.kv.remove(key) {
                warn!(error = %err, key, "failed to clear cache entry");
            }
        }
    }
}
