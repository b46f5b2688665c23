use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A completed task as known to the garden.
///
/// The fields the reconciler inspects are typed; everything else the remote
/// source sends is kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub gid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Remote payloads send explicit nulls; treat them like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl TaskRecord {
    pub fn new<I: Into<String>, N: Into<String>>(
        gid: I,
        name: N,
        completed_at: Option<String>,
    ) -> Self {
        Self {
            gid: gid.into(),
            name: name.into(),
            completed: true,
            completed_at,
            extra: Map::new(),
        }
    }

    /// Records without an identifier cannot be merged by identity.
    pub fn identifier(&self) -> Option<&str> {
        let trimmed = self.gid.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// Persisted task set plus the moment it was captured (ms since the Unix epoch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub tasks: Vec<TaskRecord>,
    pub timestamp: i64,
}

/// Where a task list handed to the visual layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrigin {
    None,
    Cache,
    Remote,
    Demo,
    Placeholder,
}
