pub mod cache_store;
pub mod credential_store;
pub mod file_store;
pub mod memory_store;

pub use cache_store::TaskCacheStore;
pub use credential_store::CredentialStore;
pub use file_store::FileKvStore;
pub use memory_store::MemoryKvStore;

use crate::error::AppError;

/// Prefix shared by every key the garden persists.
pub const STORE_PREFIX: &str = "task-garden.";
pub const CREDENTIAL_KEY: &str = "task-garden.credential";
pub const TASKS_KEY: &str = "task-garden.tasks";
pub const CURSOR_KEY: &str = "task-garden.cursor";

/// Text values stored under string keys.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    fn remove(&self, key: &str) -> Result<(), AppError>;
}
