mod task;

pub use task::{CacheSnapshot, TaskOrigin, TaskRecord};
