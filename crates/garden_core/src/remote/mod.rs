mod http;

pub use http::{DEFAULT_BASE_URL, HttpTaskSource};

use crate::error::FetchError;
use crate::model::TaskRecord;
use async_trait::async_trait;

/// The authenticated user and the workspace their tasks are listed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_gid: String,
    pub workspace_gid: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub assignee: String,
    pub workspace: String,
    pub completed_since: String,
    pub limit: u32,
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPage {
    pub tasks: Vec<TaskRecord>,
    pub next_offset: Option<String>,
}

/// Read side of the project-management API.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn identity(&self, credential: &str) -> Result<Identity, FetchError>;

    async fn list_tasks(&self, credential: &str, query: &TaskQuery) -> Result<TaskPage, FetchError>;
}
