use crate::error::FetchError;
use crate::remote::{Identity, TaskPage, TaskQuery, TaskSource};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Task source that replays queued pages and records every query it sees.
/// An exhausted script answers with an empty final page.
#[derive(Default)]
pub struct ScriptedSource {
    identity_error: Mutex<Option<FetchError>>,
    responses: Mutex<VecDeque<Result<TaskPage, FetchError>>>,
    queries: Mutex<Vec<TaskQuery>>,
    credentials: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&self, page: TaskPage) {
        self.responses.lock().unwrap().push_back(Ok(page));
    }

    pub fn push_error(&self, error: FetchError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn fail_identity(&self, error: FetchError) {
        *self.identity_error.lock().unwrap() = Some(error);
    }

    pub fn queries(&self) -> Vec<TaskQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn credentials(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskSource for ScriptedSource {
    async fn identity(&self, credential: &str) -> Result<Identity, FetchError> {
        self.credentials.lock().unwrap().push(credential.to_string());
        if let Some(error) = self.identity_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(Identity {
            user_gid: "user-1".to_string(),
            workspace_gid: "workspace-1".to_string(),
        })
    }

    async fn list_tasks(&self, _credential: &str, query: &TaskQuery) -> Result<TaskPage, FetchError> {
        self.queries.lock().unwrap().push(query.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TaskPage::default()))
    }
}
