use crate::clock::format_rfc3339;
use crate::error::FetchError;
use crate::model::TaskRecord;
use crate::remote::{TaskQuery, TaskSource};
use time::OffsetDateTime;
use tracing::debug;

/// Fetches every completed task since `since`, following pagination until the
/// source stops returning a next-page offset.
pub async fn fetch_completed_since(
    source: &dyn TaskSource,
    credential: &str,
    since: OffsetDateTime,
    page_size: u32,
) -> Result<Vec<TaskRecord>, FetchError> {
    let identity = source.identity(credential).await?;
    let completed_since =
        format_rfc3339(since).map_err(|err| FetchError::data_format(err.message()))?;
    debug!(
        assignee = %identity.user_gid,
        workspace = %identity.workspace_gid,
        completed_since = %completed_since,
        "listing tasks by assignee and workspace"
    );

    let mut query = TaskQuery {
        assignee: identity.user_gid,
        workspace: identity.workspace_gid,
        completed_since,
        limit: page_size,
        offset: None,
    };
    let mut completed = Vec::new();
    let mut pages = 0usize;

    loop {
        let page = source.list_tasks(credential, &query).await?;
        pages += 1;
        completed.extend(page.tasks.into_iter().filter(|task| task.completed));

        match page.next_offset {
            Some(offset) => query.offset = Some(offset),
            None => break,
        }
    }

    debug!(pages, tasks = completed.len(), "paginated fetch finished");
    Ok(completed)
}
