use crate::error::{FetchError, FetchErrorKind};
use crate::model::TaskRecord;
use crate::remote::{Identity, TaskPage, TaskQuery, TaskSource};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://app.asana.com/api/1.0";
const TASK_FIELDS: &str = "gid,name,completed,completed_at";
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    next_page: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
    offset: String,
}

#[derive(Debug, Deserialize)]
struct UserData {
    gid: String,
    #[serde(default)]
    workspaces: Vec<WorkspaceRef>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceRef {
    gid: String,
    #[serde(default)]
    name: Option<String>,
}

/// Task source backed by the vendor's REST API.
#[derive(Debug, Clone)]
pub struct HttpTaskSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTaskSource {
    pub fn new<U: Into<String>>(base_url: U, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        credential: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(credential)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if let Some(kind) = FetchErrorKind::from_status(status.as_u16()) {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(FetchError::new(
                kind,
                format!("HTTP {status} from /{path}: {snippet}"),
            ));
        }

        let body = response.bytes().await?;
        serde_json::from_slice::<T>(&body)
            .map_err(|err| FetchError::data_format(format!("unreadable /{path} response: {err}")))
    }
}

#[async_trait]
impl TaskSource for HttpTaskSource {
    async fn identity(&self, credential: &str) -> Result<Identity, FetchError> {
        let envelope: Envelope<UserData> = self.get_json(credential, "users/me", &[]).await?;
        let user = envelope.data;
        let workspace = user
            .workspaces
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::data_format("user has no workspaces"))?;
        debug!(
            user = %user.gid,
            workspace = %workspace.gid,
            workspace_name = workspace.name.as_deref().unwrap_or("-"),
            "resolved identity"
        );

        Ok(Identity {
            user_gid: user.gid,
            workspace_gid: workspace.gid,
        })
    }

    async fn list_tasks(&self, credential: &str, query: &TaskQuery) -> Result<TaskPage, FetchError> {
        let mut params = vec![
            ("assignee", query.assignee.clone()),
            ("workspace", query.workspace.clone()),
            ("completed_since", query.completed_since.clone()),
            ("limit", query.limit.to_string()),
            ("opt_fields", TASK_FIELDS.to_string()),
        ];
        if let Some(offset) = query.offset.as_ref() {
            params.push(("offset", offset.clone()));
        }

        let envelope: Envelope<Vec<TaskRecord>> = self.get_json(credential, "tasks", &params).await?;
        Ok(TaskPage {
            tasks: envelope.data,
            next_offset: envelope.next_page.map(|next| next.offset),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::HttpTaskSource;
    use crate::error::FetchErrorKind;
    use crate::remote::{TaskQuery, TaskSource};
    use axum::{Json, Router};
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()) == Some("Bearer good-token")
    }

    async fn me(headers: HeaderMap) -> Response {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, "Not Authorized").into_response();
        }
        Json(json!({
            "data": {
                "gid": "u-1",
                "name": "Gardener",
                "workspaces": [{ "gid": "w-1", "name": "Acme" }, { "gid": "w-2", "name": "Side" }]
            }
        }))
        .into_response()
    }

    async fn tasks(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        let expected = [
            ("assignee", "u-1"),
            ("workspace", "w-1"),
            ("completed_since", "2025-05-01T00:00:00Z"),
            ("limit", "2"),
        ];
        for (key, value) in expected {
            if params.get(key).map(String::as_str) != Some(value) {
                return (StatusCode::BAD_REQUEST, format!("bad {key}")).into_response();
            }
        }
        if !params.get("opt_fields").is_some_and(|fields| fields.contains("completed_at")) {
            return StatusCode::BAD_REQUEST.into_response();
        }

        match params.get("offset").map(String::as_str) {
            None => Json(json!({
                "data": [
                    { "gid": "1", "name": "prune roses", "completed": true, "completed_at": "2025-05-02T10:00:00.000Z" },
                    { "gid": "2", "name": "buy seeds", "completed": false, "completed_at": null }
                ],
                "next_page": { "offset": "page-2", "path": "/tasks?offset=page-2", "uri": "https://example.test/tasks?offset=page-2" }
            }))
            .into_response(),
            Some("page-2") => Json(json!({
                "data": [
                    { "gid": "3", "name": "water ferns", "completed": true, "completed_at": "2025-05-03T10:00:00.000Z", "resource_type": "task" }
                ],
                "next_page": null
            }))
            .into_response(),
            Some(_) => StatusCode::BAD_REQUEST.into_response(),
        }
    }

    fn router() -> Router {
        Router::new()
            .route("/users/me", get(me))
            .route("/tasks", get(tasks))
            .route("/limited/users/me", get(|| async { StatusCode::TOO_MANY_REQUESTS }))
            .route("/broken/users/me", get(|| async { StatusCode::BAD_GATEWAY }))
            .route("/garbled/users/me", get(|| async { "<html>oops</html>" }))
            .route("/nullish/users/me", get(me))
            .route(
                "/nullish/tasks",
                get(|| async {
                    Json(json!({
                        "data": [
                            { "gid": "1", "name": "prune roses", "completed": true, "completed_at": "2025-05-02T10:00:00.000Z" },
                            { "gid": null, "name": "no id", "completed": true, "completed_at": null }
                        ],
                        "next_page": null
                    }))
                }),
            )
            .route(
                "/lonely/users/me",
                get(|| async { Json(json!({ "data": { "gid": "u-9", "workspaces": [] } })) }),
            )
    }

    fn query(offset: Option<&str>) -> TaskQuery {
        TaskQuery {
            assignee: "u-1".to_string(),
            workspace: "w-1".to_string(),
            completed_since: "2025-05-01T00:00:00Z".to_string(),
            limit: 2,
            offset: offset.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn identity_uses_first_workspace() {
        let base = serve(router()).await;
        let source = HttpTaskSource::new(format!("{base}/"), Duration::from_secs(5));

        let identity = source.identity("good-token").await.unwrap();
        assert_eq!(identity.user_gid, "u-1");
        assert_eq!(identity.workspace_gid, "w-1");
    }

    #[tokio::test]
    async fn list_tasks_reads_page_and_next_offset() {
        let base = serve(router()).await;
        let source = HttpTaskSource::new(base, Duration::from_secs(5));

        let first = source.list_tasks("good-token", &query(None)).await.unwrap();
        assert_eq!(first.tasks.len(), 2);
        assert_eq!(first.next_offset.as_deref(), Some("page-2"));
        assert!(!first.tasks[1].completed);

        let second = source
            .list_tasks("good-token", &query(Some("page-2")))
            .await
            .unwrap();
        assert_eq!(second.next_offset, None);
        assert_eq!(second.tasks[0].extra["resource_type"], "task");
    }

    #[tokio::test]
    async fn null_identifier_does_not_fail_the_page() {
        let base = serve(router()).await;
        let source = HttpTaskSource::new(format!("{base}/nullish"), Duration::from_secs(5));

        let page = source.list_tasks("good-token", &query(None)).await.unwrap();
        assert_eq!(page.tasks.len(), 2);
        assert_eq!(page.tasks[0].identifier(), Some("1"));
        assert_eq!(page.tasks[1].identifier(), None);
        assert_eq!(page.next_offset, None);
    }

    // Sends headers and part of the body, then stalls.
    async fn serve_stalled_body() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request = [0_u8; 2048];
                    let _ = socket.read(&mut request).await;
                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"data\":",
                        )
                        .await;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                });
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn body_timeout_is_network_error() {
        let base = serve_stalled_body().await;
        let source = HttpTaskSource::new(base, Duration::from_millis(300));

        let err = source.identity("good-token").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Network);
    }

    #[tokio::test]
    async fn status_codes_are_classified() {
        let base = serve(router()).await;

        let bad_token = HttpTaskSource::new(base.clone(), Duration::from_secs(5));
        let err = bad_token.identity("expired").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Authentication);
        assert!(err.detail.contains("401"));

        let limited = HttpTaskSource::new(format!("{base}/limited"), Duration::from_secs(5));
        let err = limited.identity("good-token").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::RateLimit);

        let broken = HttpTaskSource::new(format!("{base}/broken"), Duration::from_secs(5));
        let err = broken.identity("good-token").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::RemoteServer);
    }

    #[tokio::test]
    async fn malformed_payloads_are_data_format_errors() {
        let base = serve(router()).await;

        let garbled = HttpTaskSource::new(format!("{base}/garbled"), Duration::from_secs(5));
        let err = garbled.identity("good-token").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::DataFormat);

        let lonely = HttpTaskSource::new(format!("{base}/lonely"), Duration::from_secs(5));
        let err = lonely.identity("good-token").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::DataFormat);
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpTaskSource::new(format!("http://{addr}"), Duration::from_secs(5));
        let err = source.identity("good-token").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Network);
    }
}
