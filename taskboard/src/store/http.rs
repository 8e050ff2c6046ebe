//! REST backend client.
//!
//! Implements [`TaskStore`] over the backend's JSON API and adds the
//! unauthenticated login/register calls. The bearer token comes from the
//! caller's [`Session`](crate::session::Session); it is attached to every
//! task and user request, and a request without one fails with
//! [`StoreError::Auth`] before anything is sent.

use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, StatusCode};
use url::Url;

use taskboard_proto::wire::{self, WireError};
use taskboard_proto::{AuthGrant, Task, TaskDraft, TaskId, TaskPatch, User};

use super::{StoreError, TaskStore, require_id};
use crate::config::ApiConfig;

impl From<WireError> for StoreError {
    fn from(e: WireError) -> Self {
        Self::Network(format!("unexpected response: {e}"))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network("request timed out".to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Maps a non-success HTTP status to the store error taxonomy.
///
/// `target` is the task a request addressed, if any; only then does a 404
/// mean [`StoreError::NotFound`].
#[must_use]
pub fn classify_status(status: StatusCode, body: &[u8], target: Option<&TaskId>) -> StoreError {
    let message = wire::message_from_json(body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Auth(message),
        StatusCode::NOT_FOUND => match target {
            Some(id) => StoreError::NotFound(id.clone()),
            None => StoreError::Network(format!("endpoint not found: {message}")),
        },
        s if s.is_client_error() => StoreError::Validation(message),
        s => StoreError::Network(format!("server returned {}: {message}", s.as_u16())),
    }
}

/// [`TaskStore`] backed by the REST API.
pub struct HttpTaskStore {
    http: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl HttpTaskStore {
    /// Builds a client for the API described by `config`. No request is made.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Network`] if the HTTP client cannot be built or
    /// the base URL cannot carry path segments.
    pub fn new(config: &ApiConfig) -> Result<Self, StoreError> {
        if config.base_url.cannot_be_a_base() {
            return Err(StoreError::Network(format!(
                "base url {} cannot carry a path",
                config.base_url
            )));
        }
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        tracing::debug!(base_url = %config.base_url, "http task store ready");
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: RwLock::new(None),
        })
    }

    /// Sets the bearer token used by subsequent requests.
    #[must_use]
    pub fn with_token(self, token: Option<String>) -> Self {
        *self.token.write() = token;
        self
    }

    /// Replaces the bearer token (after login, or `None` after logout).
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    /// Authenticates with email and password.
    ///
    /// The returned grant is not stored here; the caller puts it in its
    /// session and hands the token back via [`set_token`](Self::set_token).
    ///
    /// # Errors
    ///
    /// [`StoreError::Auth`] for rejected credentials, otherwise per
    /// [`classify_status`].
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthGrant, StoreError> {
        let url = self.endpoint(&["auth", "login"])?;
        let body = serde_json::json!({ "email": email, "password": password });
        let bytes = self
            .execute(self.http.post(url).json(&body), None)
            .await
            .map_err(|e| match e {
                StoreError::Validation(msg) => StoreError::Auth(msg),
                other => other,
            })?;
        let grant = wire::auth_grant_from_json(&bytes)?;
        tracing::info!(user_id = %grant.user.id, "logged in");
        Ok(grant)
    }

    /// Creates an account and authenticates as it.
    ///
    /// # Errors
    ///
    /// [`StoreError::Validation`] if the backend rejects the registration
    /// (e.g. email already taken), otherwise per [`classify_status`].
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, StoreError> {
        let url = self.endpoint(&["auth", "register"])?;
        let body = serde_json::json!({ "name": name, "email": email, "password": password });
        let bytes = self.execute(self.http.post(url).json(&body), None).await?;
        let grant = wire::auth_grant_from_json(&bytes)?;
        tracing::info!(user_id = %grant.user.id, "registered");
        Ok(grant)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Network(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        let token = self
            .token
            .read()
            .clone()
            .ok_or_else(|| StoreError::Auth("no session token".to_string()))?;
        Ok(request.bearer_auth(token))
    }

    /// Sends one request and returns the body of a successful response.
    async fn execute(
        &self,
        request: RequestBuilder,
        target: Option<&TaskId>,
    ) -> Result<Vec<u8>, StoreError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "request failed before a response");
            StoreError::from(e)
        })?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        if status.is_success() {
            return Ok(body);
        }
        let err = classify_status(status, &body, target);
        tracing::warn!(status = status.as_u16(), error = %err, "request rejected");
        Err(err)
    }
}

impl TaskStore for HttpTaskStore {
    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let url = self.endpoint(&["tasks"])?;
        let request = self.authorized(self.http.get(url))?;
        let bytes = self.execute(request, None).await?;
        let tasks = wire::tasks_from_json(&bytes)?;
        tracing::debug!(count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, StoreError> {
        let url = self.endpoint(&["tasks"])?;
        let request = self.authorized(self.http.post(url).json(draft))?;
        let bytes = self.execute(request, None).await?;
        let task = wire::task_from_json(&bytes)?;
        tracing::debug!(task_id = %task.id, "created task");
        Ok(task)
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        require_id(id)?;
        let url = self.endpoint(&["tasks", id.as_str()])?;
        let request = self.authorized(self.http.put(url).json(patch))?;
        let bytes = self.execute(request, Some(id)).await?;
        let task = wire::task_from_json(&bytes)?;
        tracing::debug!(task_id = %task.id, status = %task.status, "updated task");
        Ok(task)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        require_id(id)?;
        let url = self.endpoint(&["tasks", id.as_str()])?;
        let request = self.authorized(self.http.delete(url))?;
        let bytes = self.execute(request, Some(id)).await?;
        tracing::debug!(
            task_id = %id,
            ack = wire::message_from_json(&bytes).as_deref().unwrap_or(""),
            "deleted task"
        );
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let url = self.endpoint(&["users"])?;
        let request = self.authorized(self.http.get(url))?;
        let bytes = self.execute(request, None).await?;
        Ok(wire::users_from_json(&bytes)?)
    }
}
