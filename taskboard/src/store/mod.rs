//! Remote task store abstraction.
//!
//! Defines the [`TaskStore`] trait the lifecycle controller talks to.
//! Implementations:
//! - [`http::HttpTaskStore`]: the REST backend, bearer-token authenticated
//! - [`memory::MemoryTaskStore`]: in-process store with failure injection,
//!   used by tests
//!
//! Every call is a single best-effort round trip: no caching, no retries.

pub mod http;
pub mod memory;

use taskboard_proto::{Task, TaskDraft, TaskId, TaskPatch, User};

/// Errors surfaced by a [`TaskStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Transport or connectivity failure, timeout, server-side failure, or
    /// an undecodable response.
    #[error("network error: {0}")]
    Network(String),

    /// Missing, expired, or invalid token.
    #[error("not authenticated: {0}")]
    Auth(String),

    /// The backend rejected the payload's shape or content.
    #[error("rejected by server: {0}")]
    Validation(String),

    /// The backend does not know the targeted identifier.
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// An update or delete was attempted without an identifier. Never
    /// reaches the network.
    #[error("task identifier is missing")]
    IdentifierMissing,
}

impl StoreError {
    /// Short, user-facing reason used in notices.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Network(_) => "the server could not be reached",
            Self::Auth(_) => "you are not logged in",
            Self::Validation(_) => "the server rejected the request",
            Self::NotFound(_) => "the task no longer exists",
            Self::IdentifierMissing => "the task has no identifier",
        }
    }
}

/// Rejects an empty identifier before any I/O.
///
/// # Errors
///
/// Returns [`StoreError::IdentifierMissing`] if `id` is empty or blank.
pub fn require_id(id: &TaskId) -> Result<(), StoreError> {
    if id.is_missing() {
        return Err(StoreError::IdentifierMissing);
    }
    Ok(())
}

/// Async task persistence used by the lifecycle controller.
///
/// Implementations must normalize identifiers before returning: every
/// [`Task`] handed back carries its canonical id.
pub trait TaskStore: Send + Sync {
    /// Fetch every task visible to the session.
    fn list_tasks(&self) -> impl std::future::Future<Output = Result<Vec<Task>, StoreError>> + Send;

    /// Persist a new task and return the canonical version.
    fn create_task(
        &self,
        draft: &TaskDraft,
    ) -> impl std::future::Future<Output = Result<Task, StoreError>> + Send;

    /// Apply a partial update and return the canonical version.
    ///
    /// An empty `id` fails with [`StoreError::IdentifierMissing`] without
    /// any I/O.
    fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl std::future::Future<Output = Result<Task, StoreError>> + Send;

    /// Delete a task.
    ///
    /// An empty `id` fails with [`StoreError::IdentifierMissing`] without
    /// any I/O.
    fn delete_task(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Fetch the user directory (for assignee pickers).
    fn list_users(&self) -> impl std::future::Future<Output = Result<Vec<User>, StoreError>> + Send;
}
