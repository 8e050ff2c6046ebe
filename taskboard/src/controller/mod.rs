//! Task lifecycle controller.
//!
//! [`TaskController`] is the only writer of the [`BoardState`]. It runs
//! create, update and delete as confirm-then-apply (the board changes only
//! after the store accepts), and move as optimistic-with-rollback (the
//! board changes first and is restored if the store refuses).
//!
//! The board lock is a `parking_lot` mutex that is never held across an
//! `.await`; every board mutation runs to completion while the lock is
//! held, and each one publishes a fresh snapshot on a `watch` channel.
//!
//! For a single task, store responses may arrive out of order. Whichever
//! arrives last decides the board's copy of that task.

pub mod moves;

use std::fmt;

use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use taskboard_proto::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus, User};

use crate::board::{BoardState, Column};
use crate::notify::Announcer;
use crate::store::{StoreError, TaskStore};

pub use moves::{MoveOperation, MoveState, MoveTransitionError};

/// User-level action a controller call performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Load,
    Create,
    Update,
    Delete,
    Move,
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Load => "load",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Move => "move",
        };
        f.write_str(verb)
    }
}

/// A controller call failed. The board has already been restored (moves)
/// or was never touched (everything else).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to {action} task: {source}")]
pub struct OperationError {
    /// What the user was trying to do.
    pub action: TaskAction,
    /// Why the store refused.
    #[source]
    pub source: StoreError,
}

impl OperationError {
    const fn new(action: TaskAction, source: StoreError) -> Self {
        Self { action, source }
    }

    /// User-visible notice for this failure.
    #[must_use]
    pub fn notice(&self) -> Notice {
        let message = match self.action {
            TaskAction::Load => "Failed to load tasks".to_string(),
            action => format!("Failed to {action} task"),
        };
        Notice::error(format!("{message}: {}", self.source.reason()))
    }
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Short user-facing message about the outcome of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn created() -> Self {
        Self::success("Task created")
    }

    #[must_use]
    pub fn updated() -> Self {
        Self::success("Task updated")
    }

    #[must_use]
    pub fn deleted() -> Self {
        Self::success("Task deleted")
    }

    /// "Task moved to Done" and friends.
    #[must_use]
    pub fn moved(status: TaskStatus) -> Self {
        Self::success(format!("Task moved to {}", status.column_title()))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of [`TaskController::move_task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The task already had the requested status; nothing was sent.
    Unchanged,
    /// The store confirmed the move; carries the canonical task.
    Moved(Task),
}

impl MoveOutcome {
    /// Notice for a successful outcome, if one is worth showing.
    #[must_use]
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::Unchanged => None,
            Self::Moved(task) => Some(Notice::moved(task.status)),
        }
    }
}

/// Orchestrates task mutations between a [`TaskStore`] and the board.
pub struct TaskController<S> {
    store: S,
    board: Mutex<BoardState>,
    changes: watch::Sender<Vec<Column>>,
    announcer: Option<Announcer>,
}

impl<S: TaskStore> TaskController<S> {
    /// Creates a controller with an empty board.
    pub fn new(store: S) -> Self {
        let board = BoardState::new();
        let (changes, _) = watch::channel(board.snapshot());
        Self {
            store,
            board: Mutex::new(board),
            changes,
            announcer: None,
        }
    }

    /// Announces every confirmed mutation on the hint channel.
    #[must_use]
    pub fn with_announcer(mut self, announcer: Announcer) -> Self {
        self.announcer = Some(announcer);
        self
    }

    /// Replaces the hint channel used for announcements.
    pub fn set_announcer(&mut self, announcer: Option<Announcer>) {
        self.announcer = announcer;
    }

    /// The store this controller talks to.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Current columns.
    pub fn snapshot(&self) -> Vec<Column> {
        self.board.lock().snapshot()
    }

    /// Current copy of one task.
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.board.lock().get(id).cloned()
    }

    /// Receives the latest snapshot after every board change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Column>> {
        self.changes.subscribe()
    }

    /// Replaces the board with the store's full task list.
    ///
    /// # Errors
    ///
    /// On failure the board keeps its previous contents.
    pub async fn load(&self) -> Result<usize, OperationError> {
        let tasks = self
            .store
            .list_tasks()
            .await
            .map_err(|e| failed(TaskAction::Load, None, e))?;
        let count = tasks.len();
        self.mutate(|board| board.reset(tasks));
        tracing::info!(count, "board loaded");
        Ok(count)
    }

    /// Fetches the user directory. Does not touch the board.
    ///
    /// # Errors
    ///
    /// Propagates the store failure.
    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.store.list_users().await
    }

    /// Persists `draft` and inserts the canonical task at the head of its
    /// column.
    ///
    /// # Errors
    ///
    /// On failure the board is untouched.
    pub async fn create(&self, draft: &TaskDraft) -> Result<Task, OperationError> {
        let task = self
            .store
            .create_task(draft)
            .await
            .map_err(|e| failed(TaskAction::Create, None, e))?;
        tracing::info!(task_id = %task.id, status = %task.status, "task created");
        self.mutate(|board| board.insert(task.clone()));
        self.announce();
        Ok(task)
    }

    /// Sends the fields of `edited` that differ from the board's copy and
    /// replaces the board's copy with the canonical result, which may
    /// change its column.
    ///
    /// An edit identical to the board's copy sends nothing and returns the
    /// current task.
    ///
    /// # Errors
    ///
    /// [`StoreError::IdentifierMissing`] without any I/O if `edited` has no
    /// id. On any failure the board is untouched.
    pub async fn update(&self, edited: &Task) -> Result<Task, OperationError> {
        let id = &edited.id;
        if id.is_missing() {
            return Err(failed(TaskAction::Update, None, StoreError::IdentifierMissing));
        }
        let current = self.task(id);
        let patch = current.as_ref().map_or_else(
            || TaskPatch::from_task(edited),
            |current| TaskPatch::between(current, edited),
        );
        if let (Some(current), true) = (current, patch.is_empty()) {
            tracing::debug!(task_id = %id, "update with no changes, skipping");
            return Ok(current);
        }

        let task = self
            .store
            .update_task(id, &patch)
            .await
            .map_err(|e| failed(TaskAction::Update, Some(id), e))?;
        tracing::info!(task_id = %task.id, status = %task.status, "task updated");
        self.apply_confirmed(id, &task);
        self.announce();
        Ok(task)
    }

    /// Deletes a task and removes it from the board.
    ///
    /// # Errors
    ///
    /// [`StoreError::IdentifierMissing`] without any I/O for an empty id.
    /// On any failure the board is untouched.
    pub async fn delete(&self, id: &TaskId) -> Result<(), OperationError> {
        if id.is_missing() {
            return Err(failed(TaskAction::Delete, None, StoreError::IdentifierMissing));
        }
        self.store
            .delete_task(id)
            .await
            .map_err(|e| failed(TaskAction::Delete, Some(id), e))?;
        tracing::info!(task_id = %id, "task deleted");
        self.mutate(|board| {
            board.remove(id);
        });
        self.announce();
        Ok(())
    }

    /// Moves a task to `target`, optimistically.
    ///
    /// The board shows the task in `target` immediately. If the store
    /// accepts, the board's copy is replaced with the canonical task; if
    /// not, the task goes back to the column it came from.
    ///
    /// Moving to the status the task already has is a no-op with no
    /// network call.
    ///
    /// # Errors
    ///
    /// - [`StoreError::IdentifierMissing`] for an empty id.
    /// - [`StoreError::NotFound`] without any I/O if the task is not on the
    ///   board.
    /// - The store's error after rollback.
    pub async fn move_task(
        &self,
        id: &TaskId,
        target: TaskStatus,
    ) -> Result<MoveOutcome, OperationError> {
        if id.is_missing() {
            return Err(failed(TaskAction::Move, None, StoreError::IdentifierMissing));
        }
        let op_id = Uuid::now_v7();

        let mut operation = {
            let mut board = self.board.lock();
            let Some(from) = board.status_of(id) else {
                drop(board);
                return Err(failed(
                    TaskAction::Move,
                    Some(id),
                    StoreError::NotFound(id.clone()),
                ));
            };
            if from == target {
                tracing::debug!(task_id = %id, status = %target, "move to same column ignored");
                return Ok(MoveOutcome::Unchanged);
            }
            let mut operation = MoveOperation::new(id.clone(), from, target);
            record_transition(op_id, operation.relocate());
            board.relocate(operation.task_id(), operation.to());
            self.changes.send_replace(board.snapshot());
            operation
        };
        tracing::info!(
            op = %op_id,
            task_id = %id,
            from = %operation.from(),
            to = %operation.to(),
            "move started"
        );

        match self.store.update_task(id, &TaskPatch::status(target)).await {
            Ok(task) => {
                self.apply_confirmed(id, &task);
                record_transition(op_id, operation.confirm());
                tracing::info!(op = %op_id, task_id = %id, state = %operation.state(), "move confirmed");
                self.announce();
                Ok(MoveOutcome::Moved(task))
            }
            Err(e) => {
                self.revert(op_id, &mut operation);
                tracing::warn!(
                    op = %op_id,
                    task_id = %id,
                    restored = %operation.from(),
                    state = %operation.state(),
                    error = %e,
                    "move rolled back"
                );
                Err(OperationError::new(TaskAction::Move, e))
            }
        }
    }

    /// Puts the task back in the column the move started from, then marks
    /// the operation rolled back. The board is restored even if the
    /// operation refuses the transition.
    fn revert(&self, op_id: Uuid, operation: &mut MoveOperation) {
        self.mutate(|board| {
            board.relocate(operation.task_id(), operation.from());
        });
        record_transition(op_id, operation.roll_back());
    }

    /// Applies a confirmed store response for `id`. A task that left the
    /// board while the request was in flight stays gone.
    fn apply_confirmed(&self, id: &TaskId, task: &Task) {
        let mut board = self.board.lock();
        if board.get(id).is_none() {
            tracing::debug!(task_id = %id, "task left the board before confirmation, discarding");
            return;
        }
        board.replace(id, task.clone());
        self.changes.send_replace(board.snapshot());
    }

    fn mutate(&self, f: impl FnOnce(&mut BoardState)) {
        let mut board = self.board.lock();
        f(&mut board);
        self.changes.send_replace(board.snapshot());
    }

    fn announce(&self) {
        if let Some(announcer) = &self.announcer {
            announcer.announce();
        }
    }
}

fn failed(action: TaskAction, id: Option<&TaskId>, source: StoreError) -> OperationError {
    match id {
        Some(id) => tracing::warn!(%action, task_id = %id, error = %source, "operation failed"),
        None => tracing::warn!(%action, error = %source, "operation failed"),
    }
    OperationError::new(action, source)
}

/// A rejected transition never changes what the board shows, so it is
/// logged and the move carries on with the store's verdict.
fn record_transition(op_id: Uuid, result: Result<(), MoveTransitionError>) {
    if let Err(e) = result {
        tracing::error!(op = %op_id, error = %e, "move state machine violated");
    }
}
