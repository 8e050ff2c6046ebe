//! In-process task store for tests and demos.
//!
//! [`MemoryTaskStore`] behaves like the backend (assigns `t1`, `t2`, ...
//! identifiers, returns canonical tasks, lists newest first) and adds two
//! test hooks:
//! - failure injection: [`fail_next`](MemoryTaskStore::fail_next) makes the
//!   next call of an operation fail with a chosen error;
//! - gating: [`gate_next`](MemoryTaskStore::gate_next) parks the next call
//!   of an operation until the returned [`Gate`] is released, which lets a
//!   test resolve responses in any order.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use taskboard_proto::{AssigneeRef, Task, TaskDraft, TaskId, TaskPatch, User};

use super::{StoreError, TaskStore, require_id};

/// Store operations, used to target failures and gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `list_tasks`
    List,
    /// `create_task`
    Create,
    /// `update_task`
    Update,
    /// `delete_task`
    Delete,
    /// `list_users`
    ListUsers,
}

/// One recorded call that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    /// Which operation was called.
    pub op: StoreOp,
    /// Target task, for update and delete.
    pub task_id: Option<TaskId>,
}

/// Releases a parked store call.
///
/// Dropping the gate without calling [`release`](Gate::release) also lets
/// the call proceed.
#[derive(Debug)]
pub struct Gate {
    tx: oneshot::Sender<()>,
}

impl Gate {
    /// Let the parked call continue.
    pub fn release(self) {
        let _ = self.tx.send(());
    }
}

#[derive(Default)]
struct Inner {
    tasks: Vec<Task>,
    users: Vec<User>,
    next_id: u64,
    calls: Vec<StoreCall>,
    failures: HashMap<StoreOp, VecDeque<StoreError>>,
    gates: HashMap<StoreOp, VecDeque<oneshot::Receiver<()>>>,
}

/// In-memory [`TaskStore`] with failure injection and response gating.
#[derive(Default)]
pub struct MemoryTaskStore {
    inner: Mutex<Inner>,
}

impl MemoryTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `tasks` (kept in the given order).
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let store = Self::new();
        store.inner.lock().tasks = tasks;
        store
    }

    /// Sets the user directory, also used to populate assignee details.
    #[must_use]
    pub fn with_users(self, users: Vec<User>) -> Self {
        self.inner.lock().users = users;
        self
    }

    /// Makes the next call of `op` fail with `error`. Failures queue up.
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.inner
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Parks the next call of `op` until the returned gate is released.
    #[must_use]
    pub fn gate_next(&self, op: StoreOp) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().gates.entry(op).or_default().push_back(rx);
        Gate { tx }
    }

    /// Every call that reached the store, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().calls.clone()
    }

    /// Number of calls of `op` that reached the store.
    #[must_use]
    pub fn call_count(&self, op: StoreOp) -> usize {
        self.inner.lock().calls.iter().filter(|c| c.op == op).count()
    }

    /// Current server-side copy of a task.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.inner.lock().tasks.iter().find(|t| &t.id == id).cloned()
    }

    /// Records the call, waits on its gate if one is queued, then returns
    /// the injected failure if any.
    async fn enter(&self, op: StoreOp, task_id: Option<&TaskId>) -> Result<(), StoreError> {
        let gate = {
            let mut inner = self.inner.lock();
            inner.calls.push(StoreCall {
                op,
                task_id: task_id.cloned(),
            });
            inner.gates.get_mut(&op).and_then(VecDeque::pop_front)
        };
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        let failure = self
            .inner
            .lock()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(err) => {
                tracing::debug!(?op, error = %err, "injected store failure");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

fn populate_assignees(task: &mut Task, users: &[User]) {
    for assignee in &mut task.assignees {
        if let Some(user) = users.iter().find(|u| u.id == assignee.id) {
            *assignee = AssigneeRef::from(user);
        }
    }
}

impl TaskStore for MemoryTaskStore {
    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.enter(StoreOp::List, None).await?;
        Ok(self.inner.lock().tasks.clone())
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, StoreError> {
        self.enter(StoreOp::Create, None).await?;
        draft.validate().map_err(StoreError::Validation)?;

        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let now = Utc::now();
        let mut task = Task {
            id: TaskId::new(format!("t{}", inner.next_id)),
            title: draft.title.clone(),
            description: draft.description.clone(),
            status: draft.status,
            priority: draft.priority,
            due_date: Some(draft.due_date),
            assignees: draft
                .assignees
                .iter()
                .cloned()
                .map(AssigneeRef::bare)
                .collect(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        populate_assignees(&mut task, &inner.users);
        inner.tasks.insert(0, task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        require_id(id)?;
        self.enter(StoreOp::Update, Some(id)).await?;

        let mut inner = self.inner.lock();
        let Inner { tasks, users, .. } = &mut *inner;
        let task = tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        patch.apply_to(task);
        populate_assignees(task, users);
        task.updated_at = Some(Utc::now());
        Ok(task.clone())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        require_id(id)?;
        self.enter(StoreOp::Delete, Some(id)).await?;

        let mut inner = self.inner.lock();
        let before = inner.tasks.len();
        inner.tasks.retain(|t| &t.id != id);
        if inner.tasks.len() == before {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.enter(StoreOp::ListUsers, None).await?;
        Ok(self.inner.lock().users.clone())
    }
}
