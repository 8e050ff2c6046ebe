//! Columnar in-memory view of the task set.
//!
//! [`BoardState`] holds one column per [`TaskStatus`], in board order. Every
//! mutation routes a task into the column matching its status and first
//! removes any task with the same identifier, so the columns always
//! partition the task set: no identifier appears twice, and every task's
//! status names the column it sits in.
//!
//! All operations are total. Removing or relocating an absent identifier
//! is a no-op reported through the return value, never an error.

use taskboard_proto::{Task, TaskId, TaskStatus};

/// One column of the board as seen by renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Stable column identifier (the status key).
    pub id: &'static str,
    /// Display title.
    pub title: &'static str,
    /// Status every task in this column carries.
    pub status: TaskStatus,
    /// Tasks, newest first.
    pub tasks: Vec<Task>,
}

impl Column {
    fn empty(status: TaskStatus) -> Self {
        Self {
            id: status.key(),
            title: status.column_title(),
            status,
            tasks: Vec::new(),
        }
    }
}

/// The board's three columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardState {
    columns: [Column; 3],
}

impl Default for BoardState {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardState {
    /// Creates a board with three empty columns.
    #[must_use]
    pub fn new() -> Self {
        Self {
            columns: TaskStatus::ALL.map(Column::empty),
        }
    }

    /// Creates a board from a full task list, keeping the list's order
    /// within each column.
    #[must_use]
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut board = Self::new();
        board.reset(tasks);
        board
    }

    /// Replaces the whole board with `tasks`, keeping their relative order.
    /// A later duplicate of an identifier wins over an earlier one.
    pub fn reset(&mut self, tasks: Vec<Task>) {
        for column in &mut self.columns {
            column.tasks.clear();
        }
        for task in tasks {
            self.detach(&task.id);
            self.columns[task.status.column_index()].tasks.push(task);
        }
    }

    /// Places `task` at the head of the column matching its status.
    ///
    /// A task already on the board under the same identifier is removed
    /// first, so inserting twice never duplicates.
    pub fn insert(&mut self, task: Task) {
        self.detach(&task.id);
        self.columns[task.status.column_index()]
            .tasks
            .insert(0, task);
    }

    /// Removes the task with `id` from whichever column holds it.
    ///
    /// Returns the removed task, or `None` if it was not on the board.
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        self.detach(id)
    }

    /// Moves the task with `id` to the column for `status`, overwriting
    /// its status field.
    ///
    /// Returns the status it had before, or `None` (and changes nothing)
    /// if the task is not on the board. Relocating to the current status
    /// leaves the task where it is.
    pub fn relocate(&mut self, id: &TaskId, status: TaskStatus) -> Option<TaskStatus> {
        let (col, pos) = self.position(id)?;
        let previous = self.columns[col].status;
        if previous == status {
            return Some(previous);
        }
        let mut task = self.columns[col].tasks.remove(pos);
        task.status = status;
        self.columns[status.column_index()].tasks.insert(0, task);
        Some(previous)
    }

    /// Replaces whatever is on the board under `id` with `task`, placed
    /// in the column matching `task.status`.
    ///
    /// When the task stays in its column it keeps its position; when the
    /// status changed it goes to the head of the new column. If `id` is not
    /// on the board, this is an insert. `task.id` normally equals `id`; if
    /// the backend renamed it, both identifiers are cleared first.
    pub fn replace(&mut self, id: &TaskId, task: Task) {
        let target = task.status.column_index();
        let slot = self
            .position(id)
            .filter(|&(col, _)| col == target)
            .map(|(_, pos)| pos);
        if &task.id != id {
            self.detach(&task.id);
        }
        match slot {
            Some(pos) if self.columns[target].tasks.get(pos).is_some_and(|t| &t.id == id) => {
                self.columns[target].tasks[pos] = task;
            }
            _ => {
                self.detach(id);
                self.columns[target].tasks.insert(0, task);
            }
        }
    }

    /// Read-only view of the columns, in board order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Owned copy of the columns for handing to renderers.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Column> {
        self.columns.to_vec()
    }

    /// Finds a task by identifier.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.position(id)
            .map(|(col, pos)| &self.columns[col].tasks[pos])
    }

    /// The column currently holding `id`.
    #[must_use]
    pub fn status_of(&self, id: &TaskId) -> Option<TaskStatus> {
        self.position(id).map(|(col, _)| self.columns[col].status)
    }

    /// The column for `status`.
    #[must_use]
    pub fn column(&self, status: TaskStatus) -> &Column {
        &self.columns[status.column_index()]
    }

    /// Total number of tasks on the board.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    /// Whether the board holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(|c| c.tasks.is_empty())
    }

    fn position(&self, id: &TaskId) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(col, column)| {
            column
                .tasks
                .iter()
                .position(|t| &t.id == id)
                .map(|pos| (col, pos))
        })
    }

    fn detach(&mut self, id: &TaskId) -> Option<Task> {
        let (col, pos) = self.position(id)?;
        Some(self.columns[col].tasks.remove(pos))
    }
}
