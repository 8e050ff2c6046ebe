//! Task model shared by the board, the store client, and the CLI.
//!
//! Everything in this module is already normalized: a [`Task`] carries a
//! single [`TaskId`] regardless of which identifier field the backend used.
//! See [`crate::wire`] for the decoding side.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::user::{AssigneeRef, UserId};

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Backend-assigned task identifier.
///
/// Opaque to the client. An empty identifier is representable (a form may
/// hand one over) but every store operation rejects it before touching the
/// network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps a backend identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the identifier is empty or whitespace-only.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workflow status of a task. Each status owns exactly one board column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started.
    #[default]
    #[serde(rename = "todo")]
    Todo,
    /// Being worked on.
    #[serde(rename = "in-progress")]
    InProgress,
    /// Finished.
    #[serde(rename = "done")]
    Done,
}

impl TaskStatus {
    /// All statuses in board column order.
    pub const ALL: [Self; 3] = [Self::Todo, Self::InProgress, Self::Done];

    /// Stable key used on the wire and as the column identifier.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in-progress",
            Self::Done => "done",
        }
    }

    /// Display title of the column holding tasks with this status.
    #[must_use]
    pub const fn column_title(self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }

    /// Position of this status' column on the board.
    #[must_use]
    pub const fn column_index(self) -> usize {
        match self {
            Self::Todo => 0,
            Self::InProgress => 1,
            Self::Done => 2,
        }
    }

    /// Parses a column key or column title.
    ///
    /// Matching is case-insensitive and accepts `_` or space in place of
    /// `-`, so `"In Progress"`, `"in_progress"` and `"in-progress"` agree.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let normalized: String = input
            .trim()
            .chars()
            .map(|c| match c {
                '_' | ' ' => '-',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "todo" | "to-do" => Some(Self::Todo),
            "in-progress" | "inprogress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority (form default).
    #[default]
    Medium,
    /// High priority.
    High,
}

impl Priority {
    /// Parses `low`, `medium` or `high`, case-insensitively.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// A persisted task in canonical, normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Backend-assigned identifier.
    pub id: TaskId,
    /// Non-empty title.
    pub title: String,
    /// Free-form description, may be empty.
    #[serde(default)]
    pub description: String,
    /// Workflow status; decides the containing column.
    #[serde(default)]
    pub status: TaskStatus,
    /// Priority.
    #[serde(default)]
    pub priority: Priority,
    /// Calendar due date, if the backend has one.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Assigned users with whatever display fields the backend populated.
    #[serde(default)]
    pub assignees: Vec<AssigneeRef>,
    /// Backend creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Backend last-update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Identifiers of all assignees, in order.
    #[must_use]
    pub fn assignee_ids(&self) -> Vec<UserId> {
        self.assignees.iter().map(|a| a.id.clone()).collect()
    }
}

/// User-supplied fields of a task before the backend has assigned an
/// identifier and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    /// Title, must be non-empty.
    pub title: String,
    /// Description, may be empty.
    pub description: String,
    /// Initial status. New tasks start in `todo` unless a caller says otherwise.
    pub status: TaskStatus,
    /// Priority.
    pub priority: Priority,
    /// Due date.
    pub due_date: NaiveDate,
    /// Identifiers of users to assign.
    pub assignees: Vec<UserId>,
}

impl TaskDraft {
    /// Creates a draft with the given title and due date and default
    /// everything else (`todo`, `medium`, no description, no assignees).
    pub fn new(title: impl Into<String>, due_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            due_date,
            assignees: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the assignee list.
    #[must_use]
    pub fn with_assignees(mut self, assignees: Vec<UserId>) -> Self {
        self.assignees = assignees;
        self
    }

    /// Checks the draft's shape before it is sent anywhere.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason if the title is empty or exceeds
    /// [`MAX_TASK_TITLE_LENGTH`] characters.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("task title cannot be empty".to_string());
        }
        if self.title.chars().count() > MAX_TASK_TITLE_LENGTH {
            return Err(format!(
                "task title too long (max {MAX_TASK_TITLE_LENGTH} characters)"
            ));
        }
        Ok(())
    }
}

/// Partial task update. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<UserId>>,
}

impl TaskPatch {
    /// A patch that only changes the status.
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// A patch carrying every user-editable field of `task`.
    #[must_use]
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            description: Some(task.description.clone()),
            status: Some(task.status),
            priority: Some(task.priority),
            due_date: task.due_date,
            assignees: Some(task.assignee_ids()),
        }
    }

    /// A patch carrying only the fields where `edited` differs from `current`.
    #[must_use]
    pub fn between(current: &Task, edited: &Task) -> Self {
        let edited_assignees = edited.assignee_ids();
        Self {
            title: (current.title != edited.title).then(|| edited.title.clone()),
            description: (current.description != edited.description)
                .then(|| edited.description.clone()),
            status: (current.status != edited.status).then_some(edited.status),
            priority: (current.priority != edited.priority).then_some(edited.priority),
            due_date: if current.due_date == edited.due_date {
                None
            } else {
                edited.due_date
            },
            assignees: (current.assignee_ids() != edited_assignees).then_some(edited_assignees),
        }
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies this patch to `task` in place, as the backend would.
    ///
    /// Assignee ids replace the assignee list; display fields of ids that
    /// were already assigned are kept.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if self.due_date.is_some() {
            task.due_date = self.due_date;
        }
        if let Some(ids) = &self.assignees {
            let previous = std::mem::take(&mut task.assignees);
            task.assignees = ids
                .iter()
                .map(|id| {
                    previous
                        .iter()
                        .find(|a| &a.id == id)
                        .cloned()
                        .unwrap_or_else(|| AssigneeRef::bare(id.clone()))
                })
                .collect();
        }
    }
}
