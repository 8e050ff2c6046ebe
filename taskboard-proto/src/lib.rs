//! Shared model and wire definitions for `Taskboard`.

pub mod notify;
pub mod task;
pub mod user;
pub mod wire;

pub use task::{Priority, Task, TaskDraft, TaskId, TaskPatch, TaskStatus};
pub use user::{AssigneeRef, AuthGrant, User, UserId};
