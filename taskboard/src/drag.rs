//! Drag-and-drop adapter.
//!
//! Turns a gesture layer's drag-end report (the dragged item and whatever
//! it was dropped on) into a [`TaskController::move_task`] call. A drop
//! target is either a column key (`todo`, `in-progress`, `done`) or the id
//! of a task card, in which case the card's column is the target. Anything
//! else is ignored without touching the board or the network.

use std::fmt;

use taskboard_proto::{Task, TaskId, TaskStatus};

use crate::controller::{MoveOutcome, OperationError, TaskController};
use crate::store::TaskStore;

/// A finished drag gesture as reported by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragEnd {
    /// Identifier of the dragged task card.
    pub active: String,
    /// Identifier of the drop target, if the pointer was over one.
    pub over: Option<String>,
}

impl DragEnd {
    pub fn new(active: impl Into<String>, over: Option<impl Into<String>>) -> Self {
        Self {
            active: active.into(),
            over: over.map(Into::into),
        }
    }
}

/// Why a drag produced no move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Dropped outside any target.
    NoTarget,
    /// The target is neither a column nor a card on the board.
    UnknownTarget,
    /// The dragged card is not on the board.
    UnknownTask,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoTarget => "dropped outside the board",
            Self::UnknownTarget => "unknown drop target",
            Self::UnknownTask => "dragged task is not on the board",
        })
    }
}

/// What a drag did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// Nothing happened.
    Ignored(IgnoreReason),
    /// Dropped on the column it already sits in.
    Unchanged,
    /// The move was confirmed.
    Moved(Task),
}

/// Works out which column a drop target stands for.
///
/// A column is named by its key or its title (`"in-progress"`,
/// `"In Progress"`). Column names win over card ids, so a card whose id
/// happens to equal a column name cannot hijack the drop.
pub fn resolve_target<S: TaskStore>(
    controller: &TaskController<S>,
    over: &str,
) -> Option<TaskStatus> {
    TaskStatus::parse(over)
        .or_else(|| controller.task(&TaskId::new(over)).map(|card| card.status))
}

/// Applies a drag-end event.
///
/// # Errors
///
/// Returns the controller's error when the store rejects the move; the
/// board has been rolled back by then.
pub async fn handle_drag_end<S: TaskStore>(
    controller: &TaskController<S>,
    event: &DragEnd,
) -> Result<DragOutcome, OperationError> {
    let Some(over) = event.over.as_deref() else {
        tracing::debug!(active = %event.active, "drag ended outside any target");
        return Ok(DragOutcome::Ignored(IgnoreReason::NoTarget));
    };
    let id = TaskId::new(event.active.as_str());
    if controller.task(&id).is_none() {
        tracing::debug!(active = %event.active, "dragged task not on board");
        return Ok(DragOutcome::Ignored(IgnoreReason::UnknownTask));
    }
    let Some(target) = resolve_target(controller, over) else {
        tracing::debug!(active = %event.active, over, "unknown drop target");
        return Ok(DragOutcome::Ignored(IgnoreReason::UnknownTarget));
    };

    match controller.move_task(&id, target).await? {
        MoveOutcome::Unchanged => Ok(DragOutcome::Unchanged),
        MoveOutcome::Moved(task) => Ok(DragOutcome::Moved(task)),
    }
}
