//! Optimistic move state machine.
//!
//! A move goes `Idle -> OptimisticallyRelocated -> Confirmed | RolledBack`.
//! The two final states are terminal: any further transition is rejected
//! with [`MoveTransitionError`] and leaves the operation unchanged.

use std::fmt;

use taskboard_proto::{TaskId, TaskStatus};

/// Where a move operation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    /// Created, board not yet touched.
    Idle,
    /// The task sits in the target column; the store has not answered.
    OptimisticallyRelocated,
    /// The store accepted the new status.
    Confirmed,
    /// The store refused; the task went back to its original column.
    RolledBack,
}

impl MoveState {
    /// Whether no further transitions are accepted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::RolledBack)
    }
}

impl fmt::Display for MoveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::OptimisticallyRelocated => "optimistically-relocated",
            Self::Confirmed => "confirmed",
            Self::RolledBack => "rolled-back",
        };
        f.write_str(name)
    }
}

/// A transition that is not allowed from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot go from {from} to {to}")]
pub struct MoveTransitionError {
    /// State the operation was in.
    pub from: MoveState,
    /// State that was requested.
    pub to: MoveState,
}

/// One optimistic move of a task between columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOperation {
    task_id: TaskId,
    from: TaskStatus,
    to: TaskStatus,
    state: MoveState,
}

impl MoveOperation {
    /// Starts a move of `task_id` from `from` to `to`, in [`MoveState::Idle`].
    #[must_use]
    pub const fn new(task_id: TaskId, from: TaskStatus, to: TaskStatus) -> Self {
        Self {
            task_id,
            from,
            to,
            state: MoveState::Idle,
        }
    }

    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Status the task had when the move began.
    #[must_use]
    pub const fn from(&self) -> TaskStatus {
        self.from
    }

    /// Status the move is heading for.
    #[must_use]
    pub const fn to(&self) -> TaskStatus {
        self.to
    }

    #[must_use]
    pub const fn state(&self) -> MoveState {
        self.state
    }

    /// `Idle -> OptimisticallyRelocated`.
    ///
    /// # Errors
    ///
    /// Fails unless the operation is idle.
    pub fn relocate(&mut self) -> Result<(), MoveTransitionError> {
        self.advance(MoveState::Idle, MoveState::OptimisticallyRelocated)
    }

    /// `OptimisticallyRelocated -> Confirmed`.
    ///
    /// # Errors
    ///
    /// Fails unless the task was optimistically relocated.
    pub fn confirm(&mut self) -> Result<(), MoveTransitionError> {
        self.advance(MoveState::OptimisticallyRelocated, MoveState::Confirmed)
    }

    /// `OptimisticallyRelocated -> RolledBack`.
    ///
    /// # Errors
    ///
    /// Fails unless the task was optimistically relocated.
    pub fn roll_back(&mut self) -> Result<(), MoveTransitionError> {
        self.advance(MoveState::OptimisticallyRelocated, MoveState::RolledBack)
    }

    fn advance(&mut self, expected: MoveState, next: MoveState) -> Result<(), MoveTransitionError> {
        if self.state != expected {
            return Err(MoveTransitionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}
