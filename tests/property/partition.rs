//! Property tests for the board partition invariant.
//!
//! Applies random sequences of insert/remove/relocate/replace to a
//! `BoardState` and checks after every step that:
//! 1. no task id appears twice across columns;
//! 2. every task's status names the column holding it;
//! 3. the board holds exactly the tasks a plain id -> status model says.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;
use taskboard::board::BoardState;
use taskboard_proto::{Priority, Task, TaskId, TaskStatus};

#[derive(Debug, Clone)]
enum Op {
    Insert(u8, TaskStatus),
    Remove(u8),
    Relocate(u8, TaskStatus),
    Replace(u8, u8, TaskStatus),
    Reset(Vec<(u8, TaskStatus)>),
}

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Todo),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Done),
    ]
}

/// Ids come from a small pool so operations collide often.
fn arb_id() -> impl Strategy<Value = u8> {
    0u8..8
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (arb_id(), arb_status()).prop_map(|(id, s)| Op::Insert(id, s)),
        2 => arb_id().prop_map(Op::Remove),
        4 => (arb_id(), arb_status()).prop_map(|(id, s)| Op::Relocate(id, s)),
        3 => (arb_id(), arb_id(), arb_status()).prop_map(|(id, new, s)| Op::Replace(id, new, s)),
        1 => prop::collection::vec((arb_id(), arb_status()), 0..10).prop_map(Op::Reset),
    ]
}

fn id(n: u8) -> TaskId {
    TaskId::new(format!("t{n}"))
}

fn task(n: u8, status: TaskStatus) -> Task {
    Task {
        id: id(n),
        title: format!("Task {n}"),
        description: String::new(),
        status,
        priority: Priority::Medium,
        due_date: None,
        assignees: Vec::new(),
        created_at: None,
        updated_at: None,
    }
}

fn apply(board: &mut BoardState, model: &mut BTreeMap<TaskId, TaskStatus>, op: &Op) {
    match op {
        Op::Insert(n, status) => {
            board.insert(task(*n, *status));
            model.insert(id(*n), *status);
        }
        Op::Remove(n) => {
            board.remove(&id(*n));
            model.remove(&id(*n));
        }
        Op::Relocate(n, status) => {
            board.relocate(&id(*n), *status);
            if let Some(s) = model.get_mut(&id(*n)) {
                *s = *status;
            }
        }
        Op::Replace(n, new, status) => {
            board.replace(&id(*n), task(*new, *status));
            model.remove(&id(*n));
            model.insert(id(*new), *status);
        }
        Op::Reset(tasks) => {
            board.reset(tasks.iter().map(|(n, s)| task(*n, *s)).collect());
            model.clear();
            for (n, s) in tasks {
                model.insert(id(*n), *s);
            }
        }
    }
}

proptest! {
    #[test]
    fn columns_always_partition_the_task_set(ops in prop::collection::vec(arb_op(), 0..64)) {
        let mut board = BoardState::new();
        let mut model = BTreeMap::new();

        for op in &ops {
            apply(&mut board, &mut model, op);

            let mut seen = HashSet::new();
            let mut observed = BTreeMap::new();
            for column in board.columns() {
                for t in &column.tasks {
                    prop_assert!(seen.insert(t.id.clone()), "duplicate id {} after {:?}", t.id, op);
                    prop_assert_eq!(t.status, column.status);
                    observed.insert(t.id.clone(), t.status);
                }
            }
            prop_assert_eq!(&observed, &model);
            prop_assert_eq!(board.len(), model.len());
        }
    }

    #[test]
    fn relocating_absent_task_changes_nothing(
        present in prop::collection::vec((arb_id(), arb_status()), 0..8),
        target in arb_status(),
    ) {
        let board_tasks: Vec<Task> = present.iter().map(|(n, s)| task(*n, *s)).collect();
        let mut board = BoardState::from_tasks(board_tasks);
        let before = board.clone();
        prop_assert_eq!(board.relocate(&TaskId::new("absent"), target), None);
        prop_assert!(board.remove(&TaskId::new("absent")).is_none());
        prop_assert_eq!(board, before);
    }

    #[test]
    fn relocate_then_relocate_back_restores_membership(
        present in prop::collection::vec((arb_id(), arb_status()), 1..8),
        pick in any::<prop::sample::Index>(),
        target in arb_status(),
    ) {
        let board_tasks: Vec<Task> = present.iter().map(|(n, s)| task(*n, *s)).collect();
        let mut board = BoardState::from_tasks(board_tasks);
        let chosen = pick.get(&present).0;
        let original = board.status_of(&id(chosen)).unwrap();

        board.relocate(&id(chosen), target);
        prop_assert_eq!(board.status_of(&id(chosen)), Some(target));
        board.relocate(&id(chosen), original);
        prop_assert_eq!(board.status_of(&id(chosen)), Some(original));
        prop_assert_eq!(board.get(&id(chosen)).unwrap().status, original);
    }
}
