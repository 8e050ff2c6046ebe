//! Collaborative task board client library.
//!
//! The core is the reconciliation engine: [`board::BoardState`] holds the
//! columnar view, [`controller::TaskController`] keeps it consistent with
//! a [`store::TaskStore`] under optimistic moves and out-of-order
//! responses, and [`drag`] turns drop gestures into moves.

pub mod board;
pub mod commands;
pub mod config;
pub mod controller;
pub mod drag;
pub mod notify;
pub mod session;
pub mod store;
