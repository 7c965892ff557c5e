// src/dag/mod.rs

//! Task graph representation.
//!
//! - [`graph`] holds the arena-backed DAG with eager cycle detection and the
//!   topological / parallelism-group views.
//! - [`task`] defines task actions and the context passed to them.

pub mod graph;
pub mod task;

pub use graph::TaskGraph;
pub use task::{CancelSignal, TaskContext, TaskFn, TaskFuture, action, blocking_action};
