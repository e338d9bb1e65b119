//! taskgraph - task dependency graph and priority planner
//!
//! Tasks depend on other tasks. The graph engine keeps those dependencies
//! acyclic, answers traversal queries (dependency chains, critical paths,
//! readiness) and scores tasks so the next thing to work on is obvious.
//! Storage is local: tasks in JSONL, edges in SQLite.

pub mod domain;
pub mod storage;
pub mod cli;
pub mod logging;

pub use domain::{DependencyGraph, Priority, Task, TaskId, TaskStatus};
