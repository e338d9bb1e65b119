//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project setup | `init` |
//! | Task | Task records | `task add`, `task list`, `task status` |
//! | Dependencies | Edges between tasks | `dep add`, `dep rm`, `dep list` |
//! | Graph | Read-only traversals | `chain`, `critical-path`, `can-start`, `ready`, `blocked`, `order` |
//! | Priority | Scoring and planning | `score`, `recommend`, `adjust` |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Diagnostics
//!
//! Logs go to stderr. Use `--verbose` for debug output or `--log-level`
//! (or `TASKGRAPH_LOG`) for finer control:
//! ```bash
//! taskgraph --verbose ready
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod task;
mod dep;
mod query;
mod priority;

pub use app::{run, Cli, Commands, LogLevel};
pub use output::{Output, OutputFormat};
