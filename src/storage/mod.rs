//! # Storage Layer
//!
//! Persistence for taskgraph projects.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Tasks | JSONL (one JSON per line) | `.taskgraph/tasks.jsonl` |
//! | Dependency edges | SQLite | `.taskgraph/graph.db` |
//! | Config | TOML | `.taskgraph/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`TaskStore`] uses file locking (`fs2`); rewrites are atomic (temp
//!   file + rename)
//! - [`EdgeDb`] runs in WAL mode and re-validates acyclicity inside an
//!   IMMEDIATE transaction before every insert
//!
//! ## Project Structure
//!
//! ```text
//! .taskgraph/
//! ├── tasks.jsonl     # All tasks, creation order
//! ├── graph.db        # Dependency edges
//! ├── config.toml     # Project configuration
//! └── .gitignore      # Ignores SQLite side files and locks
//! ```

mod jsonl;
mod edges;
mod config;
mod project;

pub use jsonl::{TaskStore, TaskStoreError};
pub use edges::{EdgeDb, EdgeDbError};
pub use config::{Config, ConfigError, GlobalConfig, OutputFormat, ProjectConfig};
pub use project::{Project, ProjectError};
