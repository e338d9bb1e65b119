//! Project management
//!
//! Handles project initialization and provides access to stores.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::info;

use super::{Config, EdgeDb, TaskStore};
use crate::domain::DependencyService;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a taskgraph project. Run 'taskgraph init' first.")]
    NotInProject,
}

const DEFAULT_CONFIG: &str = r#"# taskgraph project configuration

# Deepest dependency chain that chain/critical-path will walk
max_depth = 256

# Most entries 'taskgraph chain' will list; shared dependencies repeat per path
max_chain_entries = 100000

# Number of tasks shown by 'taskgraph recommend'
recommend_limit = 5

# Log filter when neither --log-level nor TASKGRAPH_LOG is set
# log_level = "info"
"#;

const GITIGNORE: &str = r#"# SQLite side files
graph.db-wal
graph.db-shm

# Store lock and temp files
*.lock
*.tmp
"#;

/// A taskgraph project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(".taskgraph").is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path
    ///
    /// Existing files are left alone, so running this twice is harmless.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let data_dir = root.join(".taskgraph");

        fs::create_dir_all(&data_dir).with_context(|| {
            format!("Failed to create .taskgraph directory: {}", data_dir.display())
        })?;

        let config_path = data_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = data_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, GITIGNORE).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        let project = Self::open(root)?;

        // Create the schema up front so the first command is not a migration
        project.edge_db()?;

        info!(root = %project.root.display(), "initialized project");
        Ok(project)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .taskgraph directory path
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(".taskgraph")
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the task store
    pub fn task_store(&self) -> TaskStore {
        TaskStore::for_project(&self.root)
    }

    /// Opens the edge store
    pub fn edge_db(&self) -> Result<EdgeDb> {
        EdgeDb::open(&self.root).with_context(|| {
            format!("Failed to open edge store in {}", self.data_dir().display())
        })
    }

    /// Loads the dependency graph behind a persistence-backed service
    pub fn dependency_service(&self) -> Result<DependencyService<EdgeDb>> {
        let project = &self.config.project;
        let service = DependencyService::open(self.edge_db()?, project.max_depth)
            .context("Failed to load dependency graph")?
            .with_max_chain_entries(project.max_chain_entries);
        Ok(service)
    }
}
