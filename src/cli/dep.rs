//! Dependency CLI commands

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{bail, Result};
use clap::Subcommand;

use super::output::Output;
use crate::domain::TaskId;
use crate::storage::Project;

#[derive(Subcommand)]
pub enum DepCommands {
    /// Make a task depend on another
    Add {
        /// Task that will be blocked
        task: TaskId,

        /// Task that must be completed first
        depends_on: TaskId,
    },

    /// Remove a dependency
    Rm {
        /// Task to unblock
        task: TaskId,

        /// Dependency to remove
        depends_on: TaskId,
    },

    /// List what a task depends on and what depends on it
    List {
        /// Task ID
        task: TaskId,
    },
}

pub fn run(cmd: DepCommands, output: &Output) -> Result<()> {
    match cmd {
        DepCommands::Add { task, depends_on } => add_dependency(output, &task, &depends_on),
        DepCommands::Rm { task, depends_on } => remove_dependency(output, &task, &depends_on),
        DepCommands::List { task } => list_dependencies(output, &task),
    }
}

fn add_dependency(output: &Output, task: &TaskId, depends_on: &TaskId) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.task_store();

    // Verify both tasks exist
    if store.get(task)?.is_none() {
        bail!("Task not found: {}", task);
    }
    if store.get(depends_on)?.is_none() {
        bail!("Dependency task not found: {}", depends_on);
    }

    let service = project.dependency_service()?;
    service.add_dependency(task, depends_on)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": task,
            "depends_on": depends_on,
        }));
    } else {
        output.success(&format!("{} now depends on {}", task, depends_on));
    }

    Ok(())
}

fn remove_dependency(output: &Output, task: &TaskId, depends_on: &TaskId) -> Result<()> {
    let project = Project::open_current()?;
    let statuses = project.task_store().statuses()?;

    let unblocked = Arc::new(Mutex::new(Vec::<TaskId>::new()));
    let sink = Arc::clone(&unblocked);
    let service = project
        .dependency_service()?
        .with_hook(move |startable: &TaskId| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(startable.clone())
        });

    let removed = service.remove_dependency(task, depends_on, &statuses)?;
    let unblocked = unblocked
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": task,
            "removed_dependency": depends_on,
            "removed": removed,
            "now_startable": unblocked,
        }));
        return Ok(());
    }

    if removed {
        output.success(&format!("{} no longer depends on {}", task, depends_on));
    } else {
        output.success(&format!("{} did not depend on {}", task, depends_on));
    }
    for id in &unblocked {
        println!("Now startable: {}", id);
    }

    Ok(())
}

fn list_dependencies(output: &Output, task: &TaskId) -> Result<()> {
    let project = Project::open_current()?;
    let statuses = project.task_store().statuses()?;
    let service = project.dependency_service()?;

    let depends_on = service.dependencies(task);
    let dependents = service.dependents(task);

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": task,
            "depends_on": depends_on,
            "dependents": dependents,
        }));
        return Ok(());
    }

    let status_of = |id: &TaskId| {
        statuses
            .get(id)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".to_string())
    };

    if depends_on.is_empty() {
        println!("{} has no dependencies", task);
    } else {
        println!("{} depends on:", task);
        for dep in &depends_on {
            println!("  {} ({})", dep, status_of(dep));
        }
    }

    if !dependents.is_empty() {
        println!("Blocks:");
        for dependent in &dependents {
            println!("  {} ({})", dependent, status_of(dependent));
        }
    }

    Ok(())
}
