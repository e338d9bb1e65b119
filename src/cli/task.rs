//! Task CLI commands

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;

use super::output::Output;
use crate::domain::{blockers, Priority, PriorityScorer, Task, TaskId, TaskStatus};
use crate::storage::Project;

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task
    ///
    /// Examples:
    ///   taskgraph task add "Fix login" --priority high
    ///   taskgraph task add "Ship v2" --deadline 2025-07-01 --assignee alice
    Add {
        /// Task title
        title: String,

        /// Priority (low, medium, high, urgent)
        #[arg(long, short, default_value = "medium")]
        priority: Priority,

        /// Deadline as RFC 3339 or YYYY-MM-DD (end of that day, UTC)
        #[arg(long, short)]
        deadline: Option<String>,

        /// User the task is assigned to
        #[arg(long, short)]
        assignee: Option<String>,

        /// Explicit task ID (generated from the title when omitted)
        #[arg(long)]
        id: Option<TaskId>,
    },

    /// List tasks
    List {
        /// Only tasks with this status
        #[arg(long, short)]
        status: Option<TaskStatus>,

        /// Only tasks assigned to this user
        #[arg(long, short)]
        assignee: Option<String>,
    },

    /// Show task details
    Show {
        /// Task ID
        id: TaskId,
    },

    /// Change a task's status
    Status {
        /// Task ID
        id: TaskId,

        /// New status (pending, in_progress, completed, cancelled)
        status: TaskStatus,
    },

    /// Delete a task and its dependencies
    Rm {
        /// Task ID
        id: TaskId,
    },
}

pub fn run(cmd: TaskCommands, output: &Output) -> Result<()> {
    match cmd {
        TaskCommands::Add {
            title,
            priority,
            deadline,
            assignee,
            id,
        } => add_task(output, &title, priority, deadline.as_deref(), assignee, id),
        TaskCommands::List { status, assignee } => list_tasks(output, status, assignee.as_deref()),
        TaskCommands::Show { id } => show_task(output, &id),
        TaskCommands::Status { id, status } => set_status(output, &id, status),
        TaskCommands::Rm { id } => remove_task(output, &id),
    }
}

/// Parses a deadline given as RFC 3339 or a bare date
pub(crate) fn parse_deadline(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid deadline '{}': expected YYYY-MM-DD or RFC 3339", s))?;
    let end_of_day = date
        .and_hms_opt(23, 59, 59)
        .with_context(|| format!("Invalid deadline '{}'", s))?;
    Ok(end_of_day.and_utc())
}

fn add_task(
    output: &Output,
    title: &str,
    priority: Priority,
    deadline: Option<&str>,
    assignee: Option<String>,
    id: Option<TaskId>,
) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.task_store();

    let task_id = id.unwrap_or_else(|| TaskId::generate(title, Utc::now()));
    if store.get(&task_id)?.is_some() {
        bail!("Task already exists: {}", task_id);
    }

    let mut task = Task::new(task_id, title).with_priority(priority);
    if let Some(deadline) = deadline {
        task = task.with_deadline(parse_deadline(deadline)?);
    }
    if let Some(assignee) = assignee {
        task = task.with_assignee(assignee);
    }

    store.append(&task)?;

    if output.is_json() {
        output.data(&task);
    } else {
        output.success(&format!("Created task: {} - {}", task.id, task.title));
    }

    Ok(())
}

fn list_tasks(output: &Output, status: Option<TaskStatus>, assignee: Option<&str>) -> Result<()> {
    let project = Project::open_current()?;
    let tasks: Vec<Task> = project
        .task_store()
        .read_all()?
        .into_iter()
        .filter(|t| status.map_or(true, |s| t.status == s))
        .filter(|t| assignee.map_or(true, |a| t.assignee.as_deref() == Some(a)))
        .collect();

    if output.is_json() {
        output.data(&tasks);
    } else if tasks.is_empty() {
        println!("No tasks");
    } else {
        println!(
            "{:<20} {:<12} {:<8} {:<11} {:<10} TITLE",
            "ID", "STATUS", "PRIORITY", "DEADLINE", "ASSIGNEE"
        );
        println!("{}", "-".repeat(80));

        for task in &tasks {
            let deadline = task
                .deadline
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<20} {:<12} {:<8} {:<11} {:<10} {}",
                task.id,
                task.status,
                task.priority,
                deadline,
                task.assignee.as_deref().unwrap_or("-"),
                task.title
            );
        }
    }

    Ok(())
}

fn show_task(output: &Output, id: &TaskId) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.task_store();

    let tasks = store.read_all()?;
    let task = tasks
        .iter()
        .find(|t| &t.id == id)
        .ok_or_else(|| anyhow::anyhow!("Task not found: {}", id))?;
    let statuses: HashMap<TaskId, TaskStatus> =
        tasks.iter().map(|t| (t.id.clone(), t.status)).collect();

    let service = project.dependency_service()?;
    let (depends_on, dependents, blocked_by, score) = service.graph().read(|g| {
        (
            g.dependencies(id),
            g.dependents(id),
            blockers(g, id, &statuses),
            PriorityScorer::new(g, Utc::now()).score(task),
        )
    });

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": task,
            "depends_on": depends_on,
            "dependents": dependents,
            "blocked_by": blocked_by,
            "can_start": blocked_by.is_empty(),
            "score": score,
        }));
        return Ok(());
    }

    println!("Task: {}", task.id);
    println!("Title: {}", task.title);
    println!("Status: {}", task.status);
    println!("Priority: {} (score {})", task.priority, score);
    if let Some(deadline) = task.deadline {
        println!("Deadline: {}", deadline.format("%Y-%m-%d %H:%M"));
    }
    if let Some(assignee) = &task.assignee {
        println!("Assignee: {}", assignee);
    }
    println!("Created: {}", task.created_at.format("%Y-%m-%d %H:%M"));
    println!("Updated: {}", task.updated_at.format("%Y-%m-%d %H:%M"));

    if !depends_on.is_empty() {
        println!("\nDepends on:");
        for dep in &depends_on {
            let dep_status = statuses
                .get(dep)
                .map(|s| s.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!("  {} ({})", dep, dep_status);
        }
    }

    if !dependents.is_empty() {
        println!("\nBlocks:");
        for dependent in &dependents {
            println!("  {}", dependent);
        }
    }

    println!();
    if blocked_by.is_empty() {
        println!("Can start: yes");
    } else {
        println!("Can start: no (waiting on {} dependencies)", blocked_by.len());
    }

    Ok(())
}

fn set_status(output: &Output, id: &TaskId, status: TaskStatus) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.task_store();

    let mut task = store
        .get(id)?
        .ok_or_else(|| anyhow::anyhow!("Task not found: {}", id))?;
    let previous = task.set_status(status);
    store.update(&task)?;

    if !output.is_json() {
        output.success(&format!("{}: {} -> {}", task.id, previous, status));
    }

    let json = output.is_json();
    let service = project
        .dependency_service()?
        .with_hook(move |startable: &TaskId| {
            if !json {
                println!("Now startable: {}", startable);
            }
        });
    let startable = service.status_changed(id, previous, &store.statuses()?);

    if json {
        output.data(&serde_json::json!({
            "id": task.id,
            "previous": previous,
            "status": status,
            "now_startable": startable,
        }));
    }

    Ok(())
}

fn remove_task(output: &Output, id: &TaskId) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.task_store();

    if store.get(id)?.is_none() {
        bail!("Task not found: {}", id);
    }

    // Edges first: the task record goes only once nothing refers to it
    let edges = project
        .dependency_service()
        .and_then(|service| Ok(service.remove_task(id)?))
        .with_context(|| format!("Failed to drop dependencies of {}; task kept", id))?;
    store.remove(id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": id,
            "removed_dependencies": edges,
        }));
    } else {
        output.success(&format!("Removed task {} ({} dependencies)", id, edges));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn deadline_accepts_bare_date() {
        let d = parse_deadline("2025-07-01").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2025, 7, 1));
        assert_eq!((d.hour(), d.minute()), (23, 59));
    }

    #[test]
    fn deadline_accepts_rfc3339() {
        let d = parse_deadline("2025-07-01T08:30:00+02:00").unwrap();
        assert_eq!(d.hour(), 6);
    }

    #[test]
    fn deadline_rejects_garbage() {
        assert!(parse_deadline("next tuesday").is_err());
    }
}
