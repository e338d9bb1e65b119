//! Graph query commands (chain, critical-path, can-start, ready, blocked, order)
//!
//! All of these read the dependency graph once and never write.

use std::collections::{HashMap, HashSet};

use anyhow::Result;

use super::output::Output;
use crate::domain::{blockers, Task, TaskId, TaskStatus};
use crate::storage::Project;

/// Tasks keyed by ID, plus their statuses
struct Snapshot {
    tasks: HashMap<TaskId, Task>,
    statuses: HashMap<TaskId, TaskStatus>,
}

impl Snapshot {
    fn load(project: &Project) -> Result<Self> {
        let tasks: HashMap<TaskId, Task> = project
            .task_store()
            .read_all()?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();
        let statuses = tasks.iter().map(|(id, t)| (id.clone(), t.status)).collect();
        Ok(Self { tasks, statuses })
    }

    fn title(&self, id: &TaskId) -> &str {
        self.tasks.get(id).map(|t| t.title.as_str()).unwrap_or("?")
    }

    fn status(&self, id: &TaskId) -> String {
        self.statuses
            .get(id)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".to_string())
    }
}

/// Show the dependency chain of a task
pub fn chain(output: &Output, task: &TaskId) -> Result<()> {
    let project = Project::open_current()?;
    let snapshot = Snapshot::load(&project)?;
    let entries = project.dependency_service()?.dependency_chain(task)?;

    if output.is_json() {
        output.data(&entries);
    } else {
        for entry in &entries {
            println!(
                "{}{} [{}] {}",
                "  ".repeat(entry.depth),
                entry.task,
                snapshot.status(&entry.task),
                snapshot.title(&entry.task)
            );
        }
    }

    Ok(())
}

/// Show the longest dependency path from a task
pub fn critical_path(output: &Output, task: &TaskId) -> Result<()> {
    let project = Project::open_current()?;
    let snapshot = Snapshot::load(&project)?;
    let path = project.dependency_service()?.critical_path(task)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": task,
            "length": path.len(),
            "path": path,
        }));
    } else {
        println!("Critical path ({} tasks):", path.len());
        for (i, id) in path.iter().enumerate() {
            println!("  {}. {} [{}] {}", i + 1, id, snapshot.status(id), snapshot.title(id));
        }
    }

    Ok(())
}

/// Report whether a task's dependencies are all completed
pub fn can_start(output: &Output, task: &TaskId) -> Result<()> {
    let project = Project::open_current()?;
    let snapshot = Snapshot::load(&project)?;
    let service = project.dependency_service()?;

    let waiting = service
        .graph()
        .read(|g| blockers(g, task, &snapshot.statuses));

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": task,
            "can_start": waiting.is_empty(),
            "blocked_by": waiting,
        }));
    } else if waiting.is_empty() {
        println!("{} can start", task);
    } else {
        println!("{} is waiting on:", task);
        for id in &waiting {
            println!("  {} [{}] {}", id, snapshot.status(id), snapshot.title(id));
        }
    }

    Ok(())
}

/// Show tasks ready to work on
pub fn ready(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let snapshot = Snapshot::load(&project)?;
    let ready = project
        .dependency_service()?
        .graph()
        .read(|g| g.ready_tasks(&snapshot.statuses));

    if output.is_json() {
        let items: Vec<_> = ready
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "title": snapshot.title(id),
                    "status": snapshot.statuses.get(id),
                })
            })
            .collect();
        output.data(&items);
    } else if ready.is_empty() {
        println!("No tasks ready to work on.");
    } else {
        println!("Ready tasks ({}):", ready.len());
        println!("{:<20} TITLE", "ID");
        println!("{}", "-".repeat(60));
        for id in &ready {
            println!("{:<20} {}", id, snapshot.title(id));
        }
    }

    Ok(())
}

/// Show blocked tasks with what blocks them
pub fn blocked(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let snapshot = Snapshot::load(&project)?;
    let blocked: Vec<(TaskId, Vec<TaskId>)> =
        project.dependency_service()?.graph().read(|g| {
            g.blocked_tasks(&snapshot.statuses)
                .into_iter()
                .map(|id| {
                    let waiting = blockers(g, &id, &snapshot.statuses);
                    (id, waiting)
                })
                .collect()
        });

    if output.is_json() {
        let items: Vec<_> = blocked
            .iter()
            .map(|(id, waiting)| {
                serde_json::json!({
                    "id": id,
                    "title": snapshot.title(id),
                    "blocked_by": waiting,
                })
            })
            .collect();
        output.data(&items);
    } else if blocked.is_empty() {
        println!("No blocked tasks.");
    } else {
        println!("Blocked tasks ({}):", blocked.len());
        println!("{:<20} {:<30} BLOCKED BY", "ID", "TITLE");
        println!("{}", "-".repeat(80));
        for (id, waiting) in &blocked {
            let waiting: Vec<&str> = waiting.iter().map(TaskId::as_str).collect();
            println!("{:<20} {:<30} {}", id, snapshot.title(id), waiting.join(", "));
        }
    }

    Ok(())
}

/// Show every task in dependency order
///
/// Tasks with no edges follow the ordered ones, in file order.
pub fn order(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let tasks = project.task_store().read_all()?;
    let mut ordered = project
        .dependency_service()?
        .graph()
        .read(|g| g.topological_order())?;

    let placed: HashSet<TaskId> = ordered.iter().cloned().collect();
    ordered.extend(
        tasks
            .iter()
            .filter(|t| !placed.contains(&t.id))
            .map(|t| t.id.clone()),
    );

    if output.is_json() {
        output.data(&ordered);
    } else {
        let titles: HashMap<&TaskId, &str> =
            tasks.iter().map(|t| (&t.id, t.title.as_str())).collect();
        for (i, id) in ordered.iter().enumerate() {
            println!("{:>3}. {:<20} {}", i + 1, id, titles.get(id).copied().unwrap_or("?"));
        }
    }

    Ok(())
}
