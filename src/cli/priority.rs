//! Priority commands (score, recommend, adjust)

use anyhow::{anyhow, Result};
use chrono::Utc;

use super::output::Output;
use crate::domain::{
    auto_adjust, recommend_for_user, AdjustError, PriorityChange, PriorityScorer, TaskId,
};
use crate::storage::Project;

/// Show the score of one task
pub fn score(output: &Output, id: &TaskId) -> Result<()> {
    let project = Project::open_current()?;
    let task = project
        .task_store()
        .get(id)?
        .ok_or_else(|| anyhow!("Task not found: {}", id))?;

    let service = project.dependency_service()?;
    let (score, suggested, dependents) = service.graph().read(|g| {
        let scorer = PriorityScorer::new(g, Utc::now());
        (scorer.score(&task), scorer.suggest(&task), g.dependent_count(id))
    });

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": task.id,
            "score": score,
            "priority": task.priority,
            "suggested": suggested,
            "dependents": dependents,
        }));
    } else {
        println!("{} - {}", task.id, task.title);
        println!("Score: {}", score);
        println!("Priority: {} (suggested: {})", task.priority, suggested);
        println!("Dependents: {}", dependents);
    }

    Ok(())
}

/// Recommend the highest-scoring open tasks for a user
pub fn recommend(output: &Output, user: Option<&str>, limit: Option<usize>) -> Result<()> {
    let project = Project::open_current()?;
    let config = project.config();

    let user = match user {
        Some(user) => user.to_string(),
        None => config.effective_user().ok_or_else(|| {
            anyhow!("No user given. Pass --user, set `user` in the global config, or set TASKGRAPH_USER.")
        })?,
    };
    let limit = limit.unwrap_or(config.project.recommend_limit);

    let graph = project.dependency_service()?.graph().snapshot();
    let recs = recommend_for_user(&project.task_store(), &user, &graph, Utc::now(), limit)?;

    if output.is_json() {
        output.data(&recs);
    } else if recs.is_empty() {
        println!("No open tasks for {}.", user);
    } else {
        println!("Recommended for {} ({}):", user, recs.len());
        println!("{:<20} {:>5} {:<9} TITLE", "ID", "SCORE", "SUGGESTED");
        println!("{}", "-".repeat(70));
        for rec in &recs {
            println!(
                "{:<20} {:>5} {:<9} {}",
                rec.task.id, rec.score, rec.suggested, rec.task.title
            );
        }
    }

    Ok(())
}

/// Rewrite priorities to their suggested values
pub fn adjust(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let graph = project.dependency_service()?.graph().snapshot();
    let mut store = project.task_store();

    match auto_adjust(&mut store, &graph, Utc::now()) {
        Ok(report) => {
            if output.is_json() {
                output.data(&report);
            } else {
                print_changes(&report.changes);
                output.success(&format!(
                    "Adjusted {} of {} open tasks",
                    report.adjusted, report.scanned
                ));
            }
            Ok(())
        }
        Err(e) => {
            if let AdjustError::Partial {
                committed: true,
                changes,
                ..
            } = &e
            {
                if !output.is_json() {
                    print_changes(changes);
                }
            }
            Err(e.into())
        }
    }
}

fn print_changes(changes: &[PriorityChange]) {
    for change in changes {
        println!("  {}: {} -> {}", change.task, change.from, change.to);
    }
}
