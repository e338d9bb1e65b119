//! Batch consumers of the priority scorer
//!
//! - [`recommend`] ranks a user's open tasks by score.
//! - [`auto_adjust`] rewrites priorities that disagree with the suggested
//!   priority and commits once at the end of the scan.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::graph::DependencyGraph;
use super::id::TaskId;
use super::ports::TaskAccessor;
use super::priority::{suggest_priority, PriorityScorer};
use super::task::{Priority, Task};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A scored task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub task: Task,
    pub score: u32,
    pub suggested: Priority,
}

/// Ranks open tasks by descending score, keeping input order on ties
pub fn recommend(
    tasks: impl IntoIterator<Item = Task>,
    graph: &DependencyGraph,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<Recommendation> {
    let scorer = PriorityScorer::new(graph, now);

    let mut scored: Vec<Recommendation> = tasks
        .into_iter()
        .filter(|t| !t.status.is_complete())
        .map(|task| {
            let score = scorer.score(&task);
            Recommendation {
                task,
                score,
                suggested: suggest_priority(score),
            }
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(limit);

    debug!(count = scored.len(), limit, "computed recommendations");
    scored
}

/// Recommendations for the open tasks assigned to `user`
pub fn recommend_for_user<A: TaskAccessor>(
    accessor: &A,
    user: &str,
    graph: &DependencyGraph,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<Recommendation>, A::Error> {
    Ok(recommend(accessor.assigned_to(user)?, graph, now, limit))
}

/// One priority rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityChange {
    pub task: TaskId,
    pub from: Priority,
    pub to: Priority,
}

/// Outcome of a completed adjustment run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdjustReport {
    /// Open tasks examined
    pub scanned: usize,
    /// Tasks whose priority changed
    pub adjusted: usize,
    pub changes: Vec<PriorityChange>,
}

#[derive(Debug, Error)]
pub enum AdjustError {
    #[error("Failed to load tasks: {0}")]
    Load(#[source] BoxError),

    /// A write failed mid-batch; earlier changes were kept
    #[error("Adjusted {adjusted} of {total} tasks before failing on {task}: {source}")]
    Partial {
        adjusted: usize,
        total: usize,
        task: TaskId,
        /// Whether the changes applied before the failure were committed
        committed: bool,
        changes: Vec<PriorityChange>,
        #[source]
        source: BoxError,
    },

    #[error("Failed to commit {adjusted} priority changes: {source}")]
    Commit {
        adjusted: usize,
        #[source]
        source: BoxError,
    },
}

/// Rewrites each open task's priority to its suggested priority
pub fn auto_adjust<A: TaskAccessor>(
    accessor: &mut A,
    graph: &DependencyGraph,
    now: DateTime<Utc>,
) -> Result<AdjustReport, AdjustError> {
    let scorer = PriorityScorer::new(graph, now);
    let open: Vec<Task> = accessor
        .tasks()
        .map_err(|e| AdjustError::Load(Box::new(e)))?
        .into_iter()
        .filter(|t| !t.status.is_complete())
        .collect();

    let total = open.len();
    let mut changes = Vec::new();

    for task in &open {
        let suggested = scorer.suggest(task);
        if suggested == task.priority {
            continue;
        }

        if let Err(e) = accessor.set_priority(&task.id, suggested) {
            let committed = match accessor.commit() {
                Ok(()) => true,
                Err(commit_err) => {
                    warn!(error = %commit_err, "could not commit partial adjustment");
                    false
                }
            };
            warn!(
                adjusted = changes.len(),
                total,
                task = %task.id,
                error = %e,
                "priority adjustment stopped"
            );
            return Err(AdjustError::Partial {
                adjusted: changes.len(),
                total,
                task: task.id.clone(),
                committed,
                changes,
                source: Box::new(e),
            });
        }

        debug!(task = %task.id, from = %task.priority, to = %suggested, "adjusted priority");
        changes.push(PriorityChange {
            task: task.id.clone(),
            from: task.priority,
            to: suggested,
        });
    }

    accessor.commit().map_err(|e| AdjustError::Commit {
        adjusted: changes.len(),
        source: Box::new(e),
    })?;

    info!(adjusted = changes.len(), total, "priority adjustment complete");
    Ok(AdjustReport {
        scanned: total,
        adjusted: changes.len(),
        changes,
    })
}
