//! Priority scoring
//!
//! The score is additive and capped at [`MAX_SCORE`]:
//!
//! | Factor | Rule | Points |
//! |--------|------|--------|
//! | Base priority | urgent / high / medium / low | 100 / 75 / 50 / 25 |
//! | Deadline urgency | whole days left: 0-1 / <=3 / <=7 | +50 / +30 / +15 |
//! | Overdue | deadline before now | +75 |
//! | Status | in_progress / pending | +20 / +10 |
//! | Dependents | per direct dependent | +10 |
//!
//! Days left are truncated toward zero, so a deadline that passed less than
//! a day ago scores both the 0-1 day bucket and the overdue bonus.
//!
//! Thresholds for suggestions: >=150 urgent, >=100 high, >=50 medium.

use chrono::{DateTime, Utc};

use super::graph::DependencyGraph;
use super::task::{Priority, Task, TaskStatus};

pub const MAX_SCORE: u32 = 200;

const OVERDUE_BONUS: u32 = 75;
const PER_DEPENDENT: u32 = 10;

fn base_points(priority: Priority) -> u32 {
    match priority {
        Priority::Urgent => 100,
        Priority::High => 75,
        Priority::Medium => 50,
        Priority::Low => 25,
    }
}

fn deadline_points(days_left: i64) -> u32 {
    match days_left {
        0..=1 => 50,
        2..=3 => 30,
        4..=7 => 15,
        _ => 0,
    }
}

fn status_points(status: TaskStatus) -> u32 {
    match status {
        TaskStatus::InProgress => 20,
        TaskStatus::Pending => 10,
        TaskStatus::Completed | TaskStatus::Cancelled => 0,
    }
}

/// Computes the score of a task with `dependents` direct dependents at `now`
pub fn priority_score(task: &Task, dependents: usize, now: DateTime<Utc>) -> u32 {
    let mut score = base_points(task.priority);

    if let Some(deadline) = task.deadline {
        score += deadline_points((deadline - now).num_days());
        if deadline < now {
            score += OVERDUE_BONUS;
        }
    }

    score += status_points(task.status);

    let dependents = u32::try_from(dependents).unwrap_or(u32::MAX);
    score
        .saturating_add(dependents.saturating_mul(PER_DEPENDENT))
        .min(MAX_SCORE)
}

/// Maps a score to the priority it warrants
pub fn suggest_priority(score: u32) -> Priority {
    if score >= 150 {
        Priority::Urgent
    } else if score >= 100 {
        Priority::High
    } else if score >= 50 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Scores tasks against one graph snapshot and a fixed clock
#[derive(Debug, Clone, Copy)]
pub struct PriorityScorer<'a> {
    graph: &'a DependencyGraph,
    now: DateTime<Utc>,
}

impl<'a> PriorityScorer<'a> {
    pub fn new(graph: &'a DependencyGraph, now: DateTime<Utc>) -> Self {
        Self { graph, now }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn score(&self, task: &Task) -> u32 {
        priority_score(task, self.graph.dependent_count(&task.id), self.now)
    }

    pub fn suggest(&self, task: &Task) -> Priority {
        suggest_priority(self.score(task))
    }
}
