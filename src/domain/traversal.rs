//! Read-side traversals over the dependency graph
//!
//! Both traversals use an explicit stack and stop with
//! [`GraphError::TooDeep`] once a path grows past `max_depth` edges, so a
//! pathological graph can never exhaust the call stack. Chains list shared
//! dependencies once per path, so their size can grow exponentially with
//! depth; `max_entries` caps it with [`GraphError::ChainTooLarge`].

use serde::Serialize;
use std::collections::HashMap;

use super::graph::{DependencyGraph, GraphError};
use super::id::TaskId;

/// One step of a dependency chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainEntry {
    pub task: TaskId,
    pub depth: usize,
}

impl DependencyGraph {
    /// Preorder walk of everything `task` depends on
    ///
    /// `task` itself comes first at depth 0. A task reachable through two
    /// paths is listed once per path.
    pub fn dependency_chain(
        &self,
        task: &TaskId,
        max_depth: usize,
        max_entries: usize,
    ) -> Result<Vec<ChainEntry>, GraphError> {
        let mut chain = Vec::new();
        let mut stack: Vec<(&TaskId, usize)> = vec![(task, 0)];

        while let Some((current, depth)) = stack.pop() {
            if depth > max_depth {
                return Err(GraphError::TooDeep {
                    task: task.clone(),
                    limit: max_depth,
                });
            }

            if chain.len() == max_entries {
                return Err(GraphError::ChainTooLarge {
                    task: task.clone(),
                    limit: max_entries,
                });
            }

            chain.push(ChainEntry {
                task: current.clone(),
                depth,
            });

            for dep in self.dependency_slice(current).iter().rev() {
                stack.push((dep, depth + 1));
            }
        }

        Ok(chain)
    }

    /// Longest path (by node count) from `task` down to a task with no
    /// dependencies
    ///
    /// Ties go to the path a depth-first enumeration in edge insertion
    /// order would find first.
    pub fn critical_path(&self, task: &TaskId, max_depth: usize) -> Result<Vec<TaskId>, GraphError> {
        let too_deep = || GraphError::TooDeep {
            task: task.clone(),
            limit: max_depth,
        };

        // node -> (nodes on its longest path, next hop)
        let mut longest: HashMap<&TaskId, (usize, Option<&TaskId>)> = HashMap::new();
        let mut stack: Vec<(&TaskId, usize, bool)> = vec![(task, 0, false)];

        while let Some((node, depth, expanded)) = stack.pop() {
            if longest.contains_key(node) {
                continue;
            }
            if depth > max_depth {
                return Err(too_deep());
            }

            let deps = self.dependency_slice(node);
            if !expanded {
                stack.push((node, depth, true));
                for dep in deps.iter().rev() {
                    if !longest.contains_key(dep) {
                        stack.push((dep, depth + 1, false));
                    }
                }
                continue;
            }

            let mut best: (usize, Option<&TaskId>) = (1, None);
            for dep in deps {
                let len = longest.get(dep).map_or(1, |(len, _)| *len) + 1;
                if len > best.0 {
                    best = (len, Some(dep));
                }
            }
            longest.insert(node, best);
        }

        let mut path = vec![task.clone()];
        let mut cursor = longest.get(task).and_then(|(_, next)| *next);
        while let Some(next) = cursor {
            path.push(next.clone());
            cursor = longest.get(next).and_then(|(_, n)| *n);
        }

        // A deeper path may have been reached through a memoised node
        if path.len() > max_depth + 1 {
            return Err(too_deep());
        }

        Ok(path)
    }
}
