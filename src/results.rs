//! Results Collection
//!
//! The only shared mutable state in the pipeline. Concurrent writers merge by
//! result id (remove-then-insert) so that out-of-order variant completions
//! never duplicate or lose entries; presentation order is always originating
//! item index first, variant number second.

use crate::types::TaskResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Merge-by-id collection of task results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    entries: Vec<TaskResult>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by id. A variant update replaces the existing entry,
    /// never appends a duplicate.
    pub fn merge(&mut self, result: TaskResult) {
        self.entries.retain(|entry| entry.id != result.id);
        self.entries.push(result);
    }

    pub fn get(&self, id: Uuid) -> Option<&TaskResult> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<TaskResult> {
        let position = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(position))
    }

    /// Remove every result derived from one parent task, the parent included.
    pub fn remove_family(&mut self, task_id: Uuid) {
        self.entries
            .retain(|entry| entry.id != task_id && entry.parent_task_id != Some(task_id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Results sorted by (item index, variant number).
    pub fn sorted(&self) -> Vec<TaskResult> {
        let mut sorted = self.entries.clone();
        sorted.sort_by_key(|entry| entry.ordering_key());
        sorted
    }

    pub fn replace_all(&mut self, results: Vec<TaskResult>) {
        self.entries = results;
    }
}
