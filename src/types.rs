//! Core data model for the generation pipeline.
//!
//! A [`WorkItem`] is one segmented unit of input text awaiting processing.
//! A [`TaskResult`] is the output record of processing a WorkItem or one of
//! its variants. The two are linked by `parent_task_id`/`variant_no` so that
//! single and multi-variant outputs share one entity and one merge path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One segmented unit of input text awaiting processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    /// Dense 1-based position, assigned once at segmentation time and copied
    /// unchanged into every TaskResult derived from this item.
    pub index: u32,
    pub raw_text: String,
    /// Per-item write template override; falls back to the caller-level default.
    pub prompt_ref: Option<String>,
    /// Per-item guidance appended to the write prompt.
    pub guidance: Option<String>,
    /// Whether this item runs the retrieval-augmentation stage before writing.
    pub needs_search: bool,
}

impl WorkItem {
    pub fn new(index: u32, raw_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            raw_text: raw_text.into(),
            prompt_ref: None,
            guidance: None,
            needs_search: false,
        }
    }
}

/// Output record of processing a WorkItem (or one of its variants).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: Uuid,
    /// Set when this result belongs to a variant set.
    pub parent_task_id: Option<Uuid>,
    /// Copied unchanged from the originating WorkItem.
    pub index: u32,
    /// Unique within a parent's variant set; `None` for single-variant runs.
    pub variant_no: Option<u32>,
    /// The originating item's raw text, kept for refinement.
    pub raw_text: String,
    /// Sanitized output of the retrieval stage, when one ran.
    pub search_output: Option<String>,
    /// Sanitized output of the write stage.
    pub write_output: String,
    pub created_at: DateTime<Utc>,
}

impl TaskResult {
    /// Sort key: originating item index first, then variant number.
    pub fn ordering_key(&self) -> (u32, u32) {
        (self.index, self.variant_no.unwrap_or(0))
    }
}

/// Per-item pipeline state.
///
/// `Idle → (Searching) → Writing → Done`, with `Failed` reachable from
/// `Searching`/`Writing` and `Cancelled` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Idle,
    Searching,
    Writing,
    Done,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Done | TaskState::Failed | TaskState::Cancelled
        )
    }
}
