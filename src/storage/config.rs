use serde::{Deserialize, Serialize};

use crate::types::error::DatabaseError;

pub const DEFAULT_MAX_BASE_PAGES: usize = 16;
pub const DEFAULT_MERGE_THRESHOLD_PAGES: usize = 50;

/// How tail growth is measured against `merge_threshold_pages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeTrigger {
    /// Tail pages summed over every physical column.
    TotalTailPages,
    /// Tail pages of the single largest column.
    ColumnTailPages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergePolicy {
    /// A worker thread merges ranges that cross the threshold.
    Background,
    /// Ranges are only merged through `Table::merge_range`/`merge_all`.
    Manual,
}

/// Per-table storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Base pages per column before a new range is started.
    pub max_base_pages: usize,
    pub merge_threshold_pages: usize,
    pub merge_trigger: MergeTrigger,
    pub merge_policy: MergePolicy,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_base_pages: DEFAULT_MAX_BASE_PAGES,
            merge_threshold_pages: DEFAULT_MERGE_THRESHOLD_PAGES,
            merge_trigger: MergeTrigger::ColumnTailPages,
            merge_policy: MergePolicy::Background,
        }
    }
}

impl TableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manual merging, otherwise defaults. Handy for deterministic tests.
    pub fn manual() -> Self {
        Self::default().with_merge_policy(MergePolicy::Manual)
    }

    pub fn with_max_base_pages(mut self, max_base_pages: usize) -> Self {
        self.max_base_pages = max_base_pages;
        self
    }

    pub fn with_merge_threshold_pages(mut self, pages: usize) -> Self {
        self.merge_threshold_pages = pages;
        self
    }

    pub fn with_merge_trigger(mut self, trigger: MergeTrigger) -> Self {
        self.merge_trigger = trigger;
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.max_base_pages == 0 {
            return Err(DatabaseError::InvalidConfig {
                reason: "max_base_pages must be at least 1".to_string(),
            });
        }
        if self.merge_threshold_pages == 0 {
            return Err(DatabaseError::InvalidConfig {
                reason: "merge_threshold_pages must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
