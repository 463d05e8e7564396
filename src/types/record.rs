use serde::{Deserialize, Serialize};

use crate::types::Rid;

/// A logical row as seen by callers: the latest visible value of every user
/// column, addressed by the base RID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub rid: Rid,
    pub key: i64,
    pub columns: Vec<i64>,
}

impl Record {
    pub fn new(rid: Rid, key: i64, columns: Vec<i64>) -> Self {
        Self { rid, key, columns }
    }

    pub fn get(&self, column: usize) -> Option<i64> {
        self.columns.get(column).copied()
    }
}
