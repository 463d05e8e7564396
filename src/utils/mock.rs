use std::path::PathBuf;

use tempfile::TempDir;

use crate::{
    storage::{config::TableConfig, table::Table},
    types::{Rid, error::DatabaseError},
};

/// A snapshot path inside a private temp directory, removed on drop.
pub struct TempSnapshot {
    pub path: PathBuf,
    _dir: TempDir,
}

impl TempSnapshot {
    pub fn new() -> Result<Self, DatabaseError> {
        Self::with_prefix("kolom_test")
    }

    pub fn with_prefix(prefix: &str) -> Result<Self, DatabaseError> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        let path = dir.path().join(format!("{}.snapshot", prefix));
        Ok(Self { path, _dir: dir })
    }
}

/// Row `i` of a sample table: key `i`, then `i * 10 + column`.
pub fn sample_row(key: i64, num_columns: usize) -> Vec<i64> {
    let mut row = vec![key];
    row.extend((1..num_columns).map(|column| key * 10 + column as i64));
    row
}

/// A table keyed on column 0 holding keys `1..=rows`.
pub fn sample_table(
    num_columns: usize,
    rows: i64,
    config: TableConfig,
) -> Result<(Table, Vec<Rid>), DatabaseError> {
    let table = Table::with_config("sample", num_columns, 0, config)?;
    let mut rids = Vec::with_capacity(rows.max(0) as usize);
    for key in 1..=rows {
        rids.push(table.insert(&sample_row(key, num_columns))?);
    }
    Ok((table, rids))
}
