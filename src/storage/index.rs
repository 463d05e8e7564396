use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{Rid, error::DatabaseError};

type ColumnIndex = BTreeMap<i64, BTreeSet<Rid>>;

/// Serializable image of one column's index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexImage {
    pub column: usize,
    pub entries: Vec<(i64, Vec<Rid>)>,
}

/// Ordered value -> RID-set maps, one optional map per user column.
///
/// The key column is always indexed. Other columns are indexed only after
/// `create_index`; lookups on them return nothing until then.
#[derive(Debug)]
pub struct Index {
    key: usize,
    indices: RwLock<Vec<Option<ColumnIndex>>>,
}

impl Index {
    pub fn new(num_columns: usize, key: usize) -> Self {
        let mut indices = vec![None; num_columns];
        indices[key] = Some(BTreeMap::new());
        Self {
            key,
            indices: RwLock::new(indices),
        }
    }

    pub fn key_column(&self) -> usize {
        self.key
    }

    pub fn is_indexed(&self, column: usize) -> bool {
        self.indices
            .read()
            .get(column)
            .is_some_and(Option::is_some)
    }

    pub fn indexed_columns(&self) -> Vec<usize> {
        self.indices
            .read()
            .iter()
            .enumerate()
            .filter(|(_, index)| index.is_some())
            .map(|(column, _)| column)
            .collect()
    }

    /// RIDs of all records whose `column` equals `value`.
    pub fn locate(&self, column: usize, value: i64) -> BTreeSet<Rid> {
        let indices = self.indices.read();
        match indices.get(column) {
            Some(Some(index)) => index.get(&value).cloned().unwrap_or_default(),
            _ => BTreeSet::new(),
        }
    }

    /// RIDs of all records whose `column` lies in `[begin, end]`.
    pub fn locate_range(&self, column: usize, begin: i64, end: i64) -> BTreeSet<Rid> {
        if begin > end {
            return BTreeSet::new();
        }
        let indices = self.indices.read();
        match indices.get(column) {
            Some(Some(index)) => index
                .range(begin..=end)
                .flat_map(|(_, rids)| rids.iter().copied())
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    pub fn contains(&self, column: usize, value: i64) -> bool {
        let indices = self.indices.read();
        match indices.get(column) {
            Some(Some(index)) => index.get(&value).is_some_and(|rids| !rids.is_empty()),
            _ => false,
        }
    }

    /// Add `rid` under `value`. Unindexed columns are ignored.
    pub fn add_to_index(&self, column: usize, value: i64, rid: Rid) {
        let mut indices = self.indices.write();
        if let Some(Some(index)) = indices.get_mut(column) {
            index.entry(value).or_default().insert(rid);
        }
    }

    pub fn remove_from_index(&self, column: usize, value: i64, rid: Rid) {
        let mut indices = self.indices.write();
        if let Some(Some(index)) = indices.get_mut(column) {
            if let Some(rids) = index.get_mut(&value) {
                rids.remove(&rid);
                if rids.is_empty() {
                    index.remove(&value);
                }
            }
        }
    }

    /// Build (or rebuild) the index for `column` from `(value, rid)` pairs.
    pub fn create_index<I>(&self, column: usize, entries: I) -> Result<(), DatabaseError>
    where
        I: IntoIterator<Item = (i64, Rid)>,
    {
        let mut index = ColumnIndex::new();
        for (value, rid) in entries {
            index.entry(value).or_default().insert(rid);
        }

        let mut indices = self.indices.write();
        let slot = indices
            .get_mut(column)
            .ok_or(DatabaseError::ColumnIndexOutOfBounds { index: column })?;
        *slot = Some(index);
        Ok(())
    }

    /// Tear down a secondary index. The key column index stays; returns
    /// whether an index was removed.
    pub fn drop_index(&self, column: usize) -> bool {
        if column == self.key {
            return false;
        }
        let mut indices = self.indices.write();
        match indices.get_mut(column) {
            Some(slot) => slot.take().is_some(),
            None => false,
        }
    }

    pub fn to_images(&self) -> Vec<IndexImage> {
        self.indices
            .read()
            .iter()
            .enumerate()
            .filter_map(|(column, index)| {
                index.as_ref().map(|index| IndexImage {
                    column,
                    entries: index
                        .iter()
                        .map(|(value, rids)| (*value, rids.iter().copied().collect()))
                        .collect(),
                })
            })
            .collect()
    }

    pub fn from_images(
        num_columns: usize,
        key: usize,
        images: Vec<IndexImage>,
    ) -> Result<Self, DatabaseError> {
        let index = Self::new(num_columns, key);
        for image in images {
            if image.column >= num_columns {
                return Err(DatabaseError::CorruptedSnapshot {
                    reason: format!("index on unknown column {}", image.column),
                });
            }
            let entries = image
                .entries
                .into_iter()
                .flat_map(|(value, rids)| rids.into_iter().map(move |rid| (value, rid)));
            index.create_index(image.column, entries)?;
        }
        Ok(index)
    }
}
