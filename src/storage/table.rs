use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use parking_lot::{Mutex, RwLock};

use crate::{
    storage::{
        config::{MergePolicy, MergeTrigger, TableConfig},
        index::Index,
        merge::{self, MergeOutcome, MergeWorker},
        page_directory::{Location, PageDirectory},
        page_range::{PageRange, SlotLocation},
        persistence,
        snapshot::TableSnapshot,
    },
    types::{
        INDIRECTION_COLUMN, MAX_USER_COLUMNS, METADATA_COLUMNS, NULL_RID, RID_COLUMN,
        Rid, SCHEMA_ENCODING_COLUMN, TIMESTAMP_COLUMN,
        error::{DatabaseError, Result},
        record::Record,
    },
};

/// A page range plus the locks guarding it.
#[derive(Debug)]
pub(crate) struct RangeSlot {
    pub(crate) pages: RwLock<PageRange>,
    /// Held for the whole of a merge so two merges of one range never race.
    pub(crate) merging: Mutex<()>,
}

impl RangeSlot {
    pub(crate) fn new(range: PageRange) -> Self {
        Self {
            pages: RwLock::new(range),
            merging: Mutex::new(()),
        }
    }
}

/// Point-in-time counters for one page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeStats {
    pub range: usize,
    pub base_pages: usize,
    pub base_records: usize,
    pub tail_records: usize,
    pub total_tail_pages: usize,
}

/// Shared table state. The merge worker holds its own handle to it.
#[derive(Debug)]
pub(crate) struct TableInner {
    pub(crate) name: String,
    pub(crate) num_columns: usize,
    pub(crate) key: usize,
    pub(crate) config: TableConfig,
    pub(crate) rid_counter: AtomicU64,
    pub(crate) ranges: RwLock<Vec<Arc<RangeSlot>>>,
    pub(crate) directory: PageDirectory,
    pub(crate) index: Index,
    /// Shared by row mutations, exclusive for index builds and snapshots.
    pub(crate) catalog: RwLock<()>,
    /// Serializes key uniqueness checks with the writes that depend on them.
    pub(crate) key_lock: Mutex<()>,
}

pub struct Table {
    inner: Arc<TableInner>,
    merger: Option<MergeWorker>,
}

fn validate_schema(num_columns: usize, key: usize) -> Result<()> {
    if num_columns == 0 || num_columns > MAX_USER_COLUMNS {
        return Err(DatabaseError::InvalidSchema {
            reason: format!(
                "column count must be between 1 and {}, got {}",
                MAX_USER_COLUMNS, num_columns
            ),
        });
    }
    if key >= num_columns {
        return Err(DatabaseError::InvalidSchema {
            reason: format!("key column {} out of {} columns", key, num_columns),
        });
    }
    Ok(())
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Table {
    /// Create a table of `num_columns` integer columns keyed on `key`.
    pub fn new(name: &str, num_columns: usize, key: usize) -> Result<Self> {
        Self::with_config(name, num_columns, key, TableConfig::default())
    }

    pub fn with_config(
        name: &str,
        num_columns: usize,
        key: usize,
        config: TableConfig,
    ) -> Result<Self> {
        validate_schema(num_columns, key)?;
        config.validate()?;

        let inner = TableInner {
            name: name.to_string(),
            num_columns,
            key,
            config,
            rid_counter: AtomicU64::new(NULL_RID + 1),
            ranges: RwLock::new(Vec::new()),
            directory: PageDirectory::new(),
            index: Index::new(num_columns, key),
            catalog: RwLock::new(()),
            key_lock: Mutex::new(()),
        };
        Ok(Self::from_inner(inner))
    }

    pub(crate) fn from_inner(inner: TableInner) -> Self {
        let inner = Arc::new(inner);
        let merger = match inner.config.merge_policy {
            MergePolicy::Background => Some(MergeWorker::spawn(Arc::clone(&inner))),
            MergePolicy::Manual => None,
        };
        tracing::debug!(table = %inner.name, columns = inner.num_columns, "table ready");
        Self { inner, merger }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn num_columns(&self) -> usize {
        self.inner.num_columns
    }

    pub fn key(&self) -> usize {
        self.inner.key
    }

    pub fn config(&self) -> &TableConfig {
        &self.inner.config
    }

    pub fn index(&self) -> &Index {
        &self.inner.index
    }

    pub fn range_count(&self) -> usize {
        self.inner.ranges.read().len()
    }

    /// Number of live (not deleted) rows.
    pub fn len(&self) -> usize {
        self.inner.directory.live_base_rids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range_stats(&self) -> Vec<RangeStats> {
        let ranges = self.inner.ranges.read();
        ranges
            .iter()
            .map(|slot| {
                let pages = slot.pages.read();
                RangeStats {
                    range: pages.id(),
                    base_pages: pages.base_page_count(),
                    base_records: pages.base_record_count(),
                    tail_records: pages.tail_record_count(),
                    total_tail_pages: pages.total_tail_pages(),
                }
            })
            .collect()
    }

    pub fn insert(&self, values: &[i64]) -> Result<Rid> {
        self.inner.insert(values)
    }

    pub fn read(&self, rid: Rid, columns: &[usize]) -> Result<BTreeMap<usize, i64>> {
        self.inner.read(rid, columns)
    }

    pub fn read_record(&self, rid: Rid) -> Result<Record> {
        self.inner.read_record(rid)
    }

    /// Apply a sparse update; `None` leaves a column unchanged.
    pub fn update(&self, rid: Rid, updates: &[Option<i64>]) -> Result<()> {
        if let Some(range) = self.inner.update(rid, updates)? {
            if let Some(merger) = &self.merger {
                merger.request(range);
            }
        }
        Ok(())
    }

    pub fn delete(&self, rid: Rid) -> Result<()> {
        self.inner.delete(rid)
    }

    /// Rows whose `column` equals `value`, through the index when one exists.
    pub fn select(&self, column: usize, value: i64) -> Result<Vec<Record>> {
        self.select_range(column, value, value)
    }

    /// Rows whose `column` lies in `[begin, end]`, ordered by RID.
    pub fn select_range(&self, column: usize, begin: i64, end: i64) -> Result<Vec<Record>> {
        self.inner.check_column(column)?;
        let rids: Vec<Rid> = if self.inner.index.is_indexed(column) {
            self.inner
                .index
                .locate_range(column, begin, end)
                .into_iter()
                .collect()
        } else {
            self.inner.directory.live_base_rids()
        };

        let mut records = Vec::with_capacity(rids.len());
        for rid in rids {
            match self.inner.read_record(rid) {
                Ok(record) => {
                    let value = record.columns[column];
                    if value >= begin && value <= end {
                        records.push(record);
                    }
                }
                // deleted between lookup and read
                Err(DatabaseError::RecordNotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(records)
    }

    /// Sum of `column` over rows whose key lies in `[begin, end]`.
    pub fn sum(&self, begin: i64, end: i64, column: usize) -> Result<i64> {
        self.inner.check_column(column)?;
        let rids = self.inner.index.locate_range(self.inner.key, begin, end);
        let mut total: i64 = 0;
        for rid in rids {
            match self.inner.read(rid, &[column]) {
                Ok(values) => total = total.wrapping_add(values[&column]),
                Err(DatabaseError::RecordNotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(total)
    }

    /// Number of deltas on the row's version chain.
    pub fn version_depth(&self, rid: Rid) -> Result<usize> {
        self.inner.version_depth(rid)
    }

    /// Build a secondary index over `column` from the live rows.
    pub fn create_index(&self, column: usize) -> Result<()> {
        self.inner.create_index(column)
    }

    pub fn drop_index(&self, column: usize) -> Result<bool> {
        self.inner.check_column(column)?;
        let _catalog = self.inner.catalog.write();
        Ok(self.inner.index.drop_index(column))
    }

    pub fn merge_range(&self, range: usize) -> Result<MergeOutcome> {
        let cancel = AtomicBool::new(false);
        merge::merge_range(&self.inner, range, &cancel)
    }

    /// Merge with an externally owned cancellation flag.
    pub fn merge_range_cancellable(
        &self,
        range: usize,
        cancel: &AtomicBool,
    ) -> Result<MergeOutcome> {
        merge::merge_range(&self.inner, range, cancel)
    }

    pub fn merge_all(&self) -> Result<Vec<MergeOutcome>> {
        let cancel = AtomicBool::new(false);
        (0..self.range_count())
            .map(|range| merge::merge_range(&self.inner, range, &cancel))
            .collect()
    }

    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot::capture(&self.inner)
    }

    pub fn from_snapshot(snapshot: TableSnapshot) -> Result<Self> {
        let inner = snapshot.restore()?;
        Ok(Self::from_inner(inner))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persistence::save_snapshot(path, &self.snapshot())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_snapshot(persistence::load_snapshot(path)?)
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        if let Some(merger) = self.merger.take() {
            merger.shutdown();
        }
    }
}

impl TableInner {
    pub(crate) fn next_rid(&self) -> Rid {
        self.rid_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn check_column(&self, column: usize) -> Result<()> {
        if column >= self.num_columns {
            return Err(DatabaseError::ColumnIndexOutOfBounds { index: column });
        }
        Ok(())
    }

    fn check_arity(&self, actual: usize) -> Result<()> {
        if actual != self.num_columns {
            return Err(DatabaseError::ColumnCountMismatch {
                expected: self.num_columns,
                actual,
            });
        }
        Ok(())
    }

    pub(crate) fn range(&self, range: usize) -> Result<Arc<RangeSlot>> {
        self.ranges
            .read()
            .get(range)
            .cloned()
            .ok_or(DatabaseError::OutOfRange {
                slot: range,
                num_records: 0,
            })
    }

    /// The range new base records go to, starting a fresh one when the
    /// current range is out of base capacity.
    fn active_range(&self) -> Result<Arc<RangeSlot>> {
        let mut ranges = self.ranges.write();
        if let Some(last) = ranges.last() {
            if last.pages.read().can_accept_base_record() {
                return Ok(Arc::clone(last));
            }
        }

        let id = ranges.len();
        let range = PageRange::new(
            id,
            METADATA_COLUMNS + self.num_columns,
            self.config.max_base_pages,
        );
        let slot = Arc::new(RangeSlot::new(range));
        ranges.push(Arc::clone(&slot));
        tracing::debug!(table = %self.name, range = id, "started page range");
        Ok(slot)
    }

    fn insert(&self, values: &[i64]) -> Result<Rid> {
        self.check_arity(values.len())?;
        let _catalog = self.catalog.read();
        let _key = self.key_lock.lock();

        let key_value = values[self.key];
        if self.index.contains(self.key, key_value) {
            return Err(DatabaseError::DuplicateKey {
                column: self.key,
                value: key_value,
            });
        }

        let rid = self.next_rid();
        let mut record = Vec::with_capacity(METADATA_COLUMNS + values.len());
        record.extend_from_slice(&[NULL_RID as i64, rid as i64, 0, now_millis()]);
        record.extend_from_slice(values);

        let slot = self.active_range()?;
        {
            let mut pages = slot.pages.write();
            let at = pages.append_base(&record)?;
            self.directory.insert_base(rid, Location::new(pages.id(), at));
        }

        for column in self.index.indexed_columns() {
            self.index.add_to_index(column, values[column], rid);
        }
        tracing::trace!(table = %self.name, rid, "inserted record");
        Ok(rid)
    }

    /// Lock the range holding `rid` for reading and hand its location to `f`.
    fn with_base<R>(
        &self,
        rid: Rid,
        f: impl FnOnce(&PageRange, SlotLocation) -> Result<R>,
    ) -> Result<R> {
        let location = self.directory.base_location(rid)?;
        let slot = self.range(location.range)?;
        let pages = slot.pages.read();
        // merge may have moved the record before the lock was taken
        let location = self.directory.base_location(rid)?;
        f(&pages, location.in_range())
    }

    /// Latest visible value of each user column in `columns`.
    ///
    /// Walks the chain newest to oldest; each column takes its value from the
    /// newest delta whose schema bit is set, else from the base record.
    pub(crate) fn resolve(
        &self,
        pages: &PageRange,
        rid: Rid,
        base: SlotLocation,
        columns: &[usize],
    ) -> Result<Vec<i64>> {
        let mut values: Vec<Option<i64>> = vec![None; columns.len()];
        let mut missing = columns.len();
        let mut next = pages.read_base(INDIRECTION_COLUMN, base)? as Rid;

        while next != NULL_RID && next != rid && missing > 0 {
            let tail = self.directory.tail_location(next)?.in_range();
            let schema = pages.read_tail(SCHEMA_ENCODING_COLUMN, tail)? as u64;
            for (value, &column) in values.iter_mut().zip(columns) {
                if value.is_none() && (schema >> column) & 1 == 1 {
                    *value = Some(pages.read_tail(METADATA_COLUMNS + column, tail)?);
                    missing -= 1;
                }
            }
            next = pages.read_tail(INDIRECTION_COLUMN, tail)? as Rid;
        }

        values
            .into_iter()
            .zip(columns)
            .map(|(value, &column)| match value {
                Some(value) => Ok(value),
                None => pages.read_base(METADATA_COLUMNS + column, base),
            })
            .collect()
    }

    fn read(&self, rid: Rid, columns: &[usize]) -> Result<BTreeMap<usize, i64>> {
        for &column in columns {
            self.check_column(column)?;
        }
        let values = self.with_base(rid, |pages, base| self.resolve(pages, rid, base, columns))?;
        Ok(columns.iter().copied().zip(values).collect())
    }

    pub(crate) fn read_record(&self, rid: Rid) -> Result<Record> {
        let columns: Vec<usize> = (0..self.num_columns).collect();
        let values = self.with_base(rid, |pages, base| self.resolve(pages, rid, base, &columns))?;
        Ok(Record::new(rid, values[self.key], values))
    }

    fn version_depth(&self, rid: Rid) -> Result<usize> {
        self.with_base(rid, |pages, base| {
            let mut depth = 0;
            let mut next = pages.read_base(INDIRECTION_COLUMN, base)? as Rid;
            while next != NULL_RID && next != rid {
                depth += 1;
                let tail = self.directory.tail_location(next)?.in_range();
                next = pages.read_tail(INDIRECTION_COLUMN, tail)? as Rid;
            }
            Ok(depth)
        })
    }

    /// Append a delta for `rid`. Returns the range id when that range has
    /// crossed the merge threshold.
    fn update(&self, rid: Rid, updates: &[Option<i64>]) -> Result<Option<usize>> {
        self.check_arity(updates.len())?;
        let _catalog = self.catalog.read();
        let changes_key = updates[self.key].is_some();
        let _key = changes_key.then(|| self.key_lock.lock());

        let location = self.directory.base_location(rid)?;
        let slot = self.range(location.range)?;
        let mut pages = slot.pages.write();
        let base = self.directory.base_location(rid)?.in_range();

        let mut schema: u64 = 0;
        for (column, value) in updates.iter().enumerate() {
            if value.is_some() {
                schema |= 1 << column;
            }
        }
        if schema == 0 {
            return Ok(None);
        }

        // current values of the indexed columns this update touches
        let reindexed: Vec<usize> = self
            .index
            .indexed_columns()
            .into_iter()
            .filter(|column| updates[*column].is_some())
            .collect();
        let previous = self.resolve(&pages, rid, base, &reindexed)?;

        if let Some(new_key) = updates[self.key] {
            let holders = self.index.locate(self.key, new_key);
            if holders.iter().any(|holder| *holder != rid) {
                return Err(DatabaseError::DuplicateKey {
                    column: self.key,
                    value: new_key,
                });
            }
        }

        let newest = pages.read_base(INDIRECTION_COLUMN, base)? as Rid;
        let older = if newest == NULL_RID { rid } else { newest };
        let tail_rid = self.next_rid();

        let mut record = Vec::with_capacity(METADATA_COLUMNS + updates.len());
        record.extend_from_slice(&[older as i64, tail_rid as i64, schema as i64, now_millis()]);
        record.extend(updates.iter().map(|value| value.unwrap_or(0)));

        // delta fully written before the base pointer is published
        let at = pages.append_tail(&record)?;
        self.directory
            .insert_tail(tail_rid, Location::new(pages.id(), at));
        pages.set_base_indirection(base, tail_rid)?;

        for (column, old) in reindexed.into_iter().zip(previous) {
            if let Some(new) = updates[column] {
                if new != old {
                    self.index.remove_from_index(column, old, rid);
                    self.index.add_to_index(column, new, rid);
                }
            }
        }

        let due = self.merge_due(&pages);
        Ok(due.then(|| pages.id()))
    }

    pub(crate) fn merge_due(&self, pages: &PageRange) -> bool {
        let tail_pages = match self.config.merge_trigger {
            MergeTrigger::TotalTailPages => pages.total_tail_pages(),
            MergeTrigger::ColumnTailPages => (0..pages.num_columns())
                .map(|column| pages.tail_page_count(column))
                .max()
                .unwrap_or(0),
        };
        tail_pages > self.config.merge_threshold_pages
    }

    fn delete(&self, rid: Rid) -> Result<()> {
        let _catalog = self.catalog.read();

        let location = self.directory.base_location(rid)?;
        let slot = self.range(location.range)?;
        let mut pages = slot.pages.write();
        let base = self.directory.base_location(rid)?.in_range();

        let indexed = self.index.indexed_columns();
        let current = self.resolve(&pages, rid, base, &indexed)?;

        let mut chain = vec![rid];
        let mut next = pages.read_base(INDIRECTION_COLUMN, base)? as Rid;
        while next != NULL_RID && next != rid {
            chain.push(next);
            let tail = self.directory.tail_location(next)?.in_range();
            next = pages.read_tail(INDIRECTION_COLUMN, tail)? as Rid;
        }

        self.directory.tombstone(chain);
        pages.touch();

        for (column, value) in indexed.into_iter().zip(current) {
            self.index.remove_from_index(column, value, rid);
        }
        tracing::trace!(table = %self.name, rid, "deleted record");
        Ok(())
    }

    fn create_index(&self, column: usize) -> Result<()> {
        self.check_column(column)?;
        let _catalog = self.catalog.write();

        let mut entries = Vec::new();
        for rid in self.directory.live_base_rids() {
            let value = self.with_base(rid, |pages, base| {
                self.resolve(pages, rid, base, &[column])
            })?;
            entries.push((value[0], rid));
        }
        let count = entries.len();
        self.index.create_index(column, entries)?;
        tracing::debug!(table = %self.name, column, entries = count, "built index");
        Ok(())
    }

    pub(crate) fn base_rid_at(&self, pages: &PageRange, base: SlotLocation) -> Result<Rid> {
        Ok(pages.read_base(RID_COLUMN, base)? as Rid)
    }

    pub(crate) fn base_timestamp(&self, pages: &PageRange, base: SlotLocation) -> Result<i64> {
        pages.read_base(TIMESTAMP_COLUMN, base)
    }
}
