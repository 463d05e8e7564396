//! Background compaction of tail records into a fresh base generation.
//!
//! A merge runs in three phases:
//!
//! 1. Under the range's shared lock, clone the range and note its version
//!    and the live base records it holds.
//! 2. Without any range lock, fold every live record's newest values into
//!    new base pages. The cancellation flag is checked per record.
//! 3. Under the range's exclusive lock, install the new pages and rewrite
//!    the directory, but only if the range version is unchanged. Otherwise
//!    the work is thrown away.
//!
//! Nothing is visible to readers until phase 3 commits, so an abandoned
//! merge leaves the range exactly as it was.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
};

use crossbeam_channel::{Sender, unbounded};
use parking_lot::Mutex;

use crate::{
    storage::{
        page_directory::Location,
        page_range::PageRange,
        table::TableInner,
    },
    types::{
        METADATA_COLUMNS, NULL_RID,
        error::{DatabaseError, Result},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The range was compacted.
    Merged {
        range: usize,
        records: usize,
        reclaimed: usize,
    },
    /// Nothing to fold: no tail records and no deleted rows.
    Skipped { range: usize },
    /// The range changed while the merge was running; nothing was applied.
    Conflict { range: usize },
    /// Cancelled before commit; nothing was applied.
    Cancelled { range: usize },
}

impl MergeOutcome {
    pub fn is_merged(&self) -> bool {
        matches!(self, MergeOutcome::Merged { .. })
    }
}

pub(crate) fn merge_range(
    table: &TableInner,
    range: usize,
    cancel: &AtomicBool,
) -> Result<MergeOutcome> {
    let slot = table.range(range)?;
    let _merging = slot.merging.lock();

    let (snapshot, version, live) = {
        let pages = slot.pages.read();
        let live = table.directory.live_base_in_range(range);
        if pages.tail_record_count() == 0 && live.len() == pages.base_record_count() {
            return Ok(MergeOutcome::Skipped { range });
        }
        (pages.clone(), pages.version(), live)
    };

    let columns: Vec<usize> = (0..table.num_columns).collect();
    let mut fresh = PageRange::new(
        range,
        snapshot.num_columns(),
        snapshot.max_base_pages(),
    );
    let mut moves = Vec::with_capacity(live.len());
    for (rid, location) in &live {
        if cancel.load(Ordering::Acquire) {
            tracing::debug!(table = %table.name, range, "merge cancelled");
            return Ok(MergeOutcome::Cancelled { range });
        }

        let base = location.in_range();
        let stored = table.base_rid_at(&snapshot, base)?;
        if stored != *rid {
            return Err(DatabaseError::CorruptedPage {
                reason: format!(
                    "directory maps rid {} to a slot holding rid {}",
                    rid, stored
                ),
            });
        }

        let values = table.resolve(&snapshot, *rid, base, &columns)?;
        let mut record = Vec::with_capacity(METADATA_COLUMNS + values.len());
        record.extend_from_slice(&[
            NULL_RID as i64,
            *rid as i64,
            0,
            table.base_timestamp(&snapshot, base)?,
        ]);
        record.extend(values);

        let at = fresh.append_base(&record)?;
        moves.push((*rid, Location::new(range, at)));
    }
    drop(snapshot);

    let mut pages = slot.pages.write();
    if cancel.load(Ordering::Acquire) {
        return Ok(MergeOutcome::Cancelled { range });
    }
    if pages.version() != version {
        tracing::warn!(table = %table.name, range, "range changed during merge, discarding");
        return Ok(MergeOutcome::Conflict { range });
    }

    let reclaimed = table.directory.commit_merge(range, &moves);
    pages.install_generation(fresh.into_base_pages());
    tracing::info!(
        table = %table.name,
        range,
        records = moves.len(),
        reclaimed,
        "merged page range"
    );

    Ok(MergeOutcome::Merged {
        range,
        records: moves.len(),
        reclaimed,
    })
}

/// One worker thread per table, fed with range ids that crossed the merge
/// threshold.
#[derive(Debug)]
pub(crate) struct MergeWorker {
    sender: Option<Sender<usize>>,
    pending: Arc<Mutex<HashSet<usize>>>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MergeWorker {
    pub(crate) fn spawn(table: Arc<TableInner>) -> Self {
        let (sender, receiver) = unbounded::<usize>();
        let pending = Arc::new(Mutex::new(HashSet::new()));
        let cancel = Arc::new(AtomicBool::new(false));

        let worker_pending = Arc::clone(&pending);
        let worker_cancel = Arc::clone(&cancel);
        let name = format!("kolom-merge-{}", table.name);
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || {
                for range in receiver.iter() {
                    if worker_cancel.load(Ordering::Acquire) {
                        break;
                    }
                    worker_pending.lock().remove(&range);
                    match merge_range(&table, range, &worker_cancel) {
                        Ok(outcome) => {
                            tracing::debug!(table = %table.name, ?outcome, "background merge finished")
                        }
                        Err(err) => {
                            tracing::error!(table = %table.name, range, %err, "background merge failed")
                        }
                    }
                }
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!(%err, "could not start merge worker, merging stays manual");
                None
            }
        };

        Self {
            sender: handle.as_ref().map(|_| sender),
            pending,
            cancel,
            handle,
        }
    }

    /// Queue `range` unless it is already waiting.
    pub(crate) fn request(&self, range: usize) {
        let Some(sender) = &self.sender else {
            return;
        };
        let queued = self.pending.lock().insert(range);
        if queued && sender.send(range).is_err() {
            self.pending.lock().remove(&range);
        }
    }

    /// Cancel any running merge and wait for the worker to exit.
    pub(crate) fn shutdown(mut self) {
        self.cancel.store(true, Ordering::Release);
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("merge worker panicked");
            }
        }
    }
}
