use std::sync::{Arc, atomic::AtomicU64, atomic::Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::{
    storage::{
        config::TableConfig,
        index::{Index, IndexImage},
        page_directory::{DirectoryState, PageDirectory},
        page_range::PageRange,
        table::{RangeSlot, TableInner},
    },
    types::{MAX_USER_COLUMNS, METADATA_COLUMNS, Rid, error::DatabaseError, page::Page},
};

/// Raw page bytes plus the record count that gives them meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageImage {
    pub num_records: u32,
    pub data: Vec<u8>,
}

impl PageImage {
    fn capture(page: &Page) -> Self {
        Self {
            num_records: page.num_records() as u32,
            data: page.to_bytes(),
        }
    }

    fn restore(&self) -> Result<Page, DatabaseError> {
        Page::from_bytes(self.num_records as usize, &self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeImage {
    pub id: usize,
    pub max_base_pages: usize,
    pub base_pages: Vec<Vec<PageImage>>,
    pub tail_pages: Vec<Vec<PageImage>>,
}

impl RangeImage {
    fn capture(range: &PageRange) -> Self {
        let images = |columns: &[Vec<Page>]| -> Vec<Vec<PageImage>> {
            columns
                .iter()
                .map(|pages| pages.iter().map(PageImage::capture).collect())
                .collect()
        };
        Self {
            id: range.id(),
            max_base_pages: range.max_base_pages(),
            base_pages: images(range.base_pages()),
            tail_pages: images(range.tail_pages()),
        }
    }

    fn restore(&self) -> Result<PageRange, DatabaseError> {
        let pages = |columns: &[Vec<PageImage>]| -> Result<Vec<Vec<Page>>, DatabaseError> {
            columns
                .iter()
                .map(|images| images.iter().map(PageImage::restore).collect())
                .collect()
        };
        PageRange::from_parts(
            self.id,
            self.max_base_pages,
            pages(&self.base_pages)?,
            pages(&self.tail_pages)?,
        )
    }
}

/// Everything needed to rebuild a table: pages, directory, RID counter and
/// indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: String,
    pub num_columns: usize,
    pub key: usize,
    pub config: TableConfig,
    pub rid_counter: Rid,
    pub ranges: Vec<RangeImage>,
    pub directory: DirectoryState,
    pub indices: Vec<IndexImage>,
}

impl TableSnapshot {
    /// Capture a consistent image; row mutations and merge commits wait
    /// until it is taken.
    pub(crate) fn capture(table: &TableInner) -> Self {
        let _catalog = table.catalog.write();
        let ranges = table.ranges.read();
        let guards: Vec<_> = ranges.iter().map(|slot| slot.pages.read()).collect();

        let snapshot = Self {
            name: table.name.clone(),
            num_columns: table.num_columns,
            key: table.key,
            config: table.config.clone(),
            rid_counter: table.rid_counter.load(Ordering::SeqCst),
            ranges: guards.iter().map(|pages| RangeImage::capture(pages)).collect(),
            directory: table.directory.snapshot(),
            indices: table.index.to_images(),
        };
        tracing::debug!(
            table = %snapshot.name,
            ranges = snapshot.ranges.len(),
            "captured table snapshot"
        );
        snapshot
    }

    pub(crate) fn restore(self) -> Result<TableInner, DatabaseError> {
        if self.num_columns == 0
            || self.num_columns > MAX_USER_COLUMNS
            || self.key >= self.num_columns
        {
            return Err(DatabaseError::CorruptedSnapshot {
                reason: format!(
                    "key {} invalid for {} columns",
                    self.key, self.num_columns
                ),
            });
        }
        self.config.validate()?;

        let mut ranges = Vec::with_capacity(self.ranges.len());
        for (position, image) in self.ranges.iter().enumerate() {
            if image.id != position {
                return Err(DatabaseError::CorruptedSnapshot {
                    reason: format!("range {} stored at position {}", image.id, position),
                });
            }
            let range = image.restore()?;
            if range.num_columns() != METADATA_COLUMNS + self.num_columns {
                return Err(DatabaseError::CorruptedSnapshot {
                    reason: format!(
                        "range {} has {} columns, expected {}",
                        image.id,
                        range.num_columns(),
                        METADATA_COLUMNS + self.num_columns
                    ),
                });
            }
            ranges.push(Arc::new(RangeSlot::new(range)));
        }

        let highest = self
            .directory
            .base
            .keys()
            .chain(self.directory.tail.keys())
            .copied()
            .max()
            .unwrap_or(0);
        if self.rid_counter <= highest {
            return Err(DatabaseError::CorruptedSnapshot {
                reason: format!(
                    "rid counter {} not past highest rid {}",
                    self.rid_counter, highest
                ),
            });
        }

        let index = Index::from_images(self.num_columns, self.key, self.indices)?;

        Ok(TableInner {
            name: self.name,
            num_columns: self.num_columns,
            key: self.key,
            config: self.config,
            rid_counter: AtomicU64::new(self.rid_counter),
            ranges: RwLock::new(ranges),
            directory: PageDirectory::from_state(self.directory),
            index,
            catalog: RwLock::new(()),
            key_lock: Mutex::new(()),
        })
    }
}
