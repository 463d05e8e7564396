use crate::types::{
    INDIRECTION_COLUMN, Rid, error::DatabaseError, page::Page,
};

/// Position of a physical record inside one range: page index within the
/// column's page list and slot within that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLocation {
    pub page: usize,
    pub slot: usize,
}

/*
 * PageRange Layout
 * ┌───────────────────────────────────────────────────────────────┐
 * │ base[col]: [page 0] [page 1] ... [page max_base_pages-1]      │
 * │            one list per physical column, always the same      │
 * │            length and record count across columns            │
 * ├───────────────────────────────────────────────────────────────┤
 * │ tail[col]: [page 0] [page 1] ...   (unbounded, lazy)          │
 * └───────────────────────────────────────────────────────────────┘
 */

#[derive(Debug, Clone)]
pub struct PageRange {
    id: usize,
    max_base_pages: usize,
    base_pages: Vec<Vec<Page>>,
    tail_pages: Vec<Vec<Page>>,
    version: u64,
}

impl PageRange {
    /// `num_columns` counts physical columns, metadata included.
    pub fn new(id: usize, num_columns: usize, max_base_pages: usize) -> Self {
        Self {
            id,
            max_base_pages,
            base_pages: vec![Vec::new(); num_columns],
            tail_pages: vec![Vec::new(); num_columns],
            version: 0,
        }
    }

    pub(crate) fn from_parts(
        id: usize,
        max_base_pages: usize,
        base_pages: Vec<Vec<Page>>,
        tail_pages: Vec<Vec<Page>>,
    ) -> Result<Self, DatabaseError> {
        if base_pages.len() != tail_pages.len() {
            return Err(DatabaseError::CorruptedSnapshot {
                reason: format!(
                    "range {} has {} base columns but {} tail columns",
                    id,
                    base_pages.len(),
                    tail_pages.len()
                ),
            });
        }
        let aligned = base_pages.iter().all(|pages| {
            pages.len() == base_pages[0].len()
                && pages
                    .iter()
                    .zip(&base_pages[0])
                    .all(|(a, b)| a.num_records() == b.num_records())
        });
        if !aligned {
            return Err(DatabaseError::CorruptedSnapshot {
                reason: format!("range {} has misaligned base columns", id),
            });
        }

        Ok(Self {
            id,
            max_base_pages,
            base_pages,
            tail_pages,
            version: 0,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn num_columns(&self) -> usize {
        self.base_pages.len()
    }

    pub fn max_base_pages(&self) -> usize {
        self.max_base_pages
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Mark the range as changed without touching any page.
    pub(crate) fn touch(&mut self) {
        self.version += 1;
    }

    pub fn base_has_capacity(&self) -> bool {
        self.base_page_count() < self.max_base_pages
    }

    /// True when one more base record fits, either in the current base page
    /// or in a page that may still be allocated.
    pub fn can_accept_base_record(&self) -> bool {
        match self.base_pages[0].last() {
            Some(page) if page.has_capacity() => true,
            _ => self.base_has_capacity(),
        }
    }

    pub fn add_base_page(&mut self) -> Result<(), DatabaseError> {
        if !self.base_has_capacity() {
            return Err(DatabaseError::RangeFull {
                range: self.id,
                max_base_pages: self.max_base_pages,
            });
        }

        for pages in &mut self.base_pages {
            pages.push(Page::new());
        }
        tracing::debug!(
            range = self.id,
            base_pages = self.base_page_count(),
            "allocated base page"
        );
        Ok(())
    }

    /// Append a tail page for `column` if its last one is full (or it has
    /// none yet). Returns whether a page was added.
    pub fn add_tail_page_if_needed(&mut self, column: usize) -> Result<bool, DatabaseError> {
        let pages = self
            .tail_pages
            .get_mut(column)
            .ok_or(DatabaseError::ColumnIndexOutOfBounds { index: column })?;

        let needs_page = pages.last().is_none_or(|page| !page.has_capacity());
        if needs_page {
            pages.push(Page::new());
        }
        Ok(needs_page)
    }

    /// Write one base record across every column.
    pub fn append_base(&mut self, values: &[i64]) -> Result<SlotLocation, DatabaseError> {
        self.check_width(values)?;
        let needs_page = self.base_pages[0]
            .last()
            .is_none_or(|page| !page.has_capacity());
        if needs_page {
            self.add_base_page()?;
        }

        let page = self.base_page_count() - 1;
        let mut slot = 0;
        for (pages, value) in self.base_pages.iter_mut().zip(values) {
            let last = pages.last_mut().ok_or(DatabaseError::CorruptedPage {
                reason: "base column without pages".to_string(),
            })?;
            slot = last.write(*value)?;
        }
        self.version += 1;

        Ok(SlotLocation { page, slot })
    }

    /// Write one tail record across every column, growing tail pages as
    /// needed.
    pub fn append_tail(&mut self, values: &[i64]) -> Result<SlotLocation, DatabaseError> {
        self.check_width(values)?;
        for column in 0..self.tail_pages.len() {
            self.add_tail_page_if_needed(column)?;
        }

        let page = self.tail_pages[0].len() - 1;
        let mut slot = 0;
        for (pages, value) in self.tail_pages.iter_mut().zip(values) {
            let last = pages.last_mut().ok_or(DatabaseError::CorruptedPage {
                reason: "tail column without pages".to_string(),
            })?;
            slot = last.write(*value)?;
        }
        self.version += 1;

        Ok(SlotLocation { page, slot })
    }

    pub fn read_base(&self, column: usize, location: SlotLocation) -> Result<i64, DatabaseError> {
        Self::read_from(&self.base_pages, column, location)
    }

    pub fn read_tail(&self, column: usize, location: SlotLocation) -> Result<i64, DatabaseError> {
        Self::read_from(&self.tail_pages, column, location)
    }

    /// Publish a new newest delta for the base record at `location`.
    pub fn set_base_indirection(
        &mut self,
        location: SlotLocation,
        rid: Rid,
    ) -> Result<(), DatabaseError> {
        let page = self.base_pages[INDIRECTION_COLUMN]
            .get_mut(location.page)
            .ok_or(DatabaseError::OutOfRange {
                slot: location.slot,
                num_records: 0,
            })?;
        page.overwrite(location.slot, rid as i64)?;
        self.version += 1;
        Ok(())
    }

    pub fn base_page_count(&self) -> usize {
        self.base_pages[0].len()
    }

    pub fn base_record_count(&self) -> usize {
        self.base_pages[0].iter().map(Page::num_records).sum()
    }

    pub fn tail_record_count(&self) -> usize {
        self.tail_pages[0].iter().map(Page::num_records).sum()
    }

    pub fn tail_page_count(&self, column: usize) -> usize {
        self.tail_pages.get(column).map_or(0, Vec::len)
    }

    pub fn total_tail_pages(&self) -> usize {
        self.tail_pages.iter().map(Vec::len).sum()
    }

    pub fn base_pages(&self) -> &[Vec<Page>] {
        &self.base_pages
    }

    pub fn tail_pages(&self) -> &[Vec<Page>] {
        &self.tail_pages
    }

    pub(crate) fn into_base_pages(self) -> Vec<Vec<Page>> {
        self.base_pages
    }

    /// Install a merged base generation and retire every tail page.
    pub(crate) fn install_generation(&mut self, base_pages: Vec<Vec<Page>>) {
        self.base_pages = base_pages;
        for pages in &mut self.tail_pages {
            pages.clear();
        }
        self.version += 1;
    }

    fn check_width(&self, values: &[i64]) -> Result<(), DatabaseError> {
        if values.len() != self.base_pages.len() {
            return Err(DatabaseError::ColumnCountMismatch {
                expected: self.base_pages.len(),
                actual: values.len(),
            });
        }
        Ok(())
    }

    fn read_from(
        pages: &[Vec<Page>],
        column: usize,
        location: SlotLocation,
    ) -> Result<i64, DatabaseError> {
        let column_pages = pages
            .get(column)
            .ok_or(DatabaseError::ColumnIndexOutOfBounds { index: column })?;
        let page = column_pages
            .get(location.page)
            .ok_or(DatabaseError::OutOfRange {
                slot: location.slot,
                num_records: 0,
            })?;
        page.read(location.slot)
    }
}
