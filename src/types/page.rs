use crate::types::{CELL_SIZE, PAGE_CAPACITY, PAGE_SIZE, error::DatabaseError};

/*
 * Column Page Layout (in memory and on disk)
 * ┌─────────────────────────────────────────────────────────────────┐
 * │ cell 0 (i64 LE) | cell 1 (i64 LE) | ... | cell 511 (i64 LE)     │
 * └─────────────────────────────────────────────────────────────────┘
 *
 * No header: the record count travels beside the page, not inside it.
 * Cells are written strictly in slot order and never rewritten, except
 * for the base indirection column (see `overwrite`).
 */

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    num_records: usize,
    data: Vec<u8>,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        Self {
            num_records: 0,
            data: vec![0; PAGE_SIZE],
        }
    }

    pub fn num_records(&self) -> usize {
        self.num_records
    }

    pub fn has_capacity(&self) -> bool {
        self.num_records < PAGE_CAPACITY
    }

    /// Append a value to the next free slot and return that slot.
    pub fn write(&mut self, value: i64) -> Result<usize, DatabaseError> {
        if !self.has_capacity() {
            return Err(DatabaseError::CapacityExceeded {
                capacity: PAGE_CAPACITY,
            });
        }

        let slot = self.num_records;
        self.put(slot, value);
        self.num_records += 1;

        Ok(slot)
    }

    pub fn read(&self, slot: usize) -> Result<i64, DatabaseError> {
        self.check_slot(slot)?;
        let start = slot * CELL_SIZE;
        let mut cell = [0u8; CELL_SIZE];
        cell.copy_from_slice(&self.data[start..start + CELL_SIZE]);
        Ok(i64::from_le_bytes(cell))
    }

    /// Replace an already written slot in place.
    ///
    /// Only the base indirection column is allowed to do this; every other
    /// logical change is a new tail record.
    pub(crate) fn overwrite(&mut self, slot: usize, value: i64) -> Result<(), DatabaseError> {
        self.check_slot(slot)?;
        self.put(slot, value);
        Ok(())
    }

    /// Raw page image, exactly `PAGE_SIZE` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Rebuild a page from its raw image and record count.
    pub fn from_bytes(num_records: usize, bytes: &[u8]) -> Result<Self, DatabaseError> {
        if bytes.len() != PAGE_SIZE {
            return Err(DatabaseError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }
        if num_records > PAGE_CAPACITY {
            return Err(DatabaseError::CorruptedPage {
                reason: format!(
                    "record count {} exceeds page capacity {}",
                    num_records, PAGE_CAPACITY
                ),
            });
        }

        Ok(Self {
            num_records,
            data: bytes.to_vec(),
        })
    }

    fn check_slot(&self, slot: usize) -> Result<(), DatabaseError> {
        if slot >= self.num_records {
            return Err(DatabaseError::OutOfRange {
                slot,
                num_records: self.num_records,
            });
        }
        Ok(())
    }

    fn put(&mut self, slot: usize, value: i64) {
        let start = slot * CELL_SIZE;
        self.data[start..start + CELL_SIZE].copy_from_slice(&value.to_le_bytes());
    }
}
