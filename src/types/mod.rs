pub mod error;
pub mod page;
pub mod record;

// Common type aliases
pub type Rid = u64;

// Page geometry: dense little-endian i64 cells, no header
pub const PAGE_SIZE: usize = 4096;
pub const CELL_SIZE: usize = 8;
pub const PAGE_CAPACITY: usize = PAGE_SIZE / CELL_SIZE;

// Metadata columns prefixed to every physical record
pub const INDIRECTION_COLUMN: usize = 0;
pub const RID_COLUMN: usize = 1;
pub const SCHEMA_ENCODING_COLUMN: usize = 2;
pub const TIMESTAMP_COLUMN: usize = 3;
pub const METADATA_COLUMNS: usize = 4;

/// Indirection value of a base record that has no deltas.
pub const NULL_RID: Rid = 0;

/// The schema encoding is a single 64-bit cell, one bit per user column.
pub const MAX_USER_COLUMNS: usize = 64;
