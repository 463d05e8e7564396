pub mod config;
pub mod header;
pub mod index;
pub mod merge;
pub mod page_directory;
pub mod page_range;
pub mod persistence;
pub mod snapshot;
pub mod table;

const SNAPSHOT_HEADER_SIZE: usize = 64;
const SNAPSHOT_MAGIC: &[u8; 16] = b"KOLOM SNAPSHOT\0\0";
const SNAPSHOT_FORMAT_VERSION: u16 = 1;
