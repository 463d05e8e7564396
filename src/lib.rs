//! Columnar, log-structured record store.
//!
//! Rows are fixed-width `i64` columns packed into append-only 4 KiB pages.
//! Updates append delta (tail) records linked through an indirection column
//! and a merge folds them back into fresh base pages.

pub mod art;
pub mod storage;
pub mod types;
pub mod utils;

pub use storage::{
    config::{MergePolicy, MergeTrigger, TableConfig},
    index::Index,
    merge::MergeOutcome,
    table::{RangeStats, Table},
};
pub use types::{
    Rid,
    error::{DatabaseError, Result},
    record::Record,
};
