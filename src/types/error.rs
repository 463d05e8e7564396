use thiserror::Error;

use crate::types::Rid;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page is full ({capacity} records)")]
    CapacityExceeded { capacity: usize },

    #[error("Page range {range} has reached its base page limit ({max_base_pages})")]
    RangeFull { range: usize, max_base_pages: usize },

    #[error("Slot {slot} out of range (records: {num_records})")]
    OutOfRange { slot: usize, num_records: usize },

    #[error("Record {rid} not found")]
    RecordNotFound { rid: Rid },

    #[error("Duplicate value {value} for column {column}")]
    DuplicateKey { column: usize, value: i64 },

    #[error("Column index {index} out of bounds")]
    ColumnIndexOutOfBounds { index: usize },

    #[error("Expected {expected} column values, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("Invalid schema: {reason}")]
    InvalidSchema { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Serialization/deserialization error: {details}")]
    SerializationError { details: String },

    #[error("Invalid page size: {expected} bytes, got {actual} bytes")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Corrupted page: {reason}")]
    CorruptedPage { reason: String },

    #[error("Invalid snapshot header: {reason}")]
    InvalidHeader { reason: String },

    #[error("Corrupted snapshot: {reason}")]
    CorruptedSnapshot { reason: String },
}

impl From<bincode::error::EncodeError> for DatabaseError {
    fn from(err: bincode::error::EncodeError) -> Self {
        DatabaseError::SerializationError {
            details: err.to_string(),
        }
    }
}

impl From<bincode::error::DecodeError> for DatabaseError {
    fn from(err: bincode::error::DecodeError) -> Self {
        DatabaseError::SerializationError {
            details: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
