//! Storage layer error types.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Corrupt page {page_id}: {reason}")]
    CorruptPage { page_id: i32, reason: String },

    #[error("Heap page free space offset {offset} is out of range")]
    BadFreeSpaceOffset { offset: u32 },

    #[error("Corrupt log record at offset {offset}: {reason}")]
    CorruptLogRecord { offset: usize, reason: String },

    #[error("Log record too large: {size} bytes (max {max})")]
    RecordTooLarge { size: usize, max: usize },
}
