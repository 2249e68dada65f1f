//! Write-Ahead Logging (WAL) module.
//!
//! Records are length-prefixed and appended to a single log file. Only
//! inserts carry data; `Begin`, `Commit` and `Abort` bracket them. Recovery
//! is redo-only, so the log never needs to be read backwards.

pub mod manager;
pub mod record;

pub use manager::{WalConfig, WalManager};
pub use record::{
    Lsn, TxnId, WalRecord, WalRecordPayload, WalRecordType, MAX_INSERT_ROW_SIZE, MAX_RECORD_SIZE,
    RECORD_HEADER_SIZE,
};
