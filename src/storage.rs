//! Storage layer implementation for v2vdb.
//!
//! This module provides the foundation for persistent data storage using a page-based
//! architecture. Key components:
//!
//! - **Page**: Fixed-size (4KB) blocks of data, the basic unit of I/O
//! - **PageManager**: Reads and writes pages directly against the data file
//! - **HeapPage**: Append-only page format for storing serialized rows
//! - **BTreeLeafPage / BTreeInternalPage**: Index node formats
//! - **WalManager**: Buffered, append-only write-ahead log
//!
//! There is deliberately no buffer pool: every access touches the file, so a
//! read that follows a write to the same page always observes that write.

pub mod disk;
pub mod error;
pub mod page;
pub mod wal;

pub use disk::{PageManager, PAGE_SIZE};
pub use error::StorageError;
pub use page::{HeapPage, PageId};
