//! Access layer for row-oriented operations.
//!
//! This module turns raw pages into tables and indexes:
//!
//! - **TableHeap**: a table stored as a linked chain of heap pages
//! - **Tuple**: a row of values in schema order, and **Rid**, its locator
//! - **Value**: typed column values and their byte encoding
//! - **Predicate**: single-column equality filters for delete and update
//! - **BPlusTree**: an ordered index from integer keys to row locators

pub mod btree;
pub mod heap;
pub mod predicate;
pub mod tuple;
pub mod value;

pub use btree::BPlusTree;
pub use heap::TableHeap;
pub use predicate::{CompareOp, Predicate};
pub use tuple::{Rid, Tuple};
pub use value::{DataType, Value};
