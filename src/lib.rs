pub mod access;
pub mod catalog;
pub mod database;
pub mod error;
pub mod recovery;
pub mod storage;
