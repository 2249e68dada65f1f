//! Crash recovery.
//!
//! Recovery is redo-only: every `Insert` record in the write-ahead log is
//! reapplied to its heap page unless the page already reflects it. There is
//! no undo phase and transaction boundaries are not interpreted.

pub mod redo;

pub use redo::{RecoveryStats, RedoRecovery};
