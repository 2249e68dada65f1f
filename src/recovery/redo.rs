//! Redo pass over the write-ahead log.

use std::path::Path;

use anyhow::Result;
use log::{debug, info, warn};

use crate::storage::page::{HeapPage, PageId};
use crate::storage::wal::{Lsn, TxnId, WalManager, WalRecordPayload};
use crate::storage::{PageManager, PAGE_SIZE};

/// Outcome of one recovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Complete records read from the log.
    pub records_read: usize,
    /// Insert records applied to their page.
    pub inserts_redone: usize,
    /// Insert records the page already contained.
    pub skipped_applied: usize,
    /// Insert records whose row no longer fit the page. These rows are lost.
    pub skipped_no_space: usize,
    /// Highest LSN in the log.
    pub last_lsn: Lsn,
    /// Highest transaction id in the log, if any record was read.
    pub max_txn_id: Option<TxnId>,
}

impl Default for RecoveryStats {
    fn default() -> Self {
        Self {
            records_read: 0,
            inserts_redone: 0,
            skipped_applied: 0,
            skipped_no_space: 0,
            last_lsn: Lsn::INVALID,
            max_txn_id: None,
        }
    }
}

/// Replays `Insert` records from the log at `wal_path` into `store`.
///
/// Must run before any table heap or index is handed out. An insert is
/// applied only when its LSN is newer than the target page's `page_lsn`,
/// after which the page is stamped with it, so running recovery again
/// inserts nothing twice.
pub struct RedoRecovery<'a> {
    store: &'a PageManager,
    wal_path: &'a Path,
}

impl<'a> RedoRecovery<'a> {
    pub fn new(store: &'a PageManager, wal_path: &'a Path) -> Self {
        Self { store, wal_path }
    }

    pub fn run(&self) -> Result<RecoveryStats> {
        let records = WalManager::read_records(self.wal_path)?;
        let mut stats = RecoveryStats::default();
        if records.is_empty() {
            debug!("no WAL records at {:?}, nothing to recover", self.wal_path);
            return Ok(stats);
        }

        info!(
            "recovering {} WAL records from {:?}",
            records.len(),
            self.wal_path
        );

        let mut buf = Box::new([0u8; PAGE_SIZE]);
        for record in &records {
            stats.records_read += 1;
            stats.last_lsn = stats.last_lsn.max(record.lsn);
            stats.max_txn_id = stats.max_txn_id.max(Some(record.txn_id));

            let WalRecordPayload::Insert { page_id, row } = &record.payload else {
                continue;
            };
            if !page_id.is_valid() {
                warn!("{} targets invalid page {}, skipping", record.lsn, page_id);
                stats.skipped_no_space += 1;
                continue;
            }

            self.redo_insert(*page_id, record.lsn, row, &mut buf, &mut stats)?;
        }

        info!(
            "recovery done: {} records, {} redone, {} already applied, {} skipped for space",
            stats.records_read, stats.inserts_redone, stats.skipped_applied, stats.skipped_no_space
        );
        if stats.skipped_no_space > 0 {
            warn!(
                "{} logged rows could not be restored and are lost",
                stats.skipped_no_space
            );
        }

        Ok(stats)
    }

    fn redo_insert(
        &self,
        page_id: PageId,
        lsn: Lsn,
        row: &[u8],
        buf: &mut [u8; PAGE_SIZE],
        stats: &mut RecoveryStats,
    ) -> Result<()> {
        self.store.read_page(page_id, &mut buf[..])?;
        let mut page = HeapPage::from_data(buf);

        if !page.is_initialized() {
            // Linked from its predecessor but lost before its own write.
            debug!("initializing unwritten page {} for redo", page_id);
            page.init_new(PageId::INVALID);
        }

        if lsn <= page.page_lsn() {
            stats.skipped_applied += 1;
            return Ok(());
        }

        if !page.insert_row(row) {
            warn!(
                "{}: row of {} bytes no longer fits page {} ({} free), skipping",
                lsn,
                row.len(),
                page_id,
                page.free_space()
            );
            stats.skipped_no_space += 1;
            return Ok(());
        }

        page.set_page_lsn(lsn);
        self.store.write_page(page_id, &page.data()[..])?;
        stats.inserts_redone += 1;
        Ok(())
    }
}
