use crate::access::predicate::Predicate;
use crate::access::tuple::{Rid, Tuple};
use crate::access::value::Value;
use crate::catalog::Schema;
use crate::error::DbError;
use crate::storage::page::heap_page::MAX_ROW_SIZE;
use crate::storage::page::{HeapPage, PageId};
use crate::storage::wal::{Lsn, TxnId, WalManager, WalRecord, MAX_INSERT_ROW_SIZE};
use crate::storage::{PageManager, PAGE_SIZE};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::sync::Arc;

type PageBuf = Box<[u8; PAGE_SIZE]>;

fn new_page_buf() -> PageBuf {
    Box::new([0u8; PAGE_SIZE])
}

/// A table stored as a singly linked chain of heap pages.
///
/// The chain only grows: new pages are appended at the end of the data file
/// and linked from the current last page. Pages are never reclaimed.
pub struct TableHeap {
    store: Arc<PageManager>,
    first_page_id: PageId,
    schema: Schema,
}

impl TableHeap {
    /// Allocate and persist an empty first page.
    pub fn create(store: Arc<PageManager>, schema: Schema) -> Result<Self> {
        let first_page_id = store.allocate_page()?;
        let mut buf = new_page_buf();
        HeapPage::new(&mut buf, PageId::INVALID);
        store.write_page(first_page_id, &buf[..])?;
        debug!("created table heap at page {}", first_page_id);

        Ok(Self {
            store,
            first_page_id,
            schema,
        })
    }

    /// Attach to an existing chain. Does not touch the disk.
    pub fn open(store: Arc<PageManager>, first_page_id: PageId, schema: Schema) -> Self {
        Self {
            store,
            first_page_id,
            schema,
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate `tuple` against the schema and encode it, rejecting rows
    /// longer than `max_size` bytes.
    pub fn encode_row(&self, tuple: &Tuple, max_size: usize) -> Result<Vec<u8>> {
        tuple.check_schema(&self.schema)?;
        let row = tuple.serialize();
        if row.len() > max_size {
            return Err(DbError::RowTooLarge {
                size: row.len(),
                max: max_size,
            }
            .into());
        }
        Ok(row)
    }

    /// Append a row to the first page with room, growing the chain if none has.
    pub fn insert(&self, tuple: &Tuple) -> Result<Rid> {
        let row = self.encode_row(tuple, MAX_ROW_SIZE)?;
        let (rid, _) = self.insert_row(&row, |_| Ok(None))?;
        Ok(rid)
    }

    /// Insert under the write-ahead rule.
    ///
    /// Once the target page is known, an `Insert` record for it is appended
    /// and the log flushed; only then is any data page written. The record's
    /// LSN is stamped into the page so redo can tell it has been applied.
    pub fn insert_logged(
        &self,
        tuple: &Tuple,
        wal: &WalManager,
        txn_id: TxnId,
        prev_lsn: Lsn,
    ) -> Result<(Rid, Lsn)> {
        let row = self.encode_row(tuple, MAX_INSERT_ROW_SIZE)?;
        let (rid, lsn) = self.insert_row(&row, |page_id| {
            let lsn = wal.append(&mut WalRecord::insert(txn_id, prev_lsn, page_id, row.clone()))?;
            wal.flush()?;
            Ok(Some(lsn))
        })?;
        Ok((rid, lsn.unwrap_or(Lsn::INVALID)))
    }

    fn insert_row<F>(&self, row: &[u8], mut log: F) -> Result<(Rid, Option<Lsn>)>
    where
        F: FnMut(PageId) -> Result<Option<Lsn>>,
    {
        let mut page_id = self.first_page_id;
        let mut buf = new_page_buf();

        loop {
            self.store.read_page(page_id, &mut buf[..])?;
            let mut page = HeapPage::from_data(&mut buf);
            if !page.is_initialized() {
                warn!("heap page {} was never written, initializing it", page_id);
                page.init_new(PageId::INVALID);
            }

            if page.fits(row.len()) {
                let lsn = log(page_id)?;
                let slot = page.row_count();
                page.insert_row(row);
                if let Some(lsn) = lsn {
                    page.set_page_lsn(lsn);
                }
                self.store.write_page(page_id, &page.data()[..])?;
                return Ok((Rid::new(page_id, slot), lsn));
            }

            let next = page.next_page_id();
            if next.is_valid() {
                page_id = next;
                continue;
            }

            // Last page is full: link a fresh page and put the row there.
            // The link is durable before the record naming the new page is
            // logged, so a redone row is always reachable from the chain.
            // A crash before the log flush leaves a zeroed tail page, which
            // scans stop at and the next insert initializes.
            let new_page_id = self.store.allocate_page()?;
            page.set_next_page_id(new_page_id);
            self.store.write_page(page_id, &page.data()[..])?;

            let lsn = log(new_page_id)?;

            let mut new_buf = new_page_buf();
            let mut new_page = HeapPage::new(&mut new_buf, PageId::INVALID);
            new_page.insert_row(row);
            if let Some(lsn) = lsn {
                new_page.set_page_lsn(lsn);
            }
            self.store.write_page(new_page_id, &new_page.data()[..])?;
            debug!("table heap {} grew to page {}", self.first_page_id, new_page_id);

            return Ok((Rid::new(new_page_id, 0), lsn));
        }
    }

    /// Page ids of the chain in link order.
    pub fn page_ids(&self) -> Result<Vec<PageId>> {
        let mut ids = Vec::new();
        self.for_each_page(|page_id, _| {
            ids.push(page_id);
            Ok(())
        })?;
        Ok(ids)
    }

    /// Every row, in page order then append order.
    pub fn scan(&self) -> Result<Vec<Tuple>> {
        let mut rows = Vec::new();
        self.for_each_page(|_, page| {
            rows.extend(page.scan_rows(&self.schema)?);
            Ok(())
        })?;
        Ok(rows)
    }

    /// Look up the row at `rid`, or `None` if the page is not part of this
    /// table or holds fewer rows than `rid.slot + 1`.
    ///
    /// Slots are positions at insert time; a delete or update that rewrites
    /// the page renumbers them.
    pub fn fetch(&self, rid: Rid) -> Result<Option<Tuple>> {
        let mut found = None;
        self.for_each_page(|page_id, page| {
            if page_id == rid.page_id {
                found = page.row_at(rid.slot, &self.schema)?;
            }
            Ok(())
        })?;
        Ok(found)
    }

    /// Remove every row matching `predicate`, returning how many were removed.
    ///
    /// Pages that lose rows are rewritten with the survivors in their
    /// original order. An unknown column fails before anything is written.
    pub fn delete(&self, predicate: &Predicate) -> Result<usize> {
        let bound = predicate.bind(&self.schema)?;
        let mut removed = 0;
        let mut rewrites = Vec::new();

        self.for_each_page(|page_id, page| {
            let rows = page.scan_rows(&self.schema)?;
            let before = rows.len();
            let kept: Vec<Tuple> = rows.into_iter().filter(|t| !bound.matches(t)).collect();
            if kept.len() < before {
                removed += before - kept.len();
                rewrites.push((page_id, kept));
            }
            Ok(())
        })?;

        for (page_id, kept) in rewrites {
            let encoded: Vec<Vec<u8>> = kept.iter().map(Tuple::serialize).collect();
            self.rewrite_page(page_id, &encoded)?;
        }

        debug!("deleted {} rows from table heap {}", removed, self.first_page_id);
        Ok(removed)
    }

    /// Set `set_column` to `literal` on every row matching `predicate`,
    /// returning how many rows changed.
    ///
    /// The column and literal are resolved and parsed before any page is
    /// written. Other columns and non-matching rows are left as they were.
    /// A rewritten page keeps its rows in order. Rows that no longer fit are
    /// reinserted like new rows, into the first page with room or a new
    /// page at the end of the chain, so they may land on an earlier page.
    pub fn update(&self, predicate: &Predicate, set_column: &str, literal: &str) -> Result<usize> {
        let bound = predicate.bind(&self.schema)?;
        let (set_index, set_type) = self.schema.resolve(set_column)?;
        let new_value = Value::parse(literal, set_type)?;

        let mut updated = 0;
        let mut rewrites = Vec::new();

        self.for_each_page(|page_id, page| {
            let mut changed = false;
            let mut rows = Vec::new();
            for tuple in page.scan_rows(&self.schema)? {
                if bound.matches(&tuple) {
                    let replaced = tuple.with_value(set_index, new_value.clone());
                    rows.push(self.encode_row(&replaced, MAX_ROW_SIZE)?);
                    updated += 1;
                    changed = true;
                } else {
                    rows.push(tuple.serialize());
                }
            }
            if changed {
                rewrites.push((page_id, rows));
            }
            Ok(())
        })?;

        let mut spilled = Vec::new();
        for (page_id, rows) in rewrites {
            spilled.extend(self.rewrite_page(page_id, &rows)?);
        }
        if !spilled.is_empty() {
            debug!(
                "{} updated rows outgrew their page and are reinserted into table heap {}",
                spilled.len(),
                self.first_page_id
            );
        }
        for row in spilled {
            self.insert_row(&row, |_| Ok(None))?;
        }

        Ok(updated)
    }

    /// Reinitialize `page_id` with `rows`, keeping its link and page LSN.
    /// Returns the rows that did not fit.
    fn rewrite_page(&self, page_id: PageId, rows: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        let mut buf = new_page_buf();
        self.store.read_page(page_id, &mut buf[..])?;
        let mut page = HeapPage::from_data(&mut buf);

        let next = page.next_page_id();
        let lsn = page.page_lsn();
        page.init_new(next);
        page.set_page_lsn(lsn);

        let mut overflow = Vec::new();
        for row in rows {
            if !page.insert_row(row) {
                overflow.push(row.clone());
            }
        }

        self.store.write_page(page_id, &page.data()[..])?;
        Ok(overflow)
    }

    /// Visit each page of the chain in order.
    ///
    /// A page that reads back as never written ends the chain: it is a page
    /// that was linked but whose contents were lost in a crash.
    fn for_each_page<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(PageId, &HeapPage) -> Result<()>,
    {
        let mut page_id = self.first_page_id;
        let mut buf = new_page_buf();

        while page_id.is_valid() {
            self.store.read_page(page_id, &mut buf[..])?;
            let page = HeapPage::from_data(&mut buf);
            if !page.is_initialized() {
                warn!(
                    "heap page {} in chain of {} is uninitialized, treating it as the end",
                    page_id, self.first_page_id
                );
                break;
            }
            visit(page_id, &page).with_context(|| {
                format!("heap page {} of table heap {}", page_id, self.first_page_id)
            })?;
            page_id = page.next_page_id();
        }

        Ok(())
    }
}
