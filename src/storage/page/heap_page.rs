use crate::access::tuple::Tuple;
use crate::catalog::Schema;
use crate::storage::error::StorageError;
use crate::storage::page::PageId;
use crate::storage::wal::Lsn;
use crate::storage::PAGE_SIZE;
use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

// Header structure (16 bytes)
pub const HEADER_SIZE: usize = 16;
const NEXT_PAGE_ID_OFFSET: usize = 0;
const ROW_COUNT_OFFSET: usize = 4;
const FREE_SPACE_OFFSET_OFFSET: usize = 8;
const PAGE_LSN_OFFSET: usize = 12;

/// Largest serialized row a single heap page can hold.
pub const MAX_ROW_SIZE: usize = PAGE_SIZE - HEADER_SIZE;

/// Append-only heap page.
///
/// Layout: `next_page_id: i32 | row_count: u32 | free_space_offset: u32 |
/// page_lsn: i32 | rows...`. Rows are packed back to back from `HEADER_SIZE`
/// up to `free_space_offset` and are never reclaimed in place; removing or
/// changing a row means rewriting the whole page. `page_lsn` is the LSN of
/// the last logged insert applied to the page, `-1` if none.
pub struct HeapPage<'a> {
    data: &'a mut [u8; PAGE_SIZE],
}

impl<'a> HeapPage<'a> {
    /// Initialize `data` as an empty heap page linked to `next_page_id`.
    pub fn new(data: &'a mut [u8; PAGE_SIZE], next_page_id: PageId) -> Self {
        let mut page = Self { data };
        page.init_new(next_page_id);
        page
    }

    pub fn from_data(data: &'a mut [u8; PAGE_SIZE]) -> Self {
        Self { data }
    }

    /// Reset the page to empty, zeroing the row region.
    pub fn init_new(&mut self, next_page_id: PageId) {
        self.data[HEADER_SIZE..].fill(0);
        self.set_next_page_id(next_page_id);
        self.set_row_count(0);
        self.set_free_space_offset(HEADER_SIZE as u32);
        self.set_page_lsn(Lsn::INVALID);
    }

    /// Whether the header describes a valid page. A page that was allocated
    /// but never written reads back as all zeroes and fails this check.
    pub fn is_initialized(&self) -> bool {
        let offset = self.free_space_offset() as usize;
        (HEADER_SIZE..=PAGE_SIZE).contains(&offset)
    }

    /// Whether a row of `len` bytes can still be appended.
    pub fn fits(&self, len: usize) -> bool {
        self.free_space_offset() as usize + len <= PAGE_SIZE
    }

    /// Append already-serialized row bytes.
    ///
    /// Returns `false` without touching the page if the row does not fit.
    pub fn insert_row(&mut self, row: &[u8]) -> bool {
        if !self.fits(row.len()) {
            return false;
        }

        let offset = self.free_space_offset() as usize;
        self.data[offset..offset + row.len()].copy_from_slice(row);
        self.set_free_space_offset((offset + row.len()) as u32);
        self.set_row_count(self.row_count() + 1);
        true
    }

    /// Decode every row on the page, in append order.
    pub fn scan_rows(&self, schema: &Schema) -> Result<Vec<Tuple>> {
        let region = self.row_region()?;
        let count = self.row_count() as usize;
        let mut rows = Vec::with_capacity(count);
        let mut offset = 0;

        for _ in 0..count {
            let (tuple, consumed) = Tuple::deserialize(&region[offset..], schema)?;
            rows.push(tuple);
            offset += consumed;
        }

        Ok(rows)
    }

    /// Decode the row at position `slot`, or `None` if the page holds fewer rows.
    pub fn row_at(&self, slot: u32, schema: &Schema) -> Result<Option<Tuple>> {
        if slot >= self.row_count() {
            return Ok(None);
        }

        let region = self.row_region()?;
        let mut offset = 0;
        for _ in 0..slot {
            let (_, consumed) = Tuple::deserialize(&region[offset..], schema)?;
            offset += consumed;
        }

        let (tuple, _) = Tuple::deserialize(&region[offset..], schema)?;
        Ok(Some(tuple))
    }

    fn row_region(&self) -> Result<&[u8]> {
        if !self.is_initialized() {
            return Err(StorageError::BadFreeSpaceOffset {
                offset: self.free_space_offset(),
            }
            .into());
        }
        Ok(&self.data[HEADER_SIZE..self.free_space_offset() as usize])
    }

    pub fn next_page_id(&self) -> PageId {
        PageId(LittleEndian::read_i32(&self.data[NEXT_PAGE_ID_OFFSET..]))
    }

    pub fn set_next_page_id(&mut self, page_id: PageId) {
        LittleEndian::write_i32(&mut self.data[NEXT_PAGE_ID_OFFSET..], page_id.0);
    }

    pub fn row_count(&self) -> u32 {
        LittleEndian::read_u32(&self.data[ROW_COUNT_OFFSET..])
    }

    fn set_row_count(&mut self, count: u32) {
        LittleEndian::write_u32(&mut self.data[ROW_COUNT_OFFSET..], count);
    }

    pub fn free_space_offset(&self) -> u32 {
        LittleEndian::read_u32(&self.data[FREE_SPACE_OFFSET_OFFSET..])
    }

    fn set_free_space_offset(&mut self, offset: u32) {
        LittleEndian::write_u32(&mut self.data[FREE_SPACE_OFFSET_OFFSET..], offset);
    }

    pub fn page_lsn(&self) -> Lsn {
        Lsn(LittleEndian::read_i32(&self.data[PAGE_LSN_OFFSET..]))
    }

    pub fn set_page_lsn(&mut self, lsn: Lsn) {
        LittleEndian::write_i32(&mut self.data[PAGE_LSN_OFFSET..], lsn.0);
    }

    pub fn free_space(&self) -> usize {
        PAGE_SIZE.saturating_sub(self.free_space_offset() as usize)
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::{DataType, Value};
    use crate::catalog::Column;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Varchar),
        ])
        .unwrap()
    }

    fn row(id: i32, name: &str) -> Tuple {
        Tuple::new(vec![Value::Integer(id), Value::Varchar(name.to_string())])
    }

    #[test]
    fn test_heap_page_initialization() {
        let mut data = Box::new([0xAAu8; PAGE_SIZE]);
        let page = HeapPage::new(&mut data, PageId(7));

        assert_eq!(page.next_page_id(), PageId(7));
        assert_eq!(page.row_count(), 0);
        assert_eq!(page.free_space_offset(), HEADER_SIZE as u32);
        assert_eq!(page.page_lsn(), Lsn::INVALID);
        assert_eq!(page.free_space(), MAX_ROW_SIZE);
        assert!(page.data()[HEADER_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zeroed_page_is_uninitialized() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let page = HeapPage::from_data(&mut data);
        assert!(!page.is_initialized());
        let err = page.scan_rows(&schema()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::BadFreeSpaceOffset { offset: 0 })
        ));
    }

    #[test]
    fn test_insert_and_scan_rows() -> Result<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = HeapPage::new(&mut data, PageId::INVALID);

        let first = row(1, "a");
        let second = row(2, "bb");
        assert!(page.insert_row(&first.serialize()));
        assert!(page.insert_row(&second.serialize()));

        assert_eq!(page.row_count(), 2);
        assert_eq!(
            page.free_space_offset() as usize,
            HEADER_SIZE + first.serialized_size() + second.serialized_size()
        );
        assert_eq!(page.scan_rows(&schema())?, vec![first, second]);

        Ok(())
    }

    #[test]
    fn test_row_at() -> Result<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = HeapPage::new(&mut data, PageId::INVALID);
        for i in 0..3 {
            page.insert_row(&row(i, &"x".repeat(i as usize)).serialize());
        }

        assert_eq!(page.row_at(2, &schema())?, Some(row(2, "xx")));
        assert_eq!(page.row_at(3, &schema())?, None);

        Ok(())
    }

    #[test]
    fn test_page_full_leaves_page_untouched() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = HeapPage::new(&mut data, PageId::INVALID);

        let big = vec![0xAB; 3000];
        assert!(page.insert_row(&big));
        let before = *page.data();

        assert!(!page.insert_row(&big));
        assert_eq!(page.row_count(), 1);
        assert_eq!(&before[..], &page.data()[..]);
    }

    #[test]
    fn test_exact_fit() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = HeapPage::new(&mut data, PageId::INVALID);

        assert!(page.insert_row(&vec![1u8; MAX_ROW_SIZE]));
        assert_eq!(page.free_space(), 0);
        assert!(!page.insert_row(&[1u8]));
    }

    #[test]
    fn test_from_existing_data() -> Result<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);

        {
            let mut page = HeapPage::new(&mut data, PageId(3));
            page.insert_row(&row(9, "persisted").serialize());
            page.set_page_lsn(Lsn(12));
        }

        let page = HeapPage::from_data(&mut data);
        assert_eq!(page.next_page_id(), PageId(3));
        assert_eq!(page.page_lsn(), Lsn(12));
        assert_eq!(page.scan_rows(&schema())?, vec![row(9, "persisted")]);

        Ok(())
    }
}
