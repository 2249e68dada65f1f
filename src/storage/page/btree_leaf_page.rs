use crate::access::tuple::Rid;
use crate::storage::page::btree_page::{BTreePage, IndexPageType, BTREE_HEADER_SIZE};
use crate::storage::{PageId, PAGE_SIZE};
use byteorder::{ByteOrder, LittleEndian};

const NEXT_PAGE_ID_OFFSET: usize = BTREE_HEADER_SIZE;
pub const LEAF_PAGE_HEADER_SIZE: usize = BTREE_HEADER_SIZE + 4;

// key (4) + rid (8)
const LEAF_ENTRY_SIZE: usize = 4 + Rid::SIZE;

/// Most entries a leaf page can physically hold.
pub const LEAF_PAGE_CAPACITY: usize = (PAGE_SIZE - LEAF_PAGE_HEADER_SIZE) / LEAF_ENTRY_SIZE;

/// Leaf node: `(key, rid)` pairs sorted by strictly increasing key, plus a
/// `next_page_id` link to the right sibling.
pub struct BTreeLeafPage {
    data: Box<[u8; PAGE_SIZE]>,
}

impl BTreeLeafPage {
    pub fn new(page_id: PageId, parent_page_id: PageId, max_size: usize) -> Self {
        let mut page = Self {
            data: Box::new([0; PAGE_SIZE]),
        };
        page.set_page_type(IndexPageType::Leaf);
        page.set_lsn(0);
        page.set_size(0);
        page.set_max_size(max_size.min(LEAF_PAGE_CAPACITY));
        page.set_parent_page_id(parent_page_id);
        page.set_page_id(page_id);
        page.set_next_page_id(PageId::INVALID);
        page
    }

    pub fn from_data(data: Box<[u8; PAGE_SIZE]>) -> Self {
        Self { data }
    }

    pub fn next_page_id(&self) -> PageId {
        PageId(LittleEndian::read_i32(&self.data[NEXT_PAGE_ID_OFFSET..]))
    }

    pub fn set_next_page_id(&mut self, page_id: PageId) {
        LittleEndian::write_i32(&mut self.data[NEXT_PAGE_ID_OFFSET..], page_id.0);
    }

    fn entry_offset(index: usize) -> usize {
        LEAF_PAGE_HEADER_SIZE + index * LEAF_ENTRY_SIZE
    }

    pub fn key_at(&self, index: usize) -> i32 {
        LittleEndian::read_i32(&self.data[Self::entry_offset(index)..])
    }

    pub fn rid_at(&self, index: usize) -> Rid {
        let offset = Self::entry_offset(index) + 4;
        Rid::from_bytes(&self.data[offset..offset + Rid::SIZE])
    }

    fn write_entry(&mut self, index: usize, key: i32, rid: Rid) {
        let offset = Self::entry_offset(index);
        LittleEndian::write_i32(&mut self.data[offset..], key);
        self.data[offset + 4..offset + LEAF_ENTRY_SIZE].copy_from_slice(&rid.to_bytes());
    }

    pub fn entries(&self) -> Vec<(i32, Rid)> {
        (0..self.size())
            .map(|i| (self.key_at(i), self.rid_at(i)))
            .collect()
    }

    /// Replace the page contents with `entries`, which must already be sorted.
    pub fn set_entries(&mut self, entries: &[(i32, Rid)]) {
        assert!(entries.len() <= LEAF_PAGE_CAPACITY, "leaf entries exceed page capacity");
        self.data[LEAF_PAGE_HEADER_SIZE..].fill(0);
        for (i, (key, rid)) in entries.iter().enumerate() {
            self.write_entry(i, *key, *rid);
        }
        self.set_size(entries.len());
    }

    /// Binary search: `Ok(index)` when present, `Err(insert_position)` otherwise.
    pub fn key_index(&self, key: i32) -> Result<usize, usize> {
        let (mut lo, mut hi) = (0, self.size());
        while lo < hi {
            let mid = (lo + hi) / 2;
            match self.key_at(mid).cmp(&key) {
                std::cmp::Ordering::Equal => return Ok(mid),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        Err(lo)
    }

    pub fn lookup(&self, key: i32) -> Option<Rid> {
        self.key_index(key).ok().map(|i| self.rid_at(i))
    }

    pub fn is_full(&self) -> bool {
        self.size() >= self.max_size()
    }

    /// Insert in sorted position. Fails on a duplicate key or a full page.
    pub fn insert(&mut self, key: i32, rid: Rid) -> bool {
        if self.is_full() {
            return false;
        }
        let index = match self.key_index(key) {
            Ok(_) => return false,
            Err(index) => index,
        };

        let size = self.size();
        let src = Self::entry_offset(index);
        let end = Self::entry_offset(size);
        self.data.copy_within(src..end, src + LEAF_ENTRY_SIZE);
        self.write_entry(index, key, rid);
        self.set_size(size + 1);
        true
    }

    pub fn remove(&mut self, key: i32) -> bool {
        let index = match self.key_index(key) {
            Ok(index) => index,
            Err(_) => return false,
        };

        let size = self.size();
        let src = Self::entry_offset(index + 1);
        let end = Self::entry_offset(size);
        self.data.copy_within(src..end, Self::entry_offset(index));
        let last = Self::entry_offset(size - 1);
        self.data[last..last + LEAF_ENTRY_SIZE].fill(0);
        self.set_size(size - 1);
        true
    }
}

impl BTreePage for BTreeLeafPage {
    fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }
}
