use crate::storage::page::btree_page::{BTreePage, IndexPageType, BTREE_HEADER_SIZE};
use crate::storage::{PageId, PAGE_SIZE};
use byteorder::{ByteOrder, LittleEndian};

// key (4) + child page id (4)
const INTERNAL_ENTRY_SIZE: usize = 8;

/// Most `(key, child)` entries an internal page can physically hold.
pub const INTERNAL_PAGE_CAPACITY: usize = (PAGE_SIZE - BTREE_HEADER_SIZE) / INTERNAL_ENTRY_SIZE;

/// Internal node: `size` entries of `(key, child_page_id)`.
///
/// The key of entry 0 is never compared; `child[0]` covers everything below
/// `key[1]`, and `child[i]` for `i >= 1` covers `key[i] <= k < key[i + 1]`.
pub struct BTreeInternalPage {
    data: Box<[u8; PAGE_SIZE]>,
}

impl BTreeInternalPage {
    pub fn new(page_id: PageId, parent_page_id: PageId, max_size: usize) -> Self {
        let mut page = Self {
            data: Box::new([0; PAGE_SIZE]),
        };
        page.set_page_type(IndexPageType::Internal);
        page.set_lsn(0);
        page.set_size(0);
        page.set_max_size(max_size.min(INTERNAL_PAGE_CAPACITY));
        page.set_parent_page_id(parent_page_id);
        page.set_page_id(page_id);
        page
    }

    pub fn from_data(data: Box<[u8; PAGE_SIZE]>) -> Self {
        Self { data }
    }

    fn entry_offset(index: usize) -> usize {
        BTREE_HEADER_SIZE + index * INTERNAL_ENTRY_SIZE
    }

    pub fn key_at(&self, index: usize) -> i32 {
        LittleEndian::read_i32(&self.data[Self::entry_offset(index)..])
    }

    pub fn child_at(&self, index: usize) -> PageId {
        PageId(LittleEndian::read_i32(&self.data[Self::entry_offset(index) + 4..]))
    }

    pub fn entries(&self) -> Vec<(i32, PageId)> {
        (0..self.size())
            .map(|i| (self.key_at(i), self.child_at(i)))
            .collect()
    }

    pub fn set_entries(&mut self, entries: &[(i32, PageId)]) {
        assert!(
            entries.len() <= INTERNAL_PAGE_CAPACITY,
            "internal entries exceed page capacity"
        );
        self.data[BTREE_HEADER_SIZE..].fill(0);
        for (i, (key, child)) in entries.iter().enumerate() {
            let offset = Self::entry_offset(i);
            LittleEndian::write_i32(&mut self.data[offset..], *key);
            LittleEndian::write_i32(&mut self.data[offset + 4..], child.0);
        }
        self.set_size(entries.len());
    }

    /// Position of `child` among this node's pointers.
    pub fn child_index(&self, child: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.child_at(i) == child)
    }

    /// Index of the child whose subtree may contain `key`: the rightmost
    /// entry `i >= 1` with `key[i] <= key`, else entry 0.
    pub fn lookup_index(&self, key: i32) -> usize {
        let (mut lo, mut hi) = (1, self.size());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.key_at(mid) <= key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo - 1
    }

    pub fn lookup(&self, key: i32) -> PageId {
        self.child_at(self.lookup_index(key))
    }

    /// Fill a fresh root with two children split around `key`.
    pub fn populate_new_root(&mut self, left: PageId, key: i32, right: PageId) {
        self.set_entries(&[(0, left), (key, right)]);
    }
}

impl BTreePage for BTreeInternalPage {
    fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }
}
