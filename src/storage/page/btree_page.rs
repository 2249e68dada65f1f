//! Header shared by B+Tree leaf and internal pages.
//!
//! ```text
//! | page_type (4) | lsn (4) | size (4) | max_size (4) | parent_page_id (4) | page_id (4) |
//! ```
//!
//! Unlike heap pages, tree pages describe their own kind, so a traversal can
//! decide how to decode a page from its first four bytes.

use crate::storage::page::PageId;
use crate::storage::PAGE_SIZE;
use byteorder::{ByteOrder, LittleEndian};

pub const BTREE_HEADER_SIZE: usize = 24;

const PAGE_TYPE_OFFSET: usize = 0;
const LSN_OFFSET: usize = 4;
const SIZE_OFFSET: usize = 8;
const MAX_SIZE_OFFSET: usize = 12;
const PARENT_PAGE_ID_OFFSET: usize = 16;
const PAGE_ID_OFFSET: usize = 20;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPageType {
    Invalid = 0,
    Leaf = 1,
    Internal = 2,
}

impl IndexPageType {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => IndexPageType::Leaf,
            2 => IndexPageType::Internal,
            _ => IndexPageType::Invalid,
        }
    }

    /// Peek at the kind tag of a raw tree page.
    pub fn of(data: &[u8]) -> Self {
        Self::from_i32(LittleEndian::read_i32(&data[PAGE_TYPE_OFFSET..]))
    }
}

/// Rewrite the parent pointer of a raw tree page of either kind.
pub fn write_parent_page_id(data: &mut [u8; PAGE_SIZE], parent: PageId) {
    LittleEndian::write_i32(&mut data[PARENT_PAGE_ID_OFFSET..], parent.0);
}

/// Header accessors common to both node kinds.
pub trait BTreePage {
    fn data(&self) -> &[u8; PAGE_SIZE];
    fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE];

    fn page_type(&self) -> IndexPageType {
        IndexPageType::of(self.data())
    }

    fn set_page_type(&mut self, page_type: IndexPageType) {
        LittleEndian::write_i32(&mut self.data_mut()[PAGE_TYPE_OFFSET..], page_type as i32);
    }

    fn is_leaf(&self) -> bool {
        self.page_type() == IndexPageType::Leaf
    }

    fn lsn(&self) -> i32 {
        LittleEndian::read_i32(&self.data()[LSN_OFFSET..])
    }

    fn set_lsn(&mut self, lsn: i32) {
        LittleEndian::write_i32(&mut self.data_mut()[LSN_OFFSET..], lsn);
    }

    fn size(&self) -> usize {
        LittleEndian::read_i32(&self.data()[SIZE_OFFSET..]).max(0) as usize
    }

    fn set_size(&mut self, size: usize) {
        LittleEndian::write_i32(&mut self.data_mut()[SIZE_OFFSET..], size as i32);
    }

    fn max_size(&self) -> usize {
        LittleEndian::read_i32(&self.data()[MAX_SIZE_OFFSET..]).max(0) as usize
    }

    fn set_max_size(&mut self, max_size: usize) {
        LittleEndian::write_i32(&mut self.data_mut()[MAX_SIZE_OFFSET..], max_size as i32);
    }

    fn min_size(&self) -> usize {
        self.max_size() / 2
    }

    fn parent_page_id(&self) -> PageId {
        PageId(LittleEndian::read_i32(&self.data()[PARENT_PAGE_ID_OFFSET..]))
    }

    fn set_parent_page_id(&mut self, parent: PageId) {
        write_parent_page_id(self.data_mut(), parent);
    }

    fn is_root(&self) -> bool {
        !self.parent_page_id().is_valid()
    }

    fn page_id(&self) -> PageId {
        PageId(LittleEndian::read_i32(&self.data()[PAGE_ID_OFFSET..]))
    }

    fn set_page_id(&mut self, page_id: PageId) {
        LittleEndian::write_i32(&mut self.data_mut()[PAGE_ID_OFFSET..], page_id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_type_roundtrip() {
        assert_eq!(IndexPageType::from_i32(1), IndexPageType::Leaf);
        assert_eq!(IndexPageType::from_i32(2), IndexPageType::Internal);
        assert_eq!(IndexPageType::from_i32(0), IndexPageType::Invalid);
        assert_eq!(IndexPageType::from_i32(42), IndexPageType::Invalid);
    }

    #[test]
    fn test_zeroed_page_has_no_kind() {
        let data = [0u8; PAGE_SIZE];
        assert_eq!(IndexPageType::of(&data), IndexPageType::Invalid);
    }

    #[test]
    fn test_write_parent_page_id() {
        let mut data = [0u8; PAGE_SIZE];
        write_parent_page_id(&mut data, PageId(17));
        assert_eq!(LittleEndian::read_i32(&data[PARENT_PAGE_ID_OFFSET..]), 17);
    }
}
