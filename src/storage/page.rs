pub mod btree_internal_page;
pub mod btree_leaf_page;
pub mod btree_page;
pub mod heap_page;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based page number within the data file; `-1` means "no page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub i32);

impl PageId {
    pub const INVALID: PageId = PageId(-1);

    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub use btree_internal_page::BTreeInternalPage;
pub use btree_leaf_page::BTreeLeafPage;
pub use btree_page::{BTreePage, IndexPageType};
pub use heap_page::HeapPage;
