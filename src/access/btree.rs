//! B+Tree index from `i32` keys to row locators.
//!
//! Tree pages live in the same data file as heap pages and are read and
//! written through the same [`PageManager`]. Inserts split full nodes
//! bottom-up, creating a new root when the old one splits. Removal only
//! deletes the leaf entry; nodes are never merged or rebalanced.

use crate::access::tuple::Rid;
use crate::storage::error::StorageError;
use crate::storage::page::btree_internal_page::INTERNAL_PAGE_CAPACITY;
use crate::storage::page::btree_leaf_page::LEAF_PAGE_CAPACITY;
use crate::storage::page::btree_page::write_parent_page_id;
use crate::storage::page::{BTreeInternalPage, BTreeLeafPage, BTreePage, IndexPageType, PageId};
use crate::storage::{PageManager, PAGE_SIZE};
use anyhow::Result;
use log::debug;
use std::sync::Arc;

pub struct BPlusTree {
    store: Arc<PageManager>,
    root_page_id: PageId,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl BPlusTree {
    /// Empty tree with node capacities derived from the page size.
    pub fn new(store: Arc<PageManager>) -> Self {
        Self::with_max_sizes(store, LEAF_PAGE_CAPACITY, INTERNAL_PAGE_CAPACITY)
    }

    /// Empty tree with explicit node capacities, clamped to what a page holds.
    ///
    /// An internal node needs at least three children so both halves of a
    /// split keep two.
    pub fn with_max_sizes(
        store: Arc<PageManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Self {
        Self {
            store,
            root_page_id: PageId::INVALID,
            leaf_max_size: leaf_max_size.clamp(1, LEAF_PAGE_CAPACITY),
            internal_max_size: internal_max_size.clamp(3, INTERNAL_PAGE_CAPACITY),
        }
    }

    /// Reattach to a tree rooted at `root_page_id`.
    ///
    /// Node capacities are stored per page, so the values passed at creation
    /// keep applying to existing nodes.
    pub fn open(store: Arc<PageManager>, root_page_id: PageId) -> Result<Self> {
        let mut tree = Self::new(store);
        tree.root_page_id = root_page_id;
        if root_page_id.is_valid() {
            let data = tree.read_node(root_page_id)?;
            match IndexPageType::of(&data[..]) {
                IndexPageType::Leaf => {
                    tree.leaf_max_size = BTreeLeafPage::from_data(data).max_size();
                }
                IndexPageType::Internal => {
                    tree.internal_max_size = BTreeInternalPage::from_data(data).max_size();
                    let leaf = tree.find_leaf(i32::MIN)?.1;
                    tree.leaf_max_size = leaf.max_size();
                }
                IndexPageType::Invalid => {
                    return Err(corrupt(root_page_id, "root is not a tree page"))
                }
            }
        }
        Ok(tree)
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn is_empty(&self) -> bool {
        !self.root_page_id.is_valid()
    }

    pub fn get(&self, key: i32) -> Result<Option<Rid>> {
        if self.is_empty() {
            return Ok(None);
        }
        let (_, leaf) = self.find_leaf(key)?;
        Ok(leaf.lookup(key))
    }

    /// Insert `key -> rid`. Returns `false` and changes nothing if the key
    /// is already present.
    pub fn insert(&mut self, key: i32, rid: Rid) -> Result<bool> {
        if self.is_empty() {
            let root_id = self.store.allocate_page()?;
            let mut root = BTreeLeafPage::new(root_id, PageId::INVALID, self.leaf_max_size);
            root.insert(key, rid);
            self.write_node(root_id, root.data())?;
            self.root_page_id = root_id;
            debug!("started B+Tree with leaf root {}", root_id);
            return Ok(true);
        }

        let (mut path, mut leaf) = self.find_leaf(key)?;
        if leaf.lookup(key).is_some() {
            return Ok(false);
        }

        if !leaf.is_full() {
            leaf.insert(key, rid);
            self.write_node(leaf.page_id(), leaf.data())?;
            return Ok(true);
        }

        let mut entries = leaf.entries();
        let position = match leaf.key_index(key) {
            Ok(position) | Err(position) => position,
        };
        entries.insert(position, (key, rid));

        let mid = entries.len() / 2;
        let left_id = leaf.page_id();
        let right_id = self.store.allocate_page()?;
        let mut right = BTreeLeafPage::new(right_id, leaf.parent_page_id(), leaf.max_size());
        right.set_entries(&entries[mid..]);
        right.set_next_page_id(leaf.next_page_id());
        leaf.set_entries(&entries[..mid]);
        leaf.set_next_page_id(right_id);

        // The new sibling is written before anything points at it.
        self.write_node(right_id, right.data())?;
        self.write_node(left_id, leaf.data())?;
        debug!("split leaf {} into {} at key {}", left_id, right_id, entries[mid].0);

        self.insert_into_parent(&mut path, left_id, entries[mid].0, right_id)?;
        Ok(true)
    }

    /// Remove `key`. Returns whether it was present.
    pub fn remove(&mut self, key: i32) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        let (_, mut leaf) = self.find_leaf(key)?;
        if !leaf.remove(key) {
            return Ok(false);
        }
        self.write_node(leaf.page_id(), leaf.data())?;
        Ok(true)
    }

    /// Entries with `lo <= key <= hi`, in key order.
    pub fn range(&self, lo: i32, hi: i32) -> Result<Vec<(i32, Rid)>> {
        let mut result = Vec::new();
        if self.is_empty() || lo > hi {
            return Ok(result);
        }

        let (_, mut leaf) = self.find_leaf(lo)?;
        loop {
            for (key, rid) in leaf.entries() {
                if key > hi {
                    return Ok(result);
                }
                if key >= lo {
                    result.push((key, rid));
                }
            }

            let next = leaf.next_page_id();
            if !next.is_valid() {
                return Ok(result);
            }
            leaf = self.read_leaf(next)?;
        }
    }

    /// Descend to the leaf that may hold `key`, returning the internal pages
    /// visited on the way (root first) and the leaf.
    fn find_leaf(&self, key: i32) -> Result<(Vec<PageId>, BTreeLeafPage)> {
        let mut path = Vec::new();
        let mut page_id = self.root_page_id;

        loop {
            let data = self.read_node(page_id)?;
            match IndexPageType::of(&data[..]) {
                IndexPageType::Leaf => return Ok((path, BTreeLeafPage::from_data(data))),
                IndexPageType::Internal => {
                    let node = BTreeInternalPage::from_data(data);
                    if node.size() == 0 {
                        return Err(corrupt(page_id, "internal node has no children"));
                    }
                    path.push(page_id);
                    page_id = node.lookup(key);
                }
                IndexPageType::Invalid => return Err(corrupt(page_id, "not a tree page")),
            }
        }
    }

    /// Link `right` into the tree as the sibling after `left`, separated by
    /// `key`. Splits the parent when it overflows, recursing upward.
    fn insert_into_parent(
        &mut self,
        path: &mut Vec<PageId>,
        left: PageId,
        key: i32,
        right: PageId,
    ) -> Result<()> {
        let Some(parent_id) = path.pop() else {
            let root_id = self.store.allocate_page()?;
            let mut root = BTreeInternalPage::new(root_id, PageId::INVALID, self.internal_max_size);
            root.populate_new_root(left, key, right);
            self.write_node(root_id, root.data())?;
            self.set_parent(left, root_id)?;
            self.set_parent(right, root_id)?;
            self.root_page_id = root_id;
            debug!("new B+Tree root {} over {} and {}", root_id, left, right);
            return Ok(());
        };

        let mut parent = self.read_internal(parent_id)?;
        let index = parent
            .child_index(left)
            .ok_or_else(|| corrupt(parent_id, "split child missing from parent"))?;
        let mut entries = parent.entries();
        entries.insert(index + 1, (key, right));

        if entries.len() <= parent.max_size() {
            parent.set_entries(&entries);
            self.write_node(parent_id, parent.data())?;
            return self.set_parent(right, parent_id);
        }

        // entries[mid]'s key moves up; it stays behind as the new node's sentinel.
        let mid = entries.len() / 2;
        let push_up = entries[mid].0;
        let sibling_id = self.store.allocate_page()?;
        let mut sibling =
            BTreeInternalPage::new(sibling_id, parent.parent_page_id(), parent.max_size());
        sibling.set_entries(&entries[mid..]);
        parent.set_entries(&entries[..mid]);

        self.write_node(sibling_id, sibling.data())?;
        self.write_node(parent_id, parent.data())?;
        for (_, child) in &entries[..mid] {
            self.set_parent(*child, parent_id)?;
        }
        for (_, child) in &entries[mid..] {
            self.set_parent(*child, sibling_id)?;
        }
        debug!(
            "split internal {} into {} pushing up key {}",
            parent_id, sibling_id, push_up
        );

        self.insert_into_parent(path, parent_id, push_up, sibling_id)
    }

    fn set_parent(&self, page_id: PageId, parent: PageId) -> Result<()> {
        let mut data = self.read_node(page_id)?;
        let current = match IndexPageType::of(&data[..]) {
            IndexPageType::Leaf => BTreeLeafPage::from_data(data.clone()).parent_page_id(),
            IndexPageType::Internal => BTreeInternalPage::from_data(data.clone()).parent_page_id(),
            IndexPageType::Invalid => return Err(corrupt(page_id, "not a tree page")),
        };
        if current != parent {
            write_parent_page_id(&mut data, parent);
            self.write_node(page_id, &data)?;
        }
        Ok(())
    }

    fn read_node(&self, page_id: PageId) -> Result<Box<[u8; PAGE_SIZE]>> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        self.store.read_page(page_id, &mut data[..])?;
        Ok(data)
    }

    fn read_leaf(&self, page_id: PageId) -> Result<BTreeLeafPage> {
        let data = self.read_node(page_id)?;
        if IndexPageType::of(&data[..]) != IndexPageType::Leaf {
            return Err(corrupt(page_id, "expected a leaf page"));
        }
        Ok(BTreeLeafPage::from_data(data))
    }

    fn read_internal(&self, page_id: PageId) -> Result<BTreeInternalPage> {
        let data = self.read_node(page_id)?;
        if IndexPageType::of(&data[..]) != IndexPageType::Internal {
            return Err(corrupt(page_id, "expected an internal page"));
        }
        Ok(BTreeInternalPage::from_data(data))
    }

    fn write_node(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        self.store.write_page(page_id, &data[..])
    }
}

fn corrupt(page_id: PageId, reason: &str) -> anyhow::Error {
    StorageError::CorruptPage {
        page_id: page_id.0,
        reason: reason.to_string(),
    }
    .into()
}
