//! Sorted key/value index stored as a paged tree
//!
//! In memory a tree is a sorted array of `(key block, value block)` pairs.
//! On disk it is a header block plus paths pages:
//! - Leaf pages hold the entries in key order, chained forward/backward
//! - Branch pages hold `(child page, last key under child)` pairs
//! - Pages are built bottom-up until a single root remains
//!
//! Keys compare as unsigned bytes. Duplicate keys are allowed and keep
//! their insertion order.

use crate::allocator::{BlockAllocator, BlockRef};
use crate::error::{CarError, Result};
use crate::page::{PathEntry, PathsPage, TreeHeader, MIN_PAGE_SIZE};
use std::collections::HashSet;
use tracing::debug;

/// Deepest tree accepted when reading
pub const MAX_DEPTH: usize = 32;

/// One indexed pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEntry {
    pub key: BlockRef,
    pub value: BlockRef,
}

/// A tree decoded from an image, with the pages it occupied
#[derive(Debug, Clone)]
pub struct LoadedTree {
    pub tree: Tree,
    /// Header block followed by every paths page
    pub pages: Vec<BlockRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
    page_size: u32,
}

impl Tree {
    pub fn new(page_size: u32) -> Self {
        Tree {
            entries: Vec::new(),
            page_size: page_size.max(MIN_PAGE_SIZE),
        }
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// First index whose key fails `before`
    fn partition<F>(&self, blocks: &BlockAllocator, before: F) -> Result<usize>
    where
        F: Fn(&[u8]) -> bool,
    {
        let (mut lo, mut hi) = (0, self.entries.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if before(blocks.get(self.entries[mid].key)?) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Index of the first entry with key >= `key`
    pub fn lower_bound(&self, blocks: &BlockAllocator, key: &[u8]) -> Result<usize> {
        self.partition(blocks, |k| k < key)
    }

    /// Index of the first entry with key > `key`
    pub fn upper_bound(&self, blocks: &BlockAllocator, key: &[u8]) -> Result<usize> {
        self.partition(blocks, |k| k <= key)
    }

    /// Insert after any entries with an equal key
    pub fn insert(&mut self, blocks: &BlockAllocator, entry: TreeEntry) -> Result<()> {
        let key = blocks.get(entry.key)?;
        let idx = self.upper_bound(blocks, key)?;
        self.entries.insert(idx, entry);
        Ok(())
    }

    /// First entry with exactly this key
    pub fn find(&self, blocks: &BlockAllocator, key: &[u8]) -> Result<Option<TreeEntry>> {
        let idx = self.lower_bound(blocks, key)?;
        match self.entries.get(idx) {
            Some(entry) if blocks.get(entry.key)? == key => Ok(Some(*entry)),
            _ => Ok(None),
        }
    }

    /// Remove the first entry with exactly this key
    pub fn remove(&mut self, blocks: &BlockAllocator, key: &[u8]) -> Result<Option<TreeEntry>> {
        let idx = self.lower_bound(blocks, key)?;
        match self.entries.get(idx) {
            Some(entry) if blocks.get(entry.key)? == key => Ok(Some(self.entries.remove(idx))),
            _ => Ok(None),
        }
    }

    /// Decode the tree whose header lives in `header_block`
    ///
    /// Every referenced page, key, and value must be a live block, pages
    /// may not repeat, and keys must come out in ascending order.
    pub fn read(blocks: &BlockAllocator, header_block: BlockRef) -> Result<LoadedTree> {
        let header = TreeHeader::from_bytes(blocks.get(header_block).map_err(dangling)?)?;
        if header.page_size < MIN_PAGE_SIZE {
            return Err(CarError::corrupt(format!(
                "tree page size {} below minimum {}",
                header.page_size, MIN_PAGE_SIZE
            )));
        }

        let mut walk = Walk {
            blocks,
            visited: HashSet::new(),
            pages: vec![header_block],
            entries: Vec::new(),
        };
        walk.page(header.root, 0)?;

        if walk.entries.len() != header.entry_count as usize {
            return Err(CarError::corrupt(format!(
                "tree declares {} entries but holds {}",
                header.entry_count,
                walk.entries.len()
            )));
        }

        for pair in walk.entries.windows(2) {
            if blocks.get(pair[0].key)? > blocks.get(pair[1].key)? {
                return Err(CarError::corrupt("tree keys out of order"));
            }
        }

        debug!(
            "Read tree at {} with {} entries in {} pages",
            header_block,
            walk.entries.len(),
            walk.pages.len() - 1
        );

        Ok(LoadedTree {
            tree: Tree {
                entries: walk.entries,
                page_size: header.page_size,
            },
            pages: walk.pages,
        })
    }

    /// Allocate pages and a header block for this tree
    ///
    /// Returns the header block.
    pub fn write(&self, blocks: &mut BlockAllocator) -> Result<BlockRef> {
        let capacity = PathsPage::capacity(self.page_size);

        // Leaves, allocated first so their IDs can be linked
        let chunks: Vec<&[TreeEntry]> = if self.entries.is_empty() {
            vec![&self.entries[..]]
        } else {
            self.entries.chunks(capacity).collect()
        };

        let mut leaves = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let page = PathsPage::leaf(
                chunk
                    .iter()
                    .map(|e| PathEntry {
                        value: e.value,
                        key: e.key,
                    })
                    .collect(),
            );
            let id = blocks.allocate(&page.to_bytes())?;
            leaves.push((id, page));
        }

        for i in 0..leaves.len() {
            let backward = if i > 0 { leaves[i - 1].0 } else { BlockRef::NULL };
            let forward = leaves.get(i + 1).map(|l| l.0).unwrap_or(BlockRef::NULL);
            let (id, page) = &mut leaves[i];
            page.backward = backward;
            page.forward = forward;
            blocks.write_in_place(*id, &page.to_bytes())?;
        }

        // (page, last key under page)
        let mut level: Vec<(BlockRef, BlockRef)> = leaves
            .iter()
            .map(|(id, page)| {
                let last = page.entries.last().map(|e| e.key).unwrap_or(BlockRef::NULL);
                (*id, last)
            })
            .collect();

        let mut page_count = level.len();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len() / capacity + 1);
            for group in level.chunks(capacity) {
                let page = PathsPage::branch(
                    group
                        .iter()
                        .map(|&(child, last)| PathEntry {
                            value: child,
                            key: last,
                        })
                        .collect(),
                );
                let id = blocks.allocate(&page.to_bytes())?;
                let last = group.last().map(|g| g.1).unwrap_or(BlockRef::NULL);
                next.push((id, last));
            }
            page_count += next.len();
            level = next;
        }

        let header = TreeHeader {
            root: level[0].0,
            page_size: self.page_size,
            entry_count: self.entries.len() as u32,
        };
        let header_block = blocks.allocate(&header.to_bytes())?;

        debug!(
            "Wrote tree with {} entries in {} pages, header {}",
            self.entries.len(),
            page_count,
            header_block
        );

        Ok(header_block)
    }
}

fn dangling(err: CarError) -> CarError {
    match err {
        CarError::InvalidBlockId(id) => {
            CarError::corrupt(format!("reference to missing block {}", id))
        }
        other => other,
    }
}

struct Walk<'a> {
    blocks: &'a BlockAllocator,
    visited: HashSet<BlockRef>,
    pages: Vec<BlockRef>,
    entries: Vec<TreeEntry>,
}

impl Walk<'_> {
    fn page(&mut self, page_ref: BlockRef, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(CarError::corrupt("tree exceeds maximum depth"));
        }
        if !self.visited.insert(page_ref) {
            return Err(CarError::corrupt(format!(
                "tree page {} referenced twice",
                page_ref
            )));
        }
        self.pages.push(page_ref);

        let page = PathsPage::from_bytes(self.blocks.get(page_ref).map_err(dangling)?)?;

        for entry in &page.entries {
            if !self.blocks.contains(entry.key) && !(entry.key.is_null() && !page.is_leaf) {
                return Err(CarError::corrupt(format!(
                    "tree entry references missing key block {}",
                    entry.key
                )));
            }
        }

        if page.is_leaf {
            for entry in &page.entries {
                if !self.blocks.contains(entry.value) {
                    return Err(CarError::corrupt(format!(
                        "tree entry references missing value block {}",
                        entry.value
                    )));
                }
                self.entries.push(TreeEntry {
                    key: entry.key,
                    value: entry.value,
                });
            }
        } else {
            for entry in &page.entries {
                self.page(entry.value, depth + 1)?;
            }
        }

        Ok(())
    }
}
