//! Named trees of the container
//!
//! A tree becomes "open" the first time it is modified. Opening a tree
//! that already exists in the image decodes it and frees the pages it
//! occupied; pages are rebuilt from the in-memory index on serialize.
//! Trees that are only read stay in their on-disk form.

pub mod tree;

pub use tree::{LoadedTree, Tree, TreeEntry};

use crate::allocator::{BlockAllocator, BlockRef};
use crate::error::Result;
use crate::vars::Vars;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::debug;

/// Open trees by variable name
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    open: BTreeMap<String, Tree>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a tree for modification, decoding it from the image if needed
    pub fn open(
        &mut self,
        name: &str,
        vars: &mut Vars,
        blocks: &mut BlockAllocator,
        page_size: u32,
    ) -> Result<&mut Tree> {
        let slot = match self.open.entry(name.to_string()) {
            Entry::Occupied(open) => return Ok(open.into_mut()),
            Entry::Vacant(slot) => slot,
        };

        let tree = match vars.get(name) {
            Some(header) => {
                let loaded = Tree::read(blocks, header)?;
                for page in &loaded.pages {
                    blocks.free(*page)?;
                }
                // Re-pointed at the rebuilt header on flush
                vars.set(name, BlockRef::NULL)?;
                debug!("Opened tree {} ({} entries)", name, loaded.tree.len());
                loaded.tree
            }
            None => {
                debug!("Created tree {}", name);
                Tree::new(page_size)
            }
        };

        Ok(slot.insert(tree))
    }

    /// Get a tree for reading
    ///
    /// Open trees are cloned; others are decoded from the image.
    pub fn read(&self, name: &str, vars: &Vars, blocks: &BlockAllocator) -> Result<Option<Tree>> {
        if let Some(tree) = self.open.get(name) {
            return Ok(Some(tree.clone()));
        }

        match vars.get(name) {
            Some(header) => Ok(Some(Tree::read(blocks, header)?.tree)),
            None => Ok(None),
        }
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.open.contains_key(name)
    }

    /// Write every open tree and point its variable at the new header
    pub fn flush(&self, vars: &mut Vars, blocks: &mut BlockAllocator) -> Result<()> {
        for (name, tree) in &self.open {
            let header = tree.write(blocks)?;
            vars.set(name, header)?;
        }
        Ok(())
    }
}
