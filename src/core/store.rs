//! The container store
//!
//! A store is a block allocator, a variable table of named roots, and a set
//! of named sorted trees. It is built and edited in memory; `serialize`
//! produces an image and `load` validates and decodes one.
//!
//! Image layout (big-endian):
//!
//! ```text
//! [header 512 bytes][block data][block table + free list][variable table]
//! ```
//!
//! The variable table always ends the image, so any truncation leaves it
//! out of range and the load fails.

use crate::allocator::extent::Extent;
use crate::allocator::{BlockAllocator, BlockRef};
use crate::catalog::{Catalog, Tree, TreeEntry};
use crate::codec::Decoder;
use crate::error::{CarError, Result};
use crate::header::{check_range, Header, HEADER_SIZE};
use crate::page::{DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::vars::Vars;
use bytes::BufMut;
use tracing::debug;

/// One key/value pair borrowed from a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
    pub key_block: BlockRef,
    pub value_block: BlockRef,
}

#[derive(Debug, Clone)]
pub struct Store {
    blocks: BlockAllocator,
    vars: Vars,
    catalog: Catalog,
    page_size: u32,
}

impl Store {
    /// Create an empty store with the default tree page size
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create an empty store whose new trees use `page_size` byte pages
    pub fn with_page_size(page_size: u32) -> Self {
        Store {
            blocks: BlockAllocator::new(),
            vars: Vars::new(),
            catalog: Catalog::new(),
            page_size: page_size.max(MIN_PAGE_SIZE),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Allocate a block holding a copy of `bytes`
    pub fn allocate(&mut self, bytes: &[u8]) -> Result<BlockRef> {
        self.blocks.allocate(bytes)
    }

    /// Free a block
    pub fn free(&mut self, block: BlockRef) -> Result<()> {
        self.blocks.free(block)
    }

    /// Borrow a block's bytes
    pub fn block(&self, block: BlockRef) -> Result<&[u8]> {
        self.blocks.get(block)
    }

    pub fn contains_block(&self, block: BlockRef) -> bool {
        self.blocks.contains(block)
    }

    /// Point a variable at a live block
    pub fn set_var(&mut self, name: &str, block: BlockRef) -> Result<()> {
        if !self.blocks.contains(block) {
            return Err(CarError::InvalidBlockId(block.id()));
        }
        self.vars.set(name, block)?;
        Ok(())
    }

    pub fn var(&self, name: &str) -> Option<BlockRef> {
        self.vars.get(name).filter(|b| !b.is_null())
    }

    /// Bytes of the block a variable points at
    pub fn var_block(&self, name: &str) -> Result<Option<&[u8]>> {
        match self.var(name) {
            Some(block) => Ok(Some(self.blocks.get(block)?)),
            None => Ok(None),
        }
    }

    /// Variable names in table order
    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(|(name, _)| name)
    }

    /// Insert a key/value pair into a named tree, creating the tree if it
    /// does not exist. Equal keys are kept, after existing ones.
    pub fn insert(&mut self, tree: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let index = self
            .catalog
            .open(tree, &mut self.vars, &mut self.blocks, self.page_size)?;

        let key = self.blocks.allocate(key)?;
        let value = self.blocks.allocate(value)?;
        index.insert(&self.blocks, TreeEntry { key, value })
    }

    /// Remove the first pair with this key, freeing its blocks
    pub fn remove(&mut self, tree: &str, key: &[u8]) -> Result<bool> {
        if !self.catalog.is_open(tree) && self.var(tree).is_none() {
            return Ok(false);
        }

        let index = self
            .catalog
            .open(tree, &mut self.vars, &mut self.blocks, self.page_size)?;

        match index.remove(&self.blocks, key)? {
            Some(entry) => {
                self.blocks.free(entry.key)?;
                self.blocks.free(entry.value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Value of the first pair with this key
    pub fn lookup(&self, tree: &str, key: &[u8]) -> Result<Option<&[u8]>> {
        let Some(index) = self.tree(tree)? else {
            return Ok(None);
        };

        match index.find(&self.blocks, key)? {
            Some(entry) => Ok(Some(self.blocks.get(entry.value)?)),
            None => Ok(None),
        }
    }

    /// All pairs of a tree in ascending key order; empty if it does not exist
    pub fn iterate(&self, tree: &str) -> Result<Vec<Entry<'_>>> {
        match self.tree(tree)? {
            Some(index) => self.entries(&index),
            None => Ok(Vec::new()),
        }
    }

    /// Snapshot of a tree's index
    pub fn tree(&self, name: &str) -> Result<Option<Tree>> {
        self.catalog.read(name, &self.vars, &self.blocks)
    }

    /// Resolve a tree index into borrowed pairs
    pub fn entries(&self, index: &Tree) -> Result<Vec<Entry<'_>>> {
        index
            .entries()
            .iter()
            .map(|e| self.entry(e))
            .collect()
    }

    /// Resolve one tree entry
    pub fn entry(&self, entry: &TreeEntry) -> Result<Entry<'_>> {
        Ok(Entry {
            key: self.blocks.get(entry.key)?,
            value: self.blocks.get(entry.value)?,
            key_block: entry.key,
            value_block: entry.value,
        })
    }

    /// Number of live blocks
    pub fn live_blocks(&self) -> usize {
        self.blocks.live_blocks()
    }

    /// Produce an image of the store
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut image = self.clone();
        image.catalog.flush(&mut image.vars, &mut image.blocks)?;
        image.blocks.trim();
        image.encode()
    }

    fn encode(&self) -> Result<Vec<u8>> {
        for (name, block) in self.vars.iter() {
            if !self.blocks.contains(block) {
                return Err(CarError::corrupt(format!(
                    "variable {} points at missing block {}",
                    name, block
                )));
            }
        }

        let data = self.blocks.data();

        let mut index = Vec::new();
        index.put_u32(self.blocks.slot_count() as u32);
        for slot in self.blocks.table() {
            match slot {
                Some((offset, length)) => {
                    index.put_u32(to_u32(HEADER_SIZE + offset)?);
                    index.put_u32(to_u32(length)?);
                }
                None => {
                    index.put_u32(0);
                    index.put_u32(0);
                }
            }
        }
        let extents: Vec<_> = self.blocks.free_extents().collect();
        index.put_u32(extents.len() as u32);
        for extent in extents {
            index.put_u32(to_u32(HEADER_SIZE + extent.start)?);
            index.put_u32(to_u32(extent.length)?);
        }

        let vars = self.vars.to_bytes();

        let mut header = Header::new();
        header.block_count = to_u32(self.blocks.live_blocks())?;
        header.index_offset = to_u32(HEADER_SIZE + data.len())?;
        header.index_length = to_u32(index.len())?;
        header.vars_offset = to_u32(HEADER_SIZE + data.len() + index.len())?;
        header.vars_length = to_u32(vars.len())?;
        to_u32(HEADER_SIZE + data.len() + index.len() + vars.len())?;

        let mut image = header.to_bytes();
        image.reserve(data.len() + index.len() + vars.len());
        image.put_slice(data);
        image.put_slice(&index);
        image.put_slice(&vars);

        debug!(
            "Serialized store: {} bytes, {} live blocks, {} variables",
            image.len(),
            header.block_count,
            self.vars.len()
        );

        Ok(image)
    }

    /// Validate and decode an image
    pub fn load(image: &[u8]) -> Result<Self> {
        let header = Header::from_bytes(image)?;
        header.validate(image.len())?;

        let index_start = header.index_offset as usize;
        let index = &image[index_start..index_start + header.index_length as usize];
        let mut d = Decoder::new(index, "block table");

        // Blocks and free extents live between the header and the tables
        let data_end = header.index_offset.min(header.vars_offset) as usize;

        let count = d.u32_be()? as usize;
        if count == 0 {
            return Err(CarError::corrupt("block table has no null entry"));
        }

        let mut table: Vec<Option<(usize, usize)>> =
            Vec::with_capacity(count.min(d.remaining() / 8));
        for id in 0..count {
            let address = d.u32_be()?;
            let length = d.u32_be()?;

            if address == 0 && length == 0 {
                table.push(None);
                continue;
            }
            if id == 0 {
                return Err(CarError::corrupt("null block has contents"));
            }

            check_range("block", address, length, data_end)?;
            table.push(Some((address as usize - HEADER_SIZE, length as usize)));
        }

        let free_count = d.u32_be()? as usize;
        let mut free = Vec::with_capacity(free_count.min(d.remaining() / 8));
        for _ in 0..free_count {
            let address = d.u32_be()?;
            let length = d.u32_be()?;
            if length > 0 {
                check_range("free extent", address, length, data_end)?;
                free.push(Extent::new(address as usize - HEADER_SIZE, length as usize));
            }
        }
        d.finish()?;

        let live = table.iter().filter(|b| b.is_some()).count();
        if live != header.block_count as usize {
            return Err(CarError::corrupt(format!(
                "header declares {} blocks but table holds {}",
                header.block_count, live
            )));
        }

        let vars_start = header.vars_offset as usize;
        let vars = Vars::from_bytes(&image[vars_start..vars_start + header.vars_length as usize])?;
        for (name, block) in vars.iter() {
            let live = table
                .get(block.id() as usize)
                .is_some_and(|b| b.is_some());
            if !live {
                return Err(CarError::corrupt(format!(
                    "variable {} points at missing block {}",
                    name, block
                )));
            }
        }

        debug!(
            "Loaded store: {} bytes, {} live blocks, {} variables",
            image.len(),
            live,
            vars.len()
        );

        let data = image[HEADER_SIZE..data_end].to_vec();
        Ok(Store {
            blocks: BlockAllocator::from_image(data, table, free)?,
            vars,
            catalog: Catalog::new(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| CarError::BlockTooLarge(value))
}
