//! Block allocation for the container
//!
//! Blocks are addressed by integer handles into a growable slot table, never
//! by memory address, so an image can be validated and serialized without
//! pointer fix-ups. Two free lists work together:
//! - Freed slot IDs are reused lowest-first
//! - Freed bytes become extents in the data region, reused best-fit

pub mod extent;

use crate::error::{CarError, Result};
use extent::{Extent, ExtentMap};
use std::collections::BTreeSet;
use std::fmt;

/// Handle to a block in the container's block table
///
/// `BlockRef::NULL` (ID 0) is reserved and never refers to data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockRef(u32);

impl BlockRef {
    pub const NULL: BlockRef = BlockRef(0);

    pub fn from_raw(id: u32) -> Self {
        BlockRef(id)
    }

    pub fn id(self) -> u32 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    offset: usize,
    length: usize,
}

/// Slot table plus the data region the slots point into
#[derive(Debug, Clone)]
pub struct BlockAllocator {
    /// Slot 0 is the null block and always `None`
    slots: Vec<Option<Slot>>,

    /// Reclaimed slot IDs
    free_ids: BTreeSet<u32>,

    /// Block bytes, offsets are relative to the start of this region
    data: Vec<u8>,

    /// Reclaimed byte ranges of `data`
    extents: ExtentMap,
}

impl BlockAllocator {
    pub fn new() -> Self {
        BlockAllocator {
            slots: vec![None],
            free_ids: BTreeSet::new(),
            data: Vec::new(),
            extents: ExtentMap::new(),
        }
    }

    /// Rebuild an allocator from a decoded image
    ///
    /// `data` is the image's data region verbatim. `table` holds each slot's
    /// `(offset, length)` relative to that region, `None` for the null slot
    /// and freed slots, which become reusable IDs. `free` seeds the extent
    /// map. Live blocks and free extents must not overlap one another.
    pub fn from_image(
        data: Vec<u8>,
        table: Vec<Option<(usize, usize)>>,
        free: Vec<Extent>,
    ) -> Result<Self> {
        let mut ranges: Vec<(usize, usize)> = table
            .iter()
            .flatten()
            .copied()
            .chain(free.iter().map(|e| (e.start, e.length)))
            .filter(|(_, length)| *length > 0)
            .collect();
        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            let (start, length) = pair[0];
            if start + length > pair[1].0 {
                return Err(CarError::corrupt(format!(
                    "data ranges {}..{} and {}..{} overlap",
                    start,
                    start + length,
                    pair[1].0,
                    pair[1].0 + pair[1].1
                )));
            }
        }

        let mut allocator = BlockAllocator::new();
        allocator.data = data;

        for (id, entry) in table.into_iter().enumerate().skip(1) {
            match entry {
                Some((offset, length)) => {
                    if offset + length > allocator.data.len() {
                        return Err(CarError::corrupt(format!(
                            "block {} ends past the data region",
                            id
                        )));
                    }
                    allocator.slots.push(Some(Slot { offset, length }));
                }
                None => {
                    allocator.slots.push(None);
                    allocator.free_ids.insert(id as u32);
                }
            }
        }

        for extent in free {
            if extent.end() > allocator.data.len() {
                return Err(CarError::corrupt(format!(
                    "free extent {}..{} ends past the data region",
                    extent.start,
                    extent.end()
                )));
            }
            allocator.extents.release(extent);
        }

        Ok(allocator)
    }

    /// Allocate a block holding a copy of `bytes`
    pub fn allocate(&mut self, bytes: &[u8]) -> Result<BlockRef> {
        if bytes.len() > u32::MAX as usize {
            return Err(CarError::BlockTooLarge(bytes.len()));
        }

        let offset = match self.extents.allocate(bytes.len()) {
            Some(offset) => {
                self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
                offset
            }
            None => {
                let offset = self.data.len();
                self.data.extend_from_slice(bytes);
                offset
            }
        };

        let slot = Slot {
            offset,
            length: bytes.len(),
        };

        let id = match self.free_ids.pop_first() {
            Some(id) => {
                self.slots[id as usize] = Some(slot);
                id
            }
            None => {
                let id = slot_id(self.slots.len())?;
                self.slots.push(Some(slot));
                id
            }
        };

        Ok(BlockRef(id))
    }

    /// Free a block, returning its ID and bytes to the free lists
    pub fn free(&mut self, block: BlockRef) -> Result<()> {
        let slot = self.slot(block)?;
        self.data[slot.offset..slot.offset + slot.length].fill(0);
        self.extents.release(Extent::new(slot.offset, slot.length));
        self.slots[block.0 as usize] = None;
        self.free_ids.insert(block.0);
        Ok(())
    }

    /// Borrow a live block's bytes
    pub fn get(&self, block: BlockRef) -> Result<&[u8]> {
        let slot = self.slot(block)?;
        Ok(&self.data[slot.offset..slot.offset + slot.length])
    }

    /// Overwrite a live block with bytes of the same length
    pub fn write_in_place(&mut self, block: BlockRef, bytes: &[u8]) -> Result<()> {
        let slot = self.slot(block)?;
        if slot.length != bytes.len() {
            return Err(CarError::Config(format!(
                "in-place write of {} bytes into block {} of {} bytes",
                bytes.len(),
                block,
                slot.length
            )));
        }
        self.data[slot.offset..slot.offset + slot.length].copy_from_slice(bytes);
        Ok(())
    }

    pub fn contains(&self, block: BlockRef) -> bool {
        self.slot(block).is_ok()
    }

    fn slot(&self, block: BlockRef) -> Result<Slot> {
        self.slots
            .get(block.0 as usize)
            .copied()
            .flatten()
            .ok_or(CarError::InvalidBlockId(block.0))
    }

    /// Release trailing free bytes so the data region ends on a live block
    pub fn trim(&mut self) {
        let end = self.extents.trim_tail(self.data.len());
        self.data.truncate(end);

        // Empty blocks may sit past the new end
        for slot in self.slots.iter_mut().flatten() {
            if slot.length == 0 && slot.offset > end {
                slot.offset = end;
            }
        }
    }

    /// `(offset, length)` for every slot, `None` for null and freed slots
    pub fn table(&self) -> impl Iterator<Item = Option<(usize, usize)>> + '_ {
        self.slots
            .iter()
            .map(|slot| slot.map(|s| (s.offset, s.length)))
    }

    /// Reclaimed byte ranges of the data region
    pub fn free_extents(&self) -> impl Iterator<Item = &Extent> {
        self.extents.iter()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of slots including the null slot
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of live blocks
    pub fn live_blocks(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Number of reclaimed slot IDs awaiting reuse
    pub fn free_ids(&self) -> usize {
        self.free_ids.len()
    }
}

/// ID for the slot at `index`, if the table can still address it
fn slot_id(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| CarError::BlockTableFull(index))
}

impl Default for BlockAllocator {
    fn default() -> Self {
        Self::new()
    }
}
