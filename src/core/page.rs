use crate::allocator::BlockRef;
use crate::codec::Decoder;
use crate::error::{CarError, Result};
use bytes::BufMut;

pub const TREE_MAGIC: [u8; 4] = *b"tree";
pub const TREE_VERSION: u32 = 1;

/// Default size of a paths page, which bounds entries per page
pub const DEFAULT_PAGE_SIZE: u32 = 4096;

/// Smallest page size that still holds a few entries per page
pub const MIN_PAGE_SIZE: u32 = 64;

/// Tree header block
///
/// The block a tree's variable points at. Layout (big-endian):
/// magic "tree", version, root paths block, page size, entry count, and
/// one reserved byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHeader {
    pub root: BlockRef,
    pub page_size: u32,
    pub entry_count: u32,
}

impl TreeHeader {
    pub const fn size() -> usize {
        4 + 4 + 4 + 4 + 4 + 1
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::size());
        bytes.put_slice(&TREE_MAGIC);
        bytes.put_u32(TREE_VERSION);
        bytes.put_u32(self.root.id());
        bytes.put_u32(self.page_size);
        bytes.put_u32(self.entry_count);
        bytes.put_u8(0);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut d = Decoder::new(bytes, "tree header");

        let magic: [u8; 4] = d.array()?;
        if magic != TREE_MAGIC {
            return Err(CarError::corrupt("invalid tree magic"));
        }

        let version = d.u32_be()?;
        if version != TREE_VERSION {
            return Err(CarError::corrupt(format!(
                "unsupported tree version: {}",
                version
            )));
        }

        let root = BlockRef::from_raw(d.u32_be()?);
        let page_size = d.u32_be()?;
        let entry_count = d.u32_be()?;
        let _reserved = d.u8()?;

        Ok(TreeHeader {
            root,
            page_size,
            entry_count,
        })
    }
}

/// One `(value, key)` reference pair in a paths page
///
/// In a leaf, `value` is the value block. In a branch, `value` is the child
/// page and `key` is the last key stored under that child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathEntry {
    pub value: BlockRef,
    pub key: BlockRef,
}

/// One node of a tree
///
/// Layout (big-endian): is_leaf u16, count u16, forward u32, backward u32,
/// then `count` entries of (value u32, key u32). Leaves are chained through
/// forward/backward; branches leave both zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathsPage {
    pub is_leaf: bool,
    pub forward: BlockRef,
    pub backward: BlockRef,
    pub entries: Vec<PathEntry>,
}

impl PathsPage {
    /// Fixed part of a page
    pub const fn header_size() -> usize {
        2 + 2 + 4 + 4
    }

    /// Entries that fit in a page of `page_size` bytes
    pub fn capacity(page_size: u32) -> usize {
        ((page_size as usize).saturating_sub(Self::header_size()) / 8).min(u16::MAX as usize)
    }

    pub fn leaf(entries: Vec<PathEntry>) -> Self {
        PathsPage {
            is_leaf: true,
            forward: BlockRef::NULL,
            backward: BlockRef::NULL,
            entries,
        }
    }

    pub fn branch(entries: Vec<PathEntry>) -> Self {
        PathsPage {
            is_leaf: false,
            forward: BlockRef::NULL,
            backward: BlockRef::NULL,
            entries,
        }
    }

    /// Encoded length in bytes
    pub fn encoded_len(&self) -> usize {
        Self::header_size() + self.entries.len() * 8
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.put_u16(u16::from(self.is_leaf));
        bytes.put_u16(self.entries.len() as u16);
        bytes.put_u32(self.forward.id());
        bytes.put_u32(self.backward.id());
        for entry in &self.entries {
            bytes.put_u32(entry.value.id());
            bytes.put_u32(entry.key.id());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut d = Decoder::new(bytes, "paths page");

        let is_leaf = match d.u16_be()? {
            0 => false,
            1 => true,
            other => {
                return Err(CarError::corrupt(format!(
                    "invalid paths page leaf flag: {}",
                    other
                )))
            }
        };
        let count = d.u16_be()? as usize;
        let forward = BlockRef::from_raw(d.u32_be()?);
        let backward = BlockRef::from_raw(d.u32_be()?);

        let mut entries = Vec::with_capacity(count.min(d.remaining() / 8));
        for _ in 0..count {
            entries.push(PathEntry {
                value: BlockRef::from_raw(d.u32_be()?),
                key: BlockRef::from_raw(d.u32_be()?),
            });
        }

        Ok(PathsPage {
            is_leaf,
            forward,
            backward,
            entries,
        })
    }
}
