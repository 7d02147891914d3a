//! Variable table: named roots of the container
//!
//! Each variable maps a short name (at most 255 bytes) to a block. Trees
//! are reached through a variable pointing at their header block; plain
//! records such as a key format use a variable pointing at the record.
//! Order of first insertion is preserved on disk.

use crate::allocator::BlockRef;
use crate::codec::Decoder;
use crate::error::{CarError, Result};
use bytes::BufMut;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vars {
    entries: Vec<(String, BlockRef)>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<BlockRef> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, block)| *block)
    }

    /// Point `name` at `block`, returning the block it pointed at before
    pub fn set(&mut self, name: &str, block: BlockRef) -> Result<Option<BlockRef>> {
        if name.len() > u8::MAX as usize {
            return Err(CarError::NameTooLong(name.to_string()));
        }

        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            let previous = entry.1;
            entry.1 = block;
            return Ok(Some(previous));
        }

        self.entries.push((name.to_string(), block));
        Ok(None)
    }

    pub fn remove(&mut self, name: &str) -> Option<BlockRef> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, BlockRef)> {
        self.entries.iter().map(|(n, b)| (n.as_str(), *b))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Layout (big-endian): count u32, then per variable block u32,
    /// name length u8, name bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.put_u32(self.entries.len() as u32);
        for (name, block) in &self.entries {
            bytes.put_u32(block.id());
            bytes.put_u8(name.len() as u8);
            bytes.put_slice(name.as_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut d = Decoder::new(bytes, "variable table");
        let count = d.u32_be()? as usize;

        let mut entries = Vec::with_capacity(count.min(d.remaining() / 5));
        for _ in 0..count {
            let block = BlockRef::from_raw(d.u32_be()?);
            let len = d.u8()? as usize;
            let name = std::str::from_utf8(d.bytes(len)?)
                .map_err(|_| CarError::corrupt("variable name is not UTF-8"))?;
            if entries.iter().any(|(existing, _)| existing == name) {
                return Err(CarError::corrupt(format!("variable {} is repeated", name)));
            }
            entries.push((name.to_string(), block));
        }
        d.finish()?;

        Ok(Vars { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_replace() {
        let mut vars = Vars::new();
        assert_eq!(vars.set("KEYFORMAT", BlockRef::from_raw(3)).unwrap(), None);
        assert_eq!(vars.get("KEYFORMAT"), Some(BlockRef::from_raw(3)));

        let previous = vars.set("KEYFORMAT", BlockRef::from_raw(8)).unwrap();
        assert_eq!(previous, Some(BlockRef::from_raw(3)));
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("missing"), None);
    }

    #[test]
    fn test_serialization_preserves_order() {
        let mut vars = Vars::new();
        vars.set("RENDITIONS", BlockRef::from_raw(2)).unwrap();
        vars.set("FACETKEYS", BlockRef::from_raw(1)).unwrap();

        let decoded = Vars::from_bytes(&vars.to_bytes()).unwrap();
        let names: Vec<_> = decoded.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["RENDITIONS", "FACETKEYS"]);
        assert_eq!(decoded, vars);
    }

    #[test]
    fn test_decode_rejects_repeats_and_trailing_bytes() {
        let mut vars = Vars::new();
        vars.set("KEYFORMAT", BlockRef::from_raw(1)).unwrap();
        let mut bytes = vars.to_bytes();

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(Vars::from_bytes(&trailing).unwrap_err().is_corrupt());

        // Same entry twice, count bumped to match
        let entry = bytes[4..].to_vec();
        bytes.extend_from_slice(&entry);
        bytes[..4].copy_from_slice(&2u32.to_be_bytes());
        assert!(Vars::from_bytes(&bytes).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_name_too_long() {
        let mut vars = Vars::new();
        let name = "x".repeat(256);
        assert!(matches!(
            vars.set(&name, BlockRef::from_raw(1)),
            Err(CarError::NameTooLong(_))
        ));
    }

    #[test]
    fn test_truncated_table() {
        let mut vars = Vars::new();
        vars.set("CARHEADER", BlockRef::from_raw(1)).unwrap();
        let bytes = vars.to_bytes();
        assert!(Vars::from_bytes(&bytes[..bytes.len() - 2])
            .unwrap_err()
            .is_corrupt());
    }
}
