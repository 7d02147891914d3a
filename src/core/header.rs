use crate::codec::Decoder;
use crate::error::{CarError, Result};
use bytes::BufMut;

pub const MAGIC: [u8; 8] = *b"BOMStore";
pub const VERSION: u32 = 1;

/// Size of the header region at the start of every image
pub const HEADER_SIZE: usize = 512;

/// Container header (offset 0)
///
/// Occupies the first 512 bytes of an image and points at the block table
/// (index) and the variable table (vars). All fields are big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Magic number: "BOMStore"
    pub magic: [u8; 8],

    /// Format version (always 1)
    pub version: u32,

    /// Number of live (non-null) blocks in the block table
    pub block_count: u32,

    /// Absolute offset of the block table
    pub index_offset: u32,

    /// Length of the block table, free list included
    pub index_length: u32,

    /// Absolute offset of the variable table
    pub vars_offset: u32,

    /// Length of the variable table
    pub vars_length: u32,
}

impl Header {
    /// Create a new header with empty ranges
    pub fn new() -> Self {
        Header {
            magic: MAGIC,
            version: VERSION,
            block_count: 0,
            index_offset: 0,
            index_length: 0,
            vars_offset: 0,
            vars_length: 0,
        }
    }

    /// Validate the magic, version, and that both tables lie inside an
    /// image of `image_len` bytes without overlapping the header
    pub fn validate(&self, image_len: usize) -> Result<()> {
        if self.magic != MAGIC {
            return Err(CarError::corrupt("invalid magic number in header"));
        }

        if self.version != VERSION {
            return Err(CarError::corrupt(format!(
                "unsupported container version: {}",
                self.version
            )));
        }

        check_range("block table", self.index_offset, self.index_length, image_len)?;
        check_range("variable table", self.vars_offset, self.vars_length, image_len)?;

        Ok(())
    }

    /// Serialize header to bytes (full HEADER_SIZE)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);

        bytes.put_slice(&self.magic);
        bytes.put_u32(self.version);
        bytes.put_u32(self.block_count);
        bytes.put_u32(self.index_offset);
        bytes.put_u32(self.index_length);
        bytes.put_u32(self.vars_offset);
        bytes.put_u32(self.vars_length);

        // Pad to HEADER_SIZE
        bytes.resize(HEADER_SIZE, 0);

        bytes
    }

    /// Deserialize header from the start of an image
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CarError::corrupt(format!(
                "truncated header: {} bytes (expected at least {})",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let mut d = Decoder::new(&bytes[..HEADER_SIZE], "header");
        Ok(Header {
            magic: d.array()?,
            version: d.u32_be()?,
            block_count: d.u32_be()?,
            index_offset: d.u32_be()?,
            index_length: d.u32_be()?,
            vars_offset: d.u32_be()?,
            vars_length: d.u32_be()?,
        })
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that `[offset, offset + length)` lies after the header and ends at
/// or before `limit`
pub fn check_range(what: &str, offset: u32, length: u32, limit: usize) -> Result<()> {
    let start = offset as usize;
    let end = start
        .checked_add(length as usize)
        .ok_or_else(|| CarError::corrupt(format!("{} range overflows", what)))?;

    if start < HEADER_SIZE || end > limit {
        return Err(CarError::corrupt(format!(
            "{} range {}..{} outside {}..{}",
            what, start, end, HEADER_SIZE, limit
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_creation() {
        let header = Header::new();
        assert_eq!(header.magic, MAGIC);
        assert_eq!(header.version, VERSION);
        assert_eq!(header.block_count, 0);
    }

    #[test]
    fn test_header_serialization() {
        let mut header = Header::new();
        header.block_count = 7;
        header.index_offset = 600;
        header.index_length = 68;
        header.vars_offset = 668;
        header.vars_length = 40;

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[..8], b"BOMStore");
        assert_eq!(&bytes[8..12], &[0, 0, 0, 1]);

        let deserialized = Header::from_bytes(&bytes).unwrap();
        assert_eq!(deserialized, header);
    }

    #[test]
    fn test_invalid_magic() {
        let mut header = Header::new();
        header.magic = *b"NOTABOM!";
        assert!(header.validate(HEADER_SIZE).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_invalid_version() {
        let mut header = Header::new();
        header.version = 2;
        header.index_offset = HEADER_SIZE as u32;
        header.vars_offset = HEADER_SIZE as u32;
        assert!(header.validate(HEADER_SIZE).is_err());
    }

    #[test]
    fn test_range_outside_image() {
        let mut header = Header::new();
        header.index_offset = HEADER_SIZE as u32;
        header.index_length = 8;
        header.vars_offset = HEADER_SIZE as u32 + 8;
        header.vars_length = 4;
        assert!(header.validate(HEADER_SIZE + 12).is_ok());
        assert!(header.validate(HEADER_SIZE + 11).is_err());
    }

    #[test]
    fn test_range_overlapping_header() {
        assert!(check_range("x", 100, 4, 1024).is_err());
        assert!(check_range("x", u32::MAX, u32::MAX, 1024).is_err());
    }

    #[test]
    fn test_short_buffer() {
        let err = Header::from_bytes(&[0u8; 100]).unwrap_err();
        assert!(err.is_corrupt());
    }
}
