//! Rendition key format
//!
//! The key format is the ordered list of attribute identifiers that every
//! rendition key is built from. A key is one big-endian `u32` per
//! identifier, so the container's unsigned byte ordering of keys equals the
//! numeric ordering of their attribute values taken in declared order.

use super::attribute::{AttributeIdentifier, AttributeList};
use crate::codec::Decoder;
use crate::error::{CarError, Result};
use bytes::BufMut;
use tracing::warn;

/// Magic of the `KEYFORMAT` record
pub const KEY_FORMAT_MAGIC: &[u8; 4] = b"kfmt";

/// Ordered identifier list, fixed once per archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyFormat {
    identifiers: Vec<AttributeIdentifier>,
}

impl KeyFormat {
    /// Create a key format; repeated identifiers keep their first position
    pub fn new<I>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = AttributeIdentifier>,
    {
        let mut unique: Vec<AttributeIdentifier> = Vec::new();
        for id in identifiers {
            if unique.contains(&id) {
                warn!("Key format repeats attribute {}, keeping first", id);
                continue;
            }
            unique.push(id);
        }
        KeyFormat { identifiers: unique }
    }

    pub fn identifiers(&self) -> &[AttributeIdentifier] {
        &self.identifiers
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn contains(&self, identifier: AttributeIdentifier) -> bool {
        self.identifiers.contains(&identifier)
    }

    /// Length in bytes of every key built from this format
    pub fn key_len(&self) -> usize {
        self.identifiers.len() * 4
    }

    /// Encode a rendition key; absent identifiers are written as 0
    ///
    /// Attributes outside the key format are not representable and are
    /// left out.
    pub fn encode(&self, attributes: &AttributeList) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.key_len());
        for id in &self.identifiers {
            key.put_u32(u32::from(attributes.get(*id).unwrap_or(0)));
        }
        key
    }

    /// The attributes a rendition keeps through a write and load: every
    /// key format identifier, absent ones as 0, nothing else
    pub fn normalize(&self, attributes: &AttributeList) -> AttributeList {
        self.identifiers
            .iter()
            .map(|id| (*id, attributes.get(*id).unwrap_or(0)))
            .collect()
    }

    /// Decode a rendition key into a list holding every identifier
    pub fn decode(&self, key: &[u8]) -> Result<AttributeList> {
        if key.len() != self.key_len() {
            return Err(CarError::corrupt(format!(
                "rendition key is {} bytes, key format needs {}",
                key.len(),
                self.key_len()
            )));
        }

        let mut d = Decoder::new(key, "rendition key");
        let mut attributes = AttributeList::new();
        for id in &self.identifiers {
            let raw = d.u32_be()?;
            let value = u16::try_from(raw).map_err(|_| {
                CarError::corrupt(format!("key field {} holds {} (over u16)", id, raw))
            })?;
            attributes.set(*id, value);
        }
        d.finish()?;

        Ok(attributes)
    }

    /// `KEYFORMAT` record (little-endian): magic, reserved u32 = 0,
    /// count u32, count × identifier u32
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(12 + self.identifiers.len() * 4);
        bytes.put_slice(KEY_FORMAT_MAGIC);
        bytes.put_u32_le(0);
        bytes.put_u32_le(self.identifiers.len() as u32);
        for id in &self.identifiers {
            bytes.put_u32_le(u32::from(id.to_u16()));
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut d = Decoder::new(bytes, "key format");

        let magic = d.array::<4>()?;
        if &magic != KEY_FORMAT_MAGIC {
            return Err(CarError::corrupt(format!(
                "bad key format magic {:?}",
                String::from_utf8_lossy(&magic)
            )));
        }
        let _reserved = d.u32_le()?;

        let count = d.u32_le()? as usize;
        if count > d.remaining() / 4 {
            return Err(CarError::corrupt(format!(
                "key format declares {} identifiers in {} bytes",
                count,
                d.remaining()
            )));
        }

        let mut identifiers = Vec::with_capacity(count);
        for _ in 0..count {
            let raw = d.u32_le()?;
            let raw = u16::try_from(raw).map_err(|_| {
                CarError::corrupt(format!("key format identifier {} over u16", raw))
            })?;
            let id = AttributeIdentifier::from_u16(raw);
            if identifiers.contains(&id) {
                return Err(CarError::corrupt(format!(
                    "key format repeats attribute {}",
                    id
                )));
            }
            identifiers.push(id);
        }
        d.finish()?;

        Ok(KeyFormat { identifiers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AttributeIdentifier::*;

    #[test]
    fn test_encode_layout() {
        let format = KeyFormat::new([Scale, Idiom, Identifier]);
        let attrs = AttributeList::new()
            .with(Identifier, 0x0102u16)
            .with(Scale, 2u16);

        assert_eq!(
            format.encode(&attrs),
            vec![0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0x01, 0x02]
        );
    }

    #[test]
    fn test_decode_fills_absent_with_zero() {
        let format = KeyFormat::new([Scale, Idiom, Identifier]);
        let attrs = AttributeList::new().with(Scale, 3u16);
        let decoded = format.decode(&format.encode(&attrs)).unwrap();

        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.get(Scale), Some(3));
        assert_eq!(decoded.get(Idiom), Some(0));
        assert_eq!(decoded.get(Identifier), Some(0));
    }

    #[test]
    fn test_attributes_outside_format_dropped() {
        let format = KeyFormat::new([Scale]);
        let attrs = AttributeList::new().with(Scale, 1u16).with(Part, 9u16);
        let decoded = format.decode(&format.encode(&attrs)).unwrap();
        assert_eq!(decoded.get(Part), None);
    }

    #[test]
    fn test_key_order_follows_attribute_values() {
        let format = KeyFormat::new([Identifier, Scale]);
        let low = format.encode(&AttributeList::new().with(Identifier, 1u16).with(Scale, 300u16));
        let high = format.encode(&AttributeList::new().with(Identifier, 2u16).with(Scale, 1u16));
        assert!(low < high);
    }

    #[test]
    fn test_normalize_matches_decode() {
        let format = KeyFormat::new([Scale, Idiom]);
        let attrs = AttributeList::new().with(Scale, 2u16).with(Part, 3u16);
        let normalized = format.normalize(&attrs);

        assert_eq!(normalized, format.decode(&format.encode(&attrs)).unwrap());
        assert_eq!(normalized.get(Idiom), Some(0));
        assert_eq!(normalized.get(Part), None);
    }

    #[test]
    fn test_decode_rejects_bad_keys() {
        let format = KeyFormat::new([Scale, Idiom]);
        assert!(format.decode(&[0u8; 7]).unwrap_err().is_corrupt());
        assert!(format.decode(&[0u8; 12]).unwrap_err().is_corrupt());

        let wide = [0, 1, 0, 0, 0, 0, 0, 0];
        assert!(format.decode(&wide).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_empty_format() {
        let format = KeyFormat::new(Vec::new());
        assert!(format.encode(&AttributeList::new().with(Scale, 1u16)).is_empty());
        assert!(format.decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_new_drops_repeats() {
        let format = KeyFormat::new([Scale, Idiom, Scale]);
        assert_eq!(format.identifiers(), &[Scale, Idiom]);
    }

    #[test]
    fn test_record_round_trip() {
        let format = KeyFormat::new([Scale, Idiom, Unknown(40)]);
        let bytes = format.to_bytes();

        assert_eq!(&bytes[..4], b"kfmt");
        assert_eq!(&bytes[8..12], &3u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &12u32.to_le_bytes());
        assert_eq!(KeyFormat::from_bytes(&bytes).unwrap(), format);
    }

    #[test]
    fn test_record_corrupt() {
        let bytes = KeyFormat::new([Scale, Idiom]).to_bytes();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'K';
        assert!(KeyFormat::from_bytes(&bad_magic).unwrap_err().is_corrupt());

        assert!(KeyFormat::from_bytes(&bytes[..bytes.len() - 2])
            .unwrap_err()
            .is_corrupt());

        let mut huge_count = bytes.clone();
        huge_count[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(KeyFormat::from_bytes(&huge_count).unwrap_err().is_corrupt());

        let mut repeated = bytes;
        repeated[16..20].copy_from_slice(&12u32.to_le_bytes());
        assert!(KeyFormat::from_bytes(&repeated).unwrap_err().is_corrupt());
    }
}
