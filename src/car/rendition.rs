//! Renditions: concrete variants of a facet
//!
//! A rendition is stored in the `RENDITIONS` tree under its encoded key.
//! The tree value is a fixed-layout record (little-endian):
//!
//! ```text
//! "ISTC" | version u32 = 1 | attributes_block u32
//! | width u32 | height u32 | scale u16 (hundredths) | layout u16
//! | file_name_length u16 | file_name bytes
//! | pixel_format u32 | payload_block u32 | payload_length u32
//! ```
//!
//! `attributes_block` holds a copy of the key; `pixel_format`,
//! `payload_block` and `payload_length` are all zero when the rendition has
//! no payload.

use super::attribute::{AttributeIdentifier, AttributeList};
use crate::allocator::BlockRef;
use crate::codec::Decoder;
use crate::error::{CarError, Result};
use bytes::BufMut;
use std::fmt;

pub const RENDITION_MAGIC: &[u8; 4] = b"ISTC";
pub const RENDITION_VERSION: u32 = 1;

/// Largest scale a record can hold, in hundredths
const MAX_SCALE_HUNDREDTHS: f64 = u16::MAX as f64;

/// Float error allowed when a scale is a whole number of hundredths
const SCALE_TOLERANCE: f64 = 1e-6;

/// How a rendition's image is stretched or assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    Gradient,
    Effect,
    OnePartFixedSize,
    OnePartTile,
    #[default]
    OnePartScale,
    ThreePartHorizontalTile,
    ThreePartHorizontalScale,
    ThreePartHorizontalUniform,
    ThreePartVerticalTile,
    ThreePartVerticalScale,
    ThreePartVerticalUniform,
    NinePartTile,
    NinePartScale,
    NinePartHorizontalUniformVerticalScale,
    NinePartHorizontalScaleVerticalUniform,
    NinePartEdgesOnly,
    SixPart,
    AnimationFilmstrip,
    RawData,
    ExternalLink,
    LayerStack,
    InternalLink,
    AssetPack,
    NameList,
    Texture,
    TextureImage,
    Color,
    MultisizeImage,
    Other(u16),
}

impl Layout {
    pub fn from_u16(value: u16) -> Self {
        match value {
            6 => Self::Gradient,
            7 => Self::Effect,
            10 => Self::OnePartFixedSize,
            11 => Self::OnePartTile,
            12 => Self::OnePartScale,
            20 => Self::ThreePartHorizontalTile,
            21 => Self::ThreePartHorizontalScale,
            22 => Self::ThreePartHorizontalUniform,
            23 => Self::ThreePartVerticalTile,
            24 => Self::ThreePartVerticalScale,
            25 => Self::ThreePartVerticalUniform,
            30 => Self::NinePartTile,
            31 => Self::NinePartScale,
            32 => Self::NinePartHorizontalUniformVerticalScale,
            33 => Self::NinePartHorizontalScaleVerticalUniform,
            34 => Self::NinePartEdgesOnly,
            40 => Self::SixPart,
            50 => Self::AnimationFilmstrip,
            1000 => Self::RawData,
            1001 => Self::ExternalLink,
            1002 => Self::LayerStack,
            1003 => Self::InternalLink,
            1004 => Self::AssetPack,
            1005 => Self::NameList,
            1007 => Self::Texture,
            1008 => Self::TextureImage,
            1009 => Self::Color,
            1010 => Self::MultisizeImage,
            other => Self::Other(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            Self::Gradient => 6,
            Self::Effect => 7,
            Self::OnePartFixedSize => 10,
            Self::OnePartTile => 11,
            Self::OnePartScale => 12,
            Self::ThreePartHorizontalTile => 20,
            Self::ThreePartHorizontalScale => 21,
            Self::ThreePartHorizontalUniform => 22,
            Self::ThreePartVerticalTile => 23,
            Self::ThreePartVerticalScale => 24,
            Self::ThreePartVerticalUniform => 25,
            Self::NinePartTile => 30,
            Self::NinePartScale => 31,
            Self::NinePartHorizontalUniformVerticalScale => 32,
            Self::NinePartHorizontalScaleVerticalUniform => 33,
            Self::NinePartEdgesOnly => 34,
            Self::SixPart => 40,
            Self::AnimationFilmstrip => 50,
            Self::RawData => 1000,
            Self::ExternalLink => 1001,
            Self::LayerStack => 1002,
            Self::InternalLink => 1003,
            Self::AssetPack => 1004,
            Self::NameList => 1005,
            Self::Texture => 1007,
            Self::TextureImage => 1008,
            Self::Color => 1009,
            Self::MultisizeImage => 1010,
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(value) => write!(f, "other-{}", value),
            known => write!(f, "{:?}", known),
        }
    }
}

/// Payload encoding, a four-character code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 'ARGB': premultiplied 8-bit BGRA
    PremultipliedBGRA8,
    /// 'GA8 ': premultiplied 8-bit gray + alpha
    PremultipliedGA8,
    /// 'DATA': opaque bytes passed through unchanged
    Data,
    /// 'JPEG'
    Jpeg,
}

impl PixelFormat {
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            Self::PremultipliedBGRA8 => *b"ARGB",
            Self::PremultipliedGA8 => *b"GA8 ",
            Self::Data => *b"DATA",
            Self::Jpeg => *b"JPEG",
        }
    }

    /// Numeric code: the four characters read as a big-endian integer
    pub fn code(self) -> u32 {
        u32::from_be_bytes(self.fourcc())
    }

    pub fn from_code(code: u32) -> Option<Self> {
        [
            Self::PremultipliedBGRA8,
            Self::PremultipliedGA8,
            Self::Data,
            Self::Jpeg,
        ]
        .into_iter()
        .find(|format| format.code() == code)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.fourcc()))
    }
}

/// Owned payload bytes and their encoding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenditionData {
    bytes: Vec<u8>,
    format: PixelFormat,
}

impl RenditionData {
    pub fn new(bytes: Vec<u8>, format: PixelFormat) -> Self {
        RenditionData { bytes, format }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// One concrete variant of a facet
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition {
    attributes: AttributeList,
    width: u32,
    height: u32,
    scale: f64,
    layout: Layout,
    file_name: String,
    data: Option<RenditionData>,
}

impl Rendition {
    /// Header-only rendition at scale 1 with no payload
    pub fn new(attributes: AttributeList) -> Self {
        Rendition {
            attributes,
            width: 0,
            height: 0,
            scale: 1.0,
            layout: Layout::default(),
            file_name: String::new(),
            data: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_data(mut self, data: RenditionData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_attribute(mut self, identifier: AttributeIdentifier, value: impl Into<u16>) -> Self {
        self.attributes.set(identifier, value);
        self
    }

    pub fn attributes(&self) -> &AttributeList {
        &self.attributes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn data(&self) -> Option<&RenditionData> {
        self.data.as_ref()
    }

    pub fn take_data(&mut self) -> Option<RenditionData> {
        self.data.take()
    }
}

/// Scale in hundredths, rejecting values the record cannot hold exactly
pub(crate) fn scale_to_hundredths(scale: f64) -> Result<u16> {
    let exact = scale * 100.0;
    let hundredths = exact.round();
    if !scale.is_finite()
        || scale < 0.0
        || hundredths > MAX_SCALE_HUNDREDTHS
        || (exact - hundredths).abs() > SCALE_TOLERANCE
    {
        return Err(CarError::InvalidScale(scale));
    }
    Ok(hundredths as u16)
}

/// Decoded `RENDITIONS` tree value
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RenditionRecord {
    pub attributes_block: BlockRef,
    pub width: u32,
    pub height: u32,
    pub scale: u16,
    pub layout: u16,
    pub file_name: String,
    pub pixel_format: u32,
    pub payload_block: BlockRef,
    pub payload_length: u32,
}

impl RenditionRecord {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let name = self.file_name.as_bytes();
        let name_len =
            u16::try_from(name.len()).map_err(|_| CarError::FileNameTooLong(name.len()))?;

        let mut bytes = Vec::with_capacity(34 + name.len());
        bytes.put_slice(RENDITION_MAGIC);
        bytes.put_u32_le(RENDITION_VERSION);
        bytes.put_u32_le(self.attributes_block.id());
        bytes.put_u32_le(self.width);
        bytes.put_u32_le(self.height);
        bytes.put_u16_le(self.scale);
        bytes.put_u16_le(self.layout);
        bytes.put_u16_le(name_len);
        bytes.put_slice(name);
        bytes.put_u32_le(self.pixel_format);
        bytes.put_u32_le(self.payload_block.id());
        bytes.put_u32_le(self.payload_length);
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut d = Decoder::new(bytes, "rendition record");

        let magic = d.array::<4>()?;
        if &magic != RENDITION_MAGIC {
            return Err(CarError::corrupt(format!(
                "bad rendition magic {:?}",
                String::from_utf8_lossy(&magic)
            )));
        }
        let version = d.u32_le()?;
        if version != RENDITION_VERSION {
            return Err(CarError::corrupt(format!(
                "unsupported rendition version {}",
                version
            )));
        }

        let attributes_block = BlockRef::from_raw(d.u32_le()?);
        let width = d.u32_le()?;
        let height = d.u32_le()?;
        let scale = d.u16_le()?;
        let layout = d.u16_le()?;
        let name_len = d.u16_le()? as usize;
        let file_name = std::str::from_utf8(d.bytes(name_len)?)
            .map_err(|e| CarError::corrupt(format!("rendition file name is not UTF-8: {}", e)))?
            .to_string();
        let pixel_format = d.u32_le()?;
        let payload_block = BlockRef::from_raw(d.u32_le()?);
        let payload_length = d.u32_le()?;
        d.finish()?;

        let has_format = pixel_format != 0;
        let has_block = !payload_block.is_null();
        if has_format != has_block || (!has_block && payload_length != 0) {
            return Err(CarError::corrupt(format!(
                "rendition {} has inconsistent payload fields",
                file_name
            )));
        }

        Ok(RenditionRecord {
            attributes_block,
            width,
            height,
            scale,
            layout,
            file_name,
            pixel_format,
            payload_block,
            payload_length,
        })
    }
}
