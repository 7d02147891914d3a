//! Attribute identifiers and attribute lists
//!
//! An attribute list is a sparse map from identifier to a 16-bit value. On
//! a facet it is a match pattern (absent = any value); on a rendition it is
//! the concrete selector set (absent = 0).

use crate::codec::Decoder;
use crate::error::{CarError, Result};
use bytes::BufMut;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Selector dimension of a rendition
///
/// Numeric values are part of the archive format. Values outside the known
/// set are kept as `Unknown` and written back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeIdentifier {
    Element,
    Part,
    Size,
    Direction,
    Placeholder,
    Value,
    Appearance,
    Dimension1,
    Dimension2,
    State,
    Layer,
    Scale,
    Localization,
    PresentationState,
    Idiom,
    Subtype,
    Identifier,
    PreviousValue,
    PreviousState,
    SizeClassHorizontal,
    SizeClassVertical,
    MemoryClass,
    GraphicsClass,
    DisplayGamut,
    DeploymentTarget,
    GlyphWeight,
    GlyphSize,
    Unknown(u16),
}

impl AttributeIdentifier {
    /// Every known identifier in numeric order
    pub const KNOWN: [AttributeIdentifier; 27] = [
        Self::Element,
        Self::Part,
        Self::Size,
        Self::Direction,
        Self::Placeholder,
        Self::Value,
        Self::Appearance,
        Self::Dimension1,
        Self::Dimension2,
        Self::State,
        Self::Layer,
        Self::Scale,
        Self::Localization,
        Self::PresentationState,
        Self::Idiom,
        Self::Subtype,
        Self::Identifier,
        Self::PreviousValue,
        Self::PreviousState,
        Self::SizeClassHorizontal,
        Self::SizeClassVertical,
        Self::MemoryClass,
        Self::GraphicsClass,
        Self::DisplayGamut,
        Self::DeploymentTarget,
        Self::GlyphWeight,
        Self::GlyphSize,
    ];

    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::Element,
            2 => Self::Part,
            3 => Self::Size,
            4 => Self::Direction,
            5 => Self::Placeholder,
            6 => Self::Value,
            7 => Self::Appearance,
            8 => Self::Dimension1,
            9 => Self::Dimension2,
            10 => Self::State,
            11 => Self::Layer,
            12 => Self::Scale,
            13 => Self::Localization,
            14 => Self::PresentationState,
            15 => Self::Idiom,
            16 => Self::Subtype,
            17 => Self::Identifier,
            18 => Self::PreviousValue,
            19 => Self::PreviousState,
            20 => Self::SizeClassHorizontal,
            21 => Self::SizeClassVertical,
            22 => Self::MemoryClass,
            23 => Self::GraphicsClass,
            24 => Self::DisplayGamut,
            25 => Self::DeploymentTarget,
            26 => Self::GlyphWeight,
            27 => Self::GlyphSize,
            other => Self::Unknown(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            Self::Element => 1,
            Self::Part => 2,
            Self::Size => 3,
            Self::Direction => 4,
            Self::Placeholder => 5,
            Self::Value => 6,
            Self::Appearance => 7,
            Self::Dimension1 => 8,
            Self::Dimension2 => 9,
            Self::State => 10,
            Self::Layer => 11,
            Self::Scale => 12,
            Self::Localization => 13,
            Self::PresentationState => 14,
            Self::Idiom => 15,
            Self::Subtype => 16,
            Self::Identifier => 17,
            Self::PreviousValue => 18,
            Self::PreviousState => 19,
            Self::SizeClassHorizontal => 20,
            Self::SizeClassVertical => 21,
            Self::MemoryClass => 22,
            Self::GraphicsClass => 23,
            Self::DisplayGamut => 24,
            Self::DeploymentTarget => 25,
            Self::GlyphWeight => 26,
            Self::GlyphSize => 27,
            Self::Unknown(value) => value,
        }
    }

    /// Short lowercase name, `unknown-<n>` for unknown identifiers
    pub fn name(self) -> String {
        let name = match self {
            Self::Element => "element",
            Self::Part => "part",
            Self::Size => "size",
            Self::Direction => "direction",
            Self::Placeholder => "placeholder",
            Self::Value => "value",
            Self::Appearance => "appearance",
            Self::Dimension1 => "dimension1",
            Self::Dimension2 => "dimension2",
            Self::State => "state",
            Self::Layer => "layer",
            Self::Scale => "scale",
            Self::Localization => "localization",
            Self::PresentationState => "presentation_state",
            Self::Idiom => "idiom",
            Self::Subtype => "subtype",
            Self::Identifier => "identifier",
            Self::PreviousValue => "previous_value",
            Self::PreviousState => "previous_state",
            Self::SizeClassHorizontal => "size_class_horizontal",
            Self::SizeClassVertical => "size_class_vertical",
            Self::MemoryClass => "memory_class",
            Self::GraphicsClass => "graphics_class",
            Self::DisplayGamut => "display_gamut",
            Self::DeploymentTarget => "deployment_target",
            Self::GlyphWeight => "glyph_weight",
            Self::GlyphSize => "glyph_size",
            Self::Unknown(value) => return format!("unknown-{}", value),
        };
        name.to_string()
    }
}

impl Ord for AttributeIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_u16().cmp(&other.to_u16())
    }
}

impl PartialOrd for AttributeIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<u16> for AttributeIdentifier {
    fn from(value: u16) -> Self {
        Self::from_u16(value)
    }
}

impl From<AttributeIdentifier> for u16 {
    fn from(identifier: AttributeIdentifier) -> Self {
        identifier.to_u16()
    }
}

impl fmt::Display for AttributeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Device family, the value of [`AttributeIdentifier::Idiom`]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Idiom {
    Universal = 0,
    Phone = 1,
    Pad = 2,
    Tv = 3,
    Car = 4,
    Watch = 5,
    Marketing = 6,
}

impl From<Idiom> for u16 {
    fn from(idiom: Idiom) -> Self {
        idiom as u16
    }
}

/// Value of the size class attributes
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Unspecified = 0,
    Compact = 1,
    Regular = 2,
}

impl From<SizeClass> for u16 {
    fn from(size_class: SizeClass) -> Self {
        size_class as u16
    }
}

/// Sparse identifier → value map
///
/// Iteration and encoding follow identifier numeric order; insertion order
/// is not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AttributeList {
    values: BTreeMap<AttributeIdentifier, u16>,
}

impl AttributeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pairs; a repeated identifier keeps its last value
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (AttributeIdentifier, u16)>,
    {
        AttributeList {
            values: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, identifier: AttributeIdentifier) -> Option<u16> {
        self.values.get(&identifier).copied()
    }

    pub fn set(&mut self, identifier: AttributeIdentifier, value: impl Into<u16>) {
        self.values.insert(identifier, value.into());
    }

    /// Builder-style `set`
    pub fn with(mut self, identifier: AttributeIdentifier, value: impl Into<u16>) -> Self {
        self.set(identifier, value);
        self
    }

    pub fn remove(&mut self, identifier: AttributeIdentifier) -> Option<u16> {
        self.values.remove(&identifier)
    }

    pub fn contains(&self, identifier: AttributeIdentifier) -> bool {
        self.values.contains_key(&identifier)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pairs in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (AttributeIdentifier, u16)> + '_ {
        self.values.iter().map(|(id, value)| (*id, *value))
    }

    /// True when every identifier in `pattern` has the same value here
    ///
    /// Identifiers absent from `pattern` match anything; identifiers
    /// absent here count as 0.
    pub fn matches(&self, pattern: &AttributeList) -> bool {
        pattern
            .iter()
            .all(|(id, value)| self.get(id).unwrap_or(0) == value)
    }

    /// Facet value layout (little-endian): hot spot x u16, hot spot y u16,
    /// count u16, then count × (identifier u16, value u16)
    pub fn to_facet_bytes(&self) -> Result<Vec<u8>> {
        let count = u16::try_from(self.values.len())
            .map_err(|_| CarError::TooManyAttributes(self.values.len()))?;

        let mut bytes = Vec::with_capacity(6 + self.values.len() * 4);
        bytes.put_u16_le(0);
        bytes.put_u16_le(0);
        bytes.put_u16_le(count);
        for (id, value) in self.iter() {
            bytes.put_u16_le(id.to_u16());
            bytes.put_u16_le(value);
        }
        Ok(bytes)
    }

    pub fn from_facet_bytes(bytes: &[u8]) -> Result<Self> {
        let mut d = Decoder::new(bytes, "facet value");
        let _hot_spot_x = d.u16_le()?;
        let _hot_spot_y = d.u16_le()?;
        let count = d.u16_le()?;

        let mut list = AttributeList::new();
        for _ in 0..count {
            let id = AttributeIdentifier::from_u16(d.u16_le()?);
            let value = d.u16_le()?;
            if list.values.insert(id, value).is_some() {
                return Err(CarError::corrupt(format!(
                    "facet value repeats attribute {}",
                    id
                )));
            }
        }
        d.finish()?;

        Ok(list)
    }
}

impl FromIterator<(AttributeIdentifier, u16)> for AttributeList {
    fn from_iter<I: IntoIterator<Item = (AttributeIdentifier, u16)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl fmt::Display for AttributeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (id, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", id, value)?;
        }
        f.write_str("}")
    }
}
