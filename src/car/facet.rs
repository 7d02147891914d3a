//! Facets: named, indexed entries for logical assets
//!
//! A facet's key in the `FACETKEYS` tree is its name bytes; its value is
//! the attribute pattern its renditions are found by.

use super::attribute::{AttributeIdentifier, AttributeList};
use crate::error::{CarError, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Facet {
    name: String,
    attributes: AttributeList,
}

impl Facet {
    pub fn new(name: impl Into<String>, attributes: AttributeList) -> Self {
        Facet {
            name: name.into(),
            attributes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &AttributeList {
        &self.attributes
    }

    pub fn set_attribute(&mut self, identifier: AttributeIdentifier, value: impl Into<u16>) {
        self.attributes.set(identifier, value);
    }

    pub fn with_attribute(mut self, identifier: AttributeIdentifier, value: impl Into<u16>) -> Self {
        self.attributes.set(identifier, value);
        self
    }

    /// Tree key and value for this facet
    pub(crate) fn to_entry(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        Ok((self.name.as_bytes().to_vec(), self.attributes.to_facet_bytes()?))
    }

    pub(crate) fn from_entry(key: &[u8], value: &[u8]) -> Result<Self> {
        let name = std::str::from_utf8(key)
            .map_err(|e| CarError::corrupt(format!("facet name is not UTF-8: {}", e)))?;
        let attributes = AttributeList::from_facet_bytes(value)?;
        Ok(Facet::new(name, attributes))
    }
}

/// Serializable view of a facet for inspection output
#[derive(Debug, Clone, Serialize)]
pub struct FacetInfo {
    pub name: String,
    pub attributes: Vec<(String, u16)>,
}

impl From<&Facet> for FacetInfo {
    fn from(facet: &Facet) -> Self {
        FacetInfo {
            name: facet.name.clone(),
            attributes: facet
                .attributes
                .iter()
                .map(|(id, value)| (id.name(), value))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::attribute::Idiom;

    #[test]
    fn test_entry_round_trip() {
        let facet = Facet::new("testpattern", AttributeList::new())
            .with_attribute(AttributeIdentifier::Idiom, Idiom::Universal)
            .with_attribute(AttributeIdentifier::Scale, 2u16)
            .with_attribute(AttributeIdentifier::Identifier, 1u16);

        let (key, value) = facet.to_entry().unwrap();
        assert_eq!(key, b"testpattern");
        assert_eq!(Facet::from_entry(&key, &value).unwrap(), facet);
    }

    #[test]
    fn test_non_utf8_name_is_corrupt() {
        let value = AttributeList::new().to_facet_bytes().unwrap();
        assert!(Facet::from_entry(&[0xff, 0xfe], &value)
            .unwrap_err()
            .is_corrupt());
    }

    #[test]
    fn test_info() {
        let facet = Facet::new("button", AttributeList::new())
            .with_attribute(AttributeIdentifier::Identifier, 4u16);
        let info = FacetInfo::from(&facet);
        assert_eq!(info.name, "button");
        assert_eq!(info.attributes, vec![("identifier".to_string(), 4)]);
    }
}
