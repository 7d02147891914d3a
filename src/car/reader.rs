//! Archive reader
//!
//! Loading validates the container, decodes the key format and catalog
//! records, and reads the facet and rendition trees once. Everything after
//! that works on the loaded image; a reader never changes.

use super::attribute::AttributeList;
use super::facet::{Facet, FacetInfo};
use super::header::{CarHeader, ExtendedMetadata};
use super::key_format::KeyFormat;
use super::rendition::{Layout, PixelFormat, Rendition, RenditionData, RenditionRecord};
use super::{CAR_HEADER_VAR, EXTENDED_METADATA_VAR, FACET_TREE, KEY_FORMAT_VAR, RENDITION_TREE};
use crate::catalog::TreeEntry;
use crate::error::{CarError, Result};
use crate::io::Filesystem;
use crate::store::{Entry, Store};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct Reader {
    store: Store,
    key_format: KeyFormat,
    header: Option<CarHeader>,
    extended_metadata: Option<ExtendedMetadata>,
    facets: Vec<TreeEntry>,
    renditions: Vec<TreeEntry>,
}

impl Reader {
    /// Load an archive image
    pub fn load(image: &[u8]) -> Result<Self> {
        Self::from_store(Store::load(image)?)
    }

    /// Read an archive through a filesystem
    pub fn open<F: Filesystem>(fs: &F, path: &Path) -> Result<Self> {
        let image = fs.read(path)?;
        debug!("Opening archive {}", path.display());
        Self::load(&image)
    }

    /// Read the catalog held by an already loaded store
    pub fn from_store(store: Store) -> Result<Self> {
        let key_format = match store.var_block(KEY_FORMAT_VAR)? {
            Some(bytes) => KeyFormat::from_bytes(bytes)?,
            None => return Err(CarError::MissingKeyFormat),
        };

        let header = store
            .var_block(CAR_HEADER_VAR)?
            .map(CarHeader::from_bytes)
            .transpose()?;
        let extended_metadata = store
            .var_block(EXTENDED_METADATA_VAR)?
            .map(ExtendedMetadata::from_bytes)
            .transpose()?;

        let facets = Self::tree_entries(&store, FACET_TREE)?;
        let renditions = Self::tree_entries(&store, RENDITION_TREE)?;

        if let Some(header) = &header {
            if header.rendition_count as usize != renditions.len() {
                warn!(
                    "Catalog header declares {} renditions, tree holds {}",
                    header.rendition_count,
                    renditions.len()
                );
            }
        }

        info!(
            "Loaded archive: {} facets, {} renditions, {} key format identifiers",
            facets.len(),
            renditions.len(),
            key_format.len()
        );

        Ok(Reader {
            store,
            key_format,
            header,
            extended_metadata,
            facets,
            renditions,
        })
    }

    fn tree_entries(store: &Store, name: &str) -> Result<Vec<TreeEntry>> {
        Ok(store
            .tree(name)?
            .map(|tree| tree.entries().to_vec())
            .unwrap_or_default())
    }

    pub fn key_format(&self) -> &KeyFormat {
        &self.key_format
    }

    pub fn header(&self) -> Option<&CarHeader> {
        self.header.as_ref()
    }

    pub fn extended_metadata(&self) -> Option<&ExtendedMetadata> {
        self.extended_metadata.as_ref()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    pub fn rendition_count(&self) -> usize {
        self.renditions.len()
    }

    /// Visit every facet in ascending name order
    ///
    /// The first error, from decoding or from the callback, stops the walk
    /// and is returned unchanged.
    pub fn facet_iterate<F, E>(&self, mut callback: F) -> std::result::Result<(), E>
    where
        F: FnMut(&Facet) -> std::result::Result<(), E>,
        E: From<CarError>,
    {
        for entry in &self.facets {
            let entry = self.store.entry(entry)?;
            let facet = Facet::from_entry(entry.key, entry.value)?;
            callback(&facet)?;
        }
        Ok(())
    }

    /// All facets in ascending name order
    pub fn facets(&self) -> Result<Vec<Facet>> {
        let mut facets = Vec::with_capacity(self.facets.len());
        self.facet_iterate(|facet| -> Result<()> {
            facets.push(facet.clone());
            Ok(())
        })?;
        Ok(facets)
    }

    /// First facet with this name
    pub fn lookup_facet(&self, name: &str) -> Result<Option<Facet>> {
        for entry in &self.facets {
            let entry = self.store.entry(entry)?;
            if entry.key == name.as_bytes() {
                return Facet::from_entry(entry.key, entry.value).map(Some);
            }
            if entry.key > name.as_bytes() {
                break;
            }
        }
        Ok(None)
    }

    /// Visit every rendition in ascending key order
    pub fn rendition_iterate<F, E>(&self, mut callback: F) -> std::result::Result<(), E>
    where
        F: FnMut(&Rendition) -> std::result::Result<(), E>,
        E: From<CarError>,
    {
        for entry in &self.renditions {
            let entry = self.store.entry(entry)?;
            let attributes = self.key_format.decode(entry.key)?;
            let rendition = self.decode_rendition(&entry, attributes)?;
            callback(&rendition)?;
        }
        Ok(())
    }

    /// Every rendition whose attributes agree with the facet's pattern
    ///
    /// Identifiers the facet does not name are wildcards. Results are in
    /// key order and unranked; no match is an empty result. Any key or
    /// matching record that fails to decode fails the whole lookup.
    pub fn lookup_renditions(&self, facet: &Facet) -> Result<Vec<Rendition>> {
        let pattern = facet.attributes();
        let mut matches = Vec::new();

        for entry in &self.renditions {
            let entry = self.store.entry(entry)?;
            let attributes = self.key_format.decode(entry.key)?;
            if !attributes.matches(pattern) {
                continue;
            }
            matches.push(self.decode_rendition(&entry, attributes)?);
        }

        debug!(
            "Facet '{}' matched {} of {} renditions",
            facet.name(),
            matches.len(),
            self.renditions.len()
        );

        Ok(matches)
    }

    fn decode_rendition(&self, entry: &Entry<'_>, attributes: AttributeList) -> Result<Rendition> {
        let record = RenditionRecord::from_bytes(entry.value)?;

        let stored_key = self.store.block(record.attributes_block).map_err(|_| {
            CarError::corrupt(format!(
                "rendition {} attributes block {} is missing",
                record.file_name, record.attributes_block
            ))
        })?;
        if stored_key != entry.key {
            return Err(CarError::corrupt(format!(
                "rendition {} attributes block does not match its key",
                record.file_name
            )));
        }

        let mut rendition = Rendition::new(attributes)
            .with_size(record.width, record.height)
            .with_scale(f64::from(record.scale) / 100.0)
            .with_layout(Layout::from_u16(record.layout));

        if !record.payload_block.is_null() {
            let format = PixelFormat::from_code(record.pixel_format).ok_or_else(|| {
                CarError::corrupt(format!(
                    "rendition {} has unknown pixel format {:#010x}",
                    record.file_name, record.pixel_format
                ))
            })?;
            let payload = self.store.block(record.payload_block).map_err(|_| {
                CarError::corrupt(format!(
                    "rendition {} payload block {} is missing",
                    record.file_name, record.payload_block
                ))
            })?;
            if payload.len() != record.payload_length as usize {
                return Err(CarError::corrupt(format!(
                    "rendition {} payload is {} bytes, record says {}",
                    record.file_name,
                    payload.len(),
                    record.payload_length
                )));
            }
            rendition = rendition.with_data(RenditionData::new(payload.to_vec(), format));
        }

        Ok(rendition.with_file_name(record.file_name))
    }

    /// Summary of the catalog for inspection tooling
    pub fn info(&self) -> Result<CatalogInfo> {
        let facets = self.facets()?.iter().map(FacetInfo::from).collect();

        let mut renditions = Vec::with_capacity(self.renditions.len());
        self.rendition_iterate(|rendition| -> Result<()> {
            renditions.push(RenditionInfo::from(rendition));
            Ok(())
        })?;

        Ok(CatalogInfo {
            header: self.header.clone(),
            extended_metadata: self.extended_metadata.clone(),
            key_format: self
                .key_format
                .identifiers()
                .iter()
                .map(|id| id.name())
                .collect(),
            facets,
            renditions,
        })
    }

    /// [`Reader::info`] as pretty-printed JSON
    pub fn info_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.info()?)?)
    }
}

/// Serializable catalog summary
#[derive(Debug, Clone, Serialize)]
pub struct CatalogInfo {
    pub header: Option<CarHeader>,
    pub extended_metadata: Option<ExtendedMetadata>,
    pub key_format: Vec<String>,
    pub facets: Vec<FacetInfo>,
    pub renditions: Vec<RenditionInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenditionInfo {
    pub file_name: String,
    pub attributes: Vec<(String, u16)>,
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    pub layout: String,
    pub pixel_format: Option<String>,
    pub payload_length: usize,
}

impl From<&Rendition> for RenditionInfo {
    fn from(rendition: &Rendition) -> Self {
        RenditionInfo {
            file_name: rendition.file_name().to_string(),
            attributes: rendition
                .attributes()
                .iter()
                .map(|(id, value)| (id.name(), value))
                .collect(),
            width: rendition.width(),
            height: rendition.height(),
            scale: rendition.scale(),
            layout: rendition.layout().to_string(),
            pixel_format: rendition.data().map(|d| d.format().to_string()),
            payload_length: rendition.data().map(|d| d.bytes().len()).unwrap_or(0),
        }
    }
}
