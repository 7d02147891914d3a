//! Archive writer
//!
//! A writer collects facets and renditions in memory, then builds the
//! container in one pass on [`Writer::write`]. It moves from open to
//! written exactly once; every later add or write fails with
//! `AlreadyWritten`.

use super::config::WriterConfig;
use super::facet::Facet;
use super::key_format::KeyFormat;
use super::rendition::{scale_to_hundredths, Rendition, RenditionRecord};
use super::{CAR_HEADER_VAR, EXTENDED_METADATA_VAR, FACET_TREE, KEY_FORMAT_VAR, RENDITION_TREE};
use crate::allocator::BlockRef;
use crate::error::{CarError, Result};
use crate::io::Filesystem;
use crate::store::Store;
use std::path::Path;
use tracing::{debug, info, warn};

/// Rendition waiting for `write`, with its key already encoded
#[derive(Debug, Clone)]
struct PendingRendition {
    key: Vec<u8>,
    rendition: Rendition,
    scale: u16,
}

#[derive(Debug)]
pub struct Writer {
    config: WriterConfig,
    key_format: Option<KeyFormat>,
    facets: Vec<Facet>,
    renditions: Vec<PendingRendition>,
    store: Option<Store>,
}

impl Writer {
    /// Create a writer with default options
    pub fn new() -> Self {
        Writer {
            config: WriterConfig::default(),
            key_format: None,
            facets: Vec::new(),
            renditions: Vec::new(),
            store: None,
        }
    }

    pub fn with_config(config: WriterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Writer {
            config,
            ..Writer::new()
        })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Fix the archive's key format; allowed once
    pub fn set_key_format(&mut self, key_format: KeyFormat) -> Result<()> {
        self.check_open()?;
        if self.key_format.is_some() {
            return Err(CarError::KeyFormatAlreadySet);
        }
        debug!("Key format set: {} identifiers", key_format.len());
        self.key_format = Some(key_format);
        Ok(())
    }

    pub fn key_format(&self) -> Option<&KeyFormat> {
        self.key_format.as_ref()
    }

    /// Queue a facet; facets with the same name are all kept
    pub fn add_facet(&mut self, facet: Facet) -> Result<()> {
        self.check_open()?;
        let count = facet.attributes().len();
        if count > usize::from(u16::MAX) {
            return Err(CarError::TooManyAttributes(count));
        }
        debug!("Adding facet '{}'", facet.name());
        self.facets.push(facet);
        Ok(())
    }

    /// Queue a rendition, encoding its key with the current key format
    pub fn add_rendition(&mut self, rendition: Rendition) -> Result<()> {
        self.check_open()?;
        let key_format = self.key_format.as_ref().ok_or(CarError::MissingKeyFormat)?;

        let scale = scale_to_hundredths(rendition.scale())?;
        let name_len = rendition.file_name().len();
        if name_len > u16::MAX as usize {
            return Err(CarError::FileNameTooLong(name_len));
        }

        for (id, value) in rendition.attributes().iter() {
            if !key_format.contains(id) {
                warn!(
                    "Rendition '{}': attribute {}={} is not in the key format and is dropped",
                    rendition.file_name(),
                    id,
                    value
                );
            }
        }

        let key = key_format.encode(rendition.attributes());
        self.renditions.push(PendingRendition {
            key,
            rendition,
            scale,
        });
        Ok(())
    }

    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    pub fn rendition_count(&self) -> usize {
        self.renditions.len()
    }

    pub fn is_written(&self) -> bool {
        self.store.is_some()
    }

    /// Build the container and return its image
    pub fn write(&mut self) -> Result<Vec<u8>> {
        self.check_open()?;
        let key_format = self.key_format.as_ref().ok_or(CarError::MissingKeyFormat)?;

        let mut store = Store::with_page_size(self.config.page_size);
        let rendition_count = u32::try_from(self.renditions.len())
            .map_err(|_| CarError::Config("too many renditions".to_string()))?;

        let header = store.allocate(&self.config.car_header(rendition_count).to_bytes())?;
        store.set_var(CAR_HEADER_VAR, header)?;

        let format = store.allocate(&key_format.to_bytes())?;
        store.set_var(KEY_FORMAT_VAR, format)?;

        if let Some(metadata) = &self.config.extended_metadata {
            let block = store.allocate(&metadata.to_bytes())?;
            store.set_var(EXTENDED_METADATA_VAR, block)?;
        }

        for facet in &self.facets {
            let (key, value) = facet.to_entry()?;
            store.insert(FACET_TREE, &key, &value)?;
        }

        for pending in &self.renditions {
            let record = Self::store_rendition(&mut store, pending)?;
            store.insert(RENDITION_TREE, &pending.key, &record.to_bytes()?)?;
        }

        let image = store.serialize()?;
        info!(
            "Wrote archive: {} bytes, {} facets, {} renditions",
            image.len(),
            self.facets.len(),
            self.renditions.len()
        );

        self.facets.clear();
        self.renditions.clear();
        self.store = Some(store);
        Ok(image)
    }

    /// Write the archive through a filesystem
    pub fn write_to<F: Filesystem>(&mut self, fs: &mut F, path: &Path) -> Result<()> {
        let image = self.write()?;
        fs.write(path, &image)
    }

    /// The finished container, once written
    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    fn store_rendition(store: &mut Store, pending: &PendingRendition) -> Result<RenditionRecord> {
        let rendition = &pending.rendition;
        let attributes_block = store.allocate(&pending.key)?;

        let (pixel_format, payload_block, payload_length) = match rendition.data() {
            Some(data) => {
                let length = u32::try_from(data.bytes().len())
                    .map_err(|_| CarError::BlockTooLarge(data.bytes().len()))?;
                let block = store.allocate(data.bytes())?;
                (data.format().code(), block, length)
            }
            None => (0, BlockRef::NULL, 0),
        };

        debug!(
            "Rendition '{}': attributes {}, payload {} ({} bytes)",
            rendition.file_name(),
            attributes_block,
            payload_block,
            payload_length
        );

        Ok(RenditionRecord {
            attributes_block,
            width: rendition.width(),
            height: rendition.height(),
            scale: pending.scale,
            layout: rendition.layout().to_u16(),
            file_name: rendition.file_name().to_string(),
            pixel_format,
            payload_block,
            payload_length,
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.store.is_some() {
            return Err(CarError::AlreadyWritten);
        }
        Ok(())
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}
