//! Writer configuration
//!
//! Options can be built in code with [`WriterBuilder`] or loaded from TOML:
//!
//! ```toml
//! page_size = 4096
//! main_version_string = "car-archive"
//! schema_version = 2
//!
//! [extended_metadata]
//! deployment_platform = "ios"
//! authoring_tool = "car-archive"
//! ```

use super::attribute::AttributeIdentifier;
use super::header::{CarHeader, ExtendedMetadata};
use super::key_format::KeyFormat;
use super::writer::Writer;
use crate::error::{CarError, Result};
use crate::page::{DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Tree page size in bytes
    pub page_size: u32,
    pub ui_version: u32,
    pub storage_version: u32,
    pub main_version_string: String,
    pub version_string: String,
    pub schema_version: u32,
    pub color_space_id: u32,
    pub key_semantics: u32,
    /// Seconds since the Unix epoch; the write time when unset
    pub storage_timestamp: Option<u32>,
    pub uuid: [u8; 16],
    /// Written as `EXTENDED_METADATA` when set
    pub extended_metadata: Option<ExtendedMetadata>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            page_size: DEFAULT_PAGE_SIZE,
            ui_version: 0,
            storage_version: 0,
            main_version_string: String::new(),
            version_string: String::new(),
            schema_version: 0,
            color_space_id: 0,
            key_semantics: 0,
            storage_timestamp: None,
            uuid: [0u8; 16],
            extended_metadata: None,
        }
    }
}

impl WriterConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: WriterConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        debug!("Loading writer config from {}", path.display());
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(CarError::Config(format!(
                "page_size {} is below the minimum of {}",
                self.page_size, MIN_PAGE_SIZE
            )));
        }
        Ok(())
    }

    /// Catalog header for an archive holding `rendition_count` renditions
    pub fn car_header(&self, rendition_count: u32) -> CarHeader {
        let storage_timestamp = self.storage_timestamp.unwrap_or_else(|| {
            u32::try_from(chrono::Utc::now().timestamp().max(0)).unwrap_or(u32::MAX)
        });

        CarHeader {
            ui_version: self.ui_version,
            storage_version: self.storage_version,
            storage_timestamp,
            rendition_count,
            main_version_string: self.main_version_string.clone(),
            version_string: self.version_string.clone(),
            uuid: self.uuid,
            associated_checksum: 0,
            schema_version: self.schema_version,
            color_space_id: self.color_space_id,
            key_semantics: self.key_semantics,
        }
    }
}

/// Builder for customizing Writer creation
///
/// ```rust
/// use car_archive::{AttributeIdentifier, WriterBuilder};
///
/// # fn main() -> car_archive::Result<()> {
/// let writer = WriterBuilder::new()
///     .key_format([AttributeIdentifier::Scale, AttributeIdentifier::Identifier])
///     .page_size(1024)
///     .version_string("assets-1.0")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct WriterBuilder {
    config: WriterConfig,
    key_format: Option<KeyFormat>,
}

impl WriterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: WriterConfig) -> Self {
        WriterBuilder {
            config,
            key_format: None,
        }
    }

    pub fn key_format<I>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = AttributeIdentifier>,
    {
        self.key_format = Some(KeyFormat::new(identifiers));
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn main_version_string<S: Into<String>>(mut self, value: S) -> Self {
        self.config.main_version_string = value.into();
        self
    }

    pub fn version_string<S: Into<String>>(mut self, value: S) -> Self {
        self.config.version_string = value.into();
        self
    }

    pub fn schema_version(mut self, value: u32) -> Self {
        self.config.schema_version = value;
        self
    }

    pub fn storage_timestamp(mut self, value: u32) -> Self {
        self.config.storage_timestamp = Some(value);
        self
    }

    pub fn uuid(mut self, uuid: [u8; 16]) -> Self {
        self.config.uuid = uuid;
        self
    }

    pub fn extended_metadata(mut self, metadata: ExtendedMetadata) -> Self {
        self.config.extended_metadata = Some(metadata);
        self
    }

    /// Build the Writer, applying the key format if one was given
    pub fn build(self) -> Result<Writer> {
        let mut writer = Writer::with_config(self.config)?;
        if let Some(key_format) = self.key_format {
            writer.set_key_format(key_format)?;
        }
        Ok(writer)
    }
}
