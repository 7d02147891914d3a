//! Catalog-level records: `CARHEADER` and `EXTENDED_METADATA`
//!
//! Both are little-endian fixed-size records stored in blocks named by
//! container variables. String fields are NUL-padded UTF-8.

use crate::codec::{fixed_str, put_fixed_str, Decoder};
use crate::error::{CarError, Result};
use bytes::BufMut;
use serde::{Deserialize, Serialize};

pub const CAR_HEADER_MAGIC: &[u8; 4] = b"RATC";
pub const CAR_HEADER_SIZE: usize = 436;

pub const METADATA_MAGIC: &[u8; 4] = b"META";
pub const METADATA_SIZE: usize = 1028;

/// Catalog header
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CarHeader {
    pub ui_version: u32,
    pub storage_version: u32,
    pub storage_timestamp: u32,
    pub rendition_count: u32,
    pub main_version_string: String,
    pub version_string: String,
    pub uuid: [u8; 16],
    pub associated_checksum: u32,
    pub schema_version: u32,
    pub color_space_id: u32,
    pub key_semantics: u32,
}

impl CarHeader {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(CAR_HEADER_SIZE);
        bytes.put_slice(CAR_HEADER_MAGIC);
        bytes.put_u32_le(self.ui_version);
        bytes.put_u32_le(self.storage_version);
        bytes.put_u32_le(self.storage_timestamp);
        bytes.put_u32_le(self.rendition_count);
        bytes.put_slice(&put_fixed_str::<128>(&self.main_version_string));
        bytes.put_slice(&put_fixed_str::<256>(&self.version_string));
        bytes.put_slice(&self.uuid);
        bytes.put_u32_le(self.associated_checksum);
        bytes.put_u32_le(self.schema_version);
        bytes.put_u32_le(self.color_space_id);
        bytes.put_u32_le(self.key_semantics);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CAR_HEADER_SIZE {
            return Err(CarError::corrupt(format!(
                "catalog header is {} bytes, expected {}",
                bytes.len(),
                CAR_HEADER_SIZE
            )));
        }

        let mut d = Decoder::new(bytes, "catalog header");
        let magic = d.array::<4>()?;
        if &magic != CAR_HEADER_MAGIC {
            return Err(CarError::corrupt("bad catalog header magic"));
        }

        let header = CarHeader {
            ui_version: d.u32_le()?,
            storage_version: d.u32_le()?,
            storage_timestamp: d.u32_le()?,
            rendition_count: d.u32_le()?,
            main_version_string: fixed_str(d.bytes(128)?),
            version_string: fixed_str(d.bytes(256)?),
            uuid: d.array::<16>()?,
            associated_checksum: d.u32_le()?,
            schema_version: d.u32_le()?,
            color_space_id: d.u32_le()?,
            key_semantics: d.u32_le()?,
        };
        d.finish()?;

        Ok(header)
    }
}

/// Build provenance
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedMetadata {
    pub thinning_arguments: String,
    pub deployment_platform_version: String,
    pub deployment_platform: String,
    pub authoring_tool: String,
}

impl ExtendedMetadata {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(METADATA_SIZE);
        bytes.put_slice(METADATA_MAGIC);
        bytes.put_slice(&put_fixed_str::<256>(&self.thinning_arguments));
        bytes.put_slice(&put_fixed_str::<256>(&self.deployment_platform_version));
        bytes.put_slice(&put_fixed_str::<256>(&self.deployment_platform));
        bytes.put_slice(&put_fixed_str::<256>(&self.authoring_tool));
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != METADATA_SIZE {
            return Err(CarError::corrupt(format!(
                "extended metadata is {} bytes, expected {}",
                bytes.len(),
                METADATA_SIZE
            )));
        }

        let mut d = Decoder::new(bytes, "extended metadata");
        let magic = d.array::<4>()?;
        if &magic != METADATA_MAGIC {
            return Err(CarError::corrupt("bad extended metadata magic"));
        }

        let metadata = ExtendedMetadata {
            thinning_arguments: fixed_str(d.bytes(256)?),
            deployment_platform_version: fixed_str(d.bytes(256)?),
            deployment_platform: fixed_str(d.bytes(256)?),
            authoring_tool: fixed_str(d.bytes(256)?),
        };
        d.finish()?;

        Ok(metadata)
    }
}
