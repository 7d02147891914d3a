//! # car-archive - Compiled Asset Catalog Archives
//!
//! `car-archive` reads and writes compiled asset catalogs: a block container
//! holding named facets (logical assets) and their renditions (concrete
//! variants selected by attributes such as scale, idiom, or size class).
//!
//! - **Container store** with a block table, free-list reuse, named
//!   variables, and paged sorted trees
//! - **Key format** driven rendition keys whose byte order follows
//!   attribute values
//! - **Pattern lookup** of renditions by facet attributes
//!
//! ## Quick Start
//!
//! ```rust
//! use car_archive::{
//!     AttributeIdentifier, AttributeList, Facet, Idiom, KeyFormat, PixelFormat, Reader,
//!     Rendition, RenditionData, Result, Writer,
//! };
//!
//! # fn main() -> Result<()> {
//! let attributes = AttributeList::new()
//!     .with(AttributeIdentifier::Idiom, Idiom::Universal)
//!     .with(AttributeIdentifier::Scale, 2u16)
//!     .with(AttributeIdentifier::Identifier, 1u16);
//!
//! let mut writer = Writer::new();
//! writer.set_key_format(KeyFormat::new([
//!     AttributeIdentifier::Scale,
//!     AttributeIdentifier::Idiom,
//!     AttributeIdentifier::Identifier,
//! ]))?;
//! writer.add_facet(Facet::new("icon", attributes.clone()))?;
//! writer.add_rendition(
//!     Rendition::new(attributes)
//!         .with_size(1, 1)
//!         .with_scale(2.0)
//!         .with_file_name("icon@2x.png")
//!         .with_data(RenditionData::new(vec![0, 0, 0, 255], PixelFormat::PremultipliedBGRA8)),
//! )?;
//! let image = writer.write()?;
//!
//! let reader = Reader::load(&image)?;
//! reader.facet_iterate(|facet| -> Result<()> {
//!     for rendition in reader.lookup_renditions(facet)? {
//!         println!("{}: {}", facet.name(), rendition.file_name());
//!     }
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

// Container layer
pub mod core;

// Asset catalog layer
pub mod car;

// Short crate:: paths for the container modules
pub(crate) use crate::core::{allocator, catalog, codec, error, header, io, page, store, vars};

pub use crate::core::{
    allocator::BlockRef,
    error::{CarError, Result},
    io::{DefaultFilesystem, Filesystem, MemoryFilesystem},
    store::{Entry, Store},
};

pub use crate::car::{
    AttributeIdentifier, AttributeList, CarHeader, CatalogInfo, ExtendedMetadata, Facet, Idiom,
    KeyFormat, Layout, PixelFormat, Reader, Rendition, RenditionData, SizeClass, Writer,
    WriterBuilder, WriterConfig,
};
