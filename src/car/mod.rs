//! Asset catalog layer
//!
//! Facets, renditions, and the key format, stored in a container
//! [`Store`](crate::core::Store) under these well-known names:
//!
//! | name | kind | contents |
//! |---|---|---|
//! | `CARHEADER` | variable | [`header::CarHeader`] |
//! | `KEYFORMAT` | variable | [`key_format::KeyFormat`] record |
//! | `EXTENDED_METADATA` | variable | [`header::ExtendedMetadata`] |
//! | `FACETKEYS` | tree | facet name → attribute pattern |
//! | `RENDITIONS` | tree | rendition key → rendition record |

pub mod attribute;
pub mod config;
pub mod facet;
pub mod header;
pub mod key_format;
pub mod reader;
pub mod rendition;
pub mod writer;

pub const CAR_HEADER_VAR: &str = "CARHEADER";
pub const KEY_FORMAT_VAR: &str = "KEYFORMAT";
pub const EXTENDED_METADATA_VAR: &str = "EXTENDED_METADATA";
pub const FACET_TREE: &str = "FACETKEYS";
pub const RENDITION_TREE: &str = "RENDITIONS";

pub use attribute::{AttributeIdentifier, AttributeList, Idiom, SizeClass};
pub use config::{WriterBuilder, WriterConfig};
pub use facet::Facet;
pub use header::{CarHeader, ExtendedMetadata};
pub use key_format::KeyFormat;
pub use reader::{CatalogInfo, Reader};
pub use rendition::{Layout, PixelFormat, Rendition, RenditionData};
pub use writer::Writer;
