//! Block container underlying the asset catalog
//!
//! Generic storage with no knowledge of assets: blocks, named variables,
//! and named sorted trees, serialized to a single image.

pub mod allocator;
pub mod catalog;
pub mod codec;
pub mod error;
pub mod header;
pub mod io;
pub mod page;
pub mod store;
pub mod vars;

pub use allocator::BlockRef;
pub use store::{Entry, Store};
