//! Catalog tree model.
//!
//! A [`Catalog`] owns top-level [`Collection`]s; collections own their
//! [`Item`]s and child collections. Descriptive metadata computed deep in the
//! tree is copied ("bubbled") onto the [`Link`] that points at it, using the
//! closed [`FieldKey`] vocabulary, so that clients can render summaries
//! without descending the tree.
//!
//! # Example
//!
//! ```rust
//! use catalog_model::{Catalog, Collection, CollectionScope, Extent};
//!
//! let mut catalog = Catalog::new("demo", "Demo", "A demo catalog");
//! let collection = Collection::new("no2", "NO2", "Nitrogen dioxide", Extent::global());
//! catalog.push_child(collection);
//! assert!(catalog.child("no2").is_some());
//! ```

pub mod asset;
pub mod catalog;
pub mod collection;
pub mod extent;
pub mod fields;
pub mod item;
pub mod link;

pub use asset::Asset;
pub use catalog::{Catalog, CollectionScope};
pub use collection::{Collection, Provider};
pub use extent::{Extent, SpatialExtent, TemporalExtent};
pub use fields::{ExtraFields, FieldKey, Summaries};
pub use item::{Item, ItemTime};
pub use link::Link;

/// Link relation types used in the catalog tree.
pub mod rel {
    pub const CHILD: &str = "child";
    pub const ITEM: &str = "item";
    pub const LICENSE: &str = "license";
    pub const PARENT: &str = "parent";
    pub const ROOT: &str = "root";
    pub const SELF: &str = "self";
    pub const WMS: &str = "wms";
    pub const WMTS: &str = "wmts";
    pub const XYZ: &str = "xyz";
}

/// Media types used in generated links and assets.
pub mod media_types {
    pub const JSON: &str = "application/json";
    pub const HTML: &str = "text/html";
    pub const MARKDOWN: &str = "text/markdown";
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const PBF: &str = "application/pbf";
}
