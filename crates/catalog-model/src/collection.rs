//! Collections: named groups of items and/or child collections.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::asset::Asset;
use crate::catalog::{CollectionScope, STAC_VERSION};
use crate::extent::Extent;
use crate::fields::{ExtraFields, Summaries};
use crate::item::Item;
use crate::link::Link;
use crate::{media_types, rel};

/// License identifier used when nothing better is known.
pub const PROPRIETARY_LICENSE: &str = "proprietary";

/// An organization involved in producing or hosting a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provider {
    #[serde(alias = "Name")]
    pub name: String,

    #[serde(default, alias = "Url", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, alias = "Roles", skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

/// A collection of items and/or child collections.
///
/// A leaf data collection holds items, an indicator or location compositor
/// holds child collections; both at once is legal. Identity is the `id`,
/// unique within the parent's children.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub id: String,
    pub title: String,
    pub description: String,
    pub license: String,
    pub providers: Vec<Provider>,
    pub extent: Extent,
    pub extra_fields: ExtraFields,
    pub summaries: Summaries,
    pub assets: BTreeMap<String, Asset>,
    pub links: Vec<Link>,
    pub items: Vec<Item>,
    pub children: Vec<Collection>,
}

impl Collection {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        extent: Extent,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            license: PROPRIETARY_LICENSE.to_string(),
            providers: Vec::new(),
            extent,
            extra_fields: ExtraFields::new(),
            summaries: Summaries::new(),
            assets: BTreeMap::new(),
            links: Vec::new(),
            items: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an item and return the new `item` link so callers can bubble fields onto it.
    pub fn add_item(&mut self, item: Item) -> &mut Link {
        let href = format!("./{}/{}.json", item.year(), item.id);
        self.items.push(item);
        self.links
            .push(Link::new(rel::ITEM, href).with_type(media_types::JSON));
        let last = self.links.len() - 1;
        &mut self.links[last]
    }

    /// Add an asset, replacing any previous asset under the same key.
    pub fn add_asset(&mut self, key: impl Into<String>, asset: Asset) {
        self.assets.insert(key.into(), asset);
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    /// Links with the given relation.
    pub fn links_with_rel<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.rel == rel)
    }

    /// `item` links, in the same order as `items`.
    pub fn item_links(&self) -> impl Iterator<Item = &Link> {
        self.links_with_rel(rel::ITEM)
    }

    /// Recompute the extent from the items, if there are any.
    ///
    /// A collection without items keeps its configured extent.
    pub fn update_extent_from_items(&mut self) {
        if !self.items.is_empty() {
            self.extent = Extent::from_items(&self.items);
        }
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }
}

impl CollectionScope for Collection {
    fn scope_id(&self) -> &str {
        &self.id
    }

    fn children(&self) -> &[Collection] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Collection> {
        &mut self.children
    }

    fn links_mut(&mut self) -> &mut Vec<Link> {
        &mut self.links
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", "Collection")?;
        map.serialize_entry("stac_version", STAC_VERSION)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("title", &self.title)?;
        map.serialize_entry("description", &self.description)?;
        map.serialize_entry("license", &self.license)?;
        if !self.providers.is_empty() {
            map.serialize_entry("providers", &self.providers)?;
        }
        map.serialize_entry("extent", &self.extent)?;
        if !self.summaries.is_empty() {
            map.serialize_entry("summaries", &self.summaries)?;
        }
        if !self.assets.is_empty() {
            map.serialize_entry("assets", &self.assets)?;
        }
        map.serialize_entry("links", &self.links)?;
        for (key, value) in self.extra_fields.iter() {
            map.serialize_entry(key.as_str(), value)?;
        }
        map.end()
    }
}
