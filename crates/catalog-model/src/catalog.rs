//! The catalog root and the scope abstraction shared with collections.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::collection::Collection;
use crate::link::Link;
use crate::{media_types, rel};

/// STAC version written into every serialized object.
pub const STAC_VERSION: &str = "1.0.0";

/// Anything that holds child collections: a [`Catalog`] or a [`Collection`].
///
/// Child identity is the collection id; lookups are linear scans in
/// insertion order.
pub trait CollectionScope: Send {
    fn scope_id(&self) -> &str;
    fn children(&self) -> &[Collection];
    fn children_mut(&mut self) -> &mut Vec<Collection>;
    fn links_mut(&mut self) -> &mut Vec<Link>;

    fn child(&self, id: &str) -> Option<&Collection> {
        self.children().iter().find(|c| c.id == id)
    }

    fn child_mut(&mut self, id: &str) -> Option<&mut Collection> {
        self.children_mut().iter_mut().find(|c| c.id == id)
    }

    fn child_position(&self, id: &str) -> Option<usize> {
        self.children().iter().position(|c| c.id == id)
    }

    /// Append a child unconditionally and return the new `child` link.
    fn push_child(&mut self, collection: Collection) -> &mut Link {
        let link = Link::new(rel::CHILD, child_href(&collection.id))
            .with_type(media_types::JSON)
            .with_title(collection.title.clone());
        self.children_mut().push(collection);

        let links = self.links_mut();
        links.push(link);
        let last = links.len() - 1;
        &mut links[last]
    }

    /// The `child` link pointing at the child with `id`.
    fn child_link_mut(&mut self, id: &str) -> Option<&mut Link> {
        let href = child_href(id);
        self.links_mut()
            .iter_mut()
            .find(|l| l.rel == rel::CHILD && l.href == href)
    }
}

/// Relative href of a child collection document.
pub fn child_href(id: &str) -> String {
    format!("./{}/collection.json", id)
}

/// The root container of one harvested catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub id: String,
    pub title: String,
    pub description: String,
    pub links: Vec<Link>,
    pub children: Vec<Collection>,
}

impl Catalog {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            links: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Every collection in the tree, depth first.
    pub fn all_collections(&self) -> Vec<&Collection> {
        fn walk<'a>(collections: &'a [Collection], out: &mut Vec<&'a Collection>) {
            for c in collections {
                out.push(c);
                walk(&c.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.children, &mut out);
        out
    }
}

impl CollectionScope for Catalog {
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

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(6))?;
        map.serialize_entry("type", "Catalog")?;
        map.serialize_entry("stac_version", STAC_VERSION)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("title", &self.title)?;
        map.serialize_entry("description", &self.description)?;
        map.serialize_entry("links", &self.links)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::Extent;

    #[test]
    fn test_push_child_adds_link() {
        let mut catalog = Catalog::new("cat", "Cat", "");
        catalog.push_child(Collection::new("a", "A", "", Extent::global()));

        assert_eq!(catalog.children.len(), 1);
        assert_eq!(catalog.links[0].rel, "child");
        assert_eq!(catalog.links[0].href, "./a/collection.json");
        assert!(catalog.child_link_mut("a").is_some());
    }

    #[test]
    fn test_all_collections_depth_first() {
        let mut root = Collection::new("root", "Root", "", Extent::global());
        root.push_child(Collection::new("leaf", "Leaf", "", Extent::global()));
        let mut catalog = Catalog::new("cat", "Cat", "");
        catalog.push_child(root);
        catalog.push_child(Collection::new("other", "Other", "", Extent::global()));

        let ids: Vec<&str> = catalog.all_collections().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "leaf", "other"]);
    }
}
