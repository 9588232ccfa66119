//! Links between catalog objects and to external endpoints.

use serde::Serialize;

use crate::fields::{ExtraFields, FieldKey};

/// A typed reference from one catalog object to another object or endpoint.
///
/// The target may be a concrete URL or a URL template (tile endpoints).
/// Links are append-only on their owner and duplicate `rel` values are
/// allowed, e.g. several `wms` links on one item.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Link {
    /// The relationship type (e.g. "child", "item", "wms", "xyz").
    pub rel: String,

    /// The URI or URI template of the linked resource.
    pub href: String,

    /// The media type of the linked resource.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// A human-readable title for the link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Metadata bubbled onto this edge.
    #[serde(flatten)]
    pub extra_fields: ExtraFields,
}

impl Link {
    /// Create a new link with required fields.
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            media_type: None,
            title: None,
            extra_fields: ExtraFields::new(),
        }
    }

    /// Set the media type.
    pub fn with_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attach an extra field.
    pub fn with_field(mut self, key: FieldKey, value: impl Into<serde_json::Value>) -> Self {
        self.extra_fields.insert(key, value);
        self
    }

    /// Value of a bubbled field, if it is a string.
    pub fn field_str(&self, key: FieldKey) -> Option<&str> {
        self.extra_fields.get_str(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_serialization_flattens_fields() {
        let link = Link::new("wms", "https://example.com/wms")
            .with_type("image/png")
            .with_field(FieldKey::WmsLayers, json!(["TRUE_COLOR"]));

        let value = serde_json::to_value(&link).unwrap();
        assert_eq!(
            value,
            json!({
                "rel": "wms",
                "href": "https://example.com/wms",
                "type": "image/png",
                "wms:layers": ["TRUE_COLOR"]
            })
        );
    }
}
