//! OGC capabilities document parsing.
//!
//! Only the parts a catalog harvester needs are extracted: per named layer,
//! its WGS84 bounding box and the raw values of its time dimension. Time
//! values are returned exactly as advertised (comma separated lists are
//! split, `start/end/period` entries are left intact for the caller to
//! expand).

mod wms;
mod wmts;

use harvest_common::BoundingBox;
use quick_xml::events::BytesStart;
use thiserror::Error;

pub use wms::parse_wms_capabilities;
pub use wmts::parse_wmts_capabilities;

/// Result type alias using CapabilitiesError.
pub type CapabilitiesResult<T> = Result<T, CapabilitiesError>;

#[derive(Debug, Error)]
pub enum CapabilitiesError {
    #[error("XML parsing error at position {position}: {message}")]
    Xml { position: usize, message: String },

    #[error("Layer not found in capabilities: {0}")]
    LayerNotFound(String),

    #[error("Invalid bounding box in capabilities: {0}")]
    InvalidBoundingBox(String),
}

/// Which capabilities dialect a document is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Wms,
    Wmts,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Wms => "WMS",
            ServiceKind::Wmts => "WMTS",
        }
    }
}

/// What a capabilities document says about one named layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerCapabilities {
    pub name: String,
    pub bbox: Option<BoundingBox>,
    pub time_positions: Vec<String>,
}

/// Parse a capabilities document and return the layer named `layer`.
pub fn find_layer(xml: &str, kind: ServiceKind, layer: &str) -> CapabilitiesResult<LayerCapabilities> {
    let layers = match kind {
        ServiceKind::Wms => parse_wms_capabilities(xml)?,
        ServiceKind::Wmts => parse_wmts_capabilities(xml)?,
    };
    layers
        .into_iter()
        .find(|l| l.name == layer)
        .ok_or_else(|| CapabilitiesError::LayerNotFound(layer.to_string()))
}

/// Split a dimension's text content into individual values.
pub(crate) fn split_time_values(text: &str) -> Vec<String> {
    text.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Element name without its namespace prefix.
pub(crate) fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Value of the attribute with the given local name.
pub(crate) fn attribute(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

pub(crate) fn parse_coord(value: &str) -> CapabilitiesResult<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| CapabilitiesError::InvalidBoundingBox(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_time_values() {
        let values = split_time_values(" 2020-01-01 ,2020-01-02,, ");
        assert_eq!(values, vec!["2020-01-01", "2020-01-02"]);
    }

    #[test]
    fn test_find_layer_missing() {
        let xml = r#"<WMS_Capabilities><Capability><Layer><Name>a</Name></Layer></Capability></WMS_Capabilities>"#;
        let err = find_layer(xml, ServiceKind::Wms, "b").unwrap_err();
        assert!(matches!(err, CapabilitiesError::LayerNotFound(ref l) if l == "b"));
    }
}
