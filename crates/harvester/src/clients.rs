//! External collaborator interfaces.
//!
//! The engine never talks HTTP itself. Every remote interaction goes through
//! one of these traits so the binary can plug in real clients and tests can
//! plug in fakes.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvest_common::{parse_iso8601, BoundingBox, HarvestError, HarvestResult};
use serde::Deserialize;
use serde_json::{Map, Value};

use catalog_model::{Asset, ItemTime};

// ============================================================================
// STAC search
// ============================================================================

/// A bbox + time-window search restricted to one remote collection.
#[derive(Debug, Clone, PartialEq)]
pub struct StacSearch {
    pub endpoint: String,
    pub collection: String,
    pub bbox: BoundingBox,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Extra request headers, e.g. `Authorization`.
    pub headers: Vec<(String, String)>,
}

/// A STAC item as returned by a search or a datacube description.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StacItem {
    pub id: String,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub geometry: Option<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub assets: BTreeMap<String, Asset>,
}

impl StacItem {
    /// 2D bounding box; 3D boxes drop their elevation bounds.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self.bbox.as_deref() {
            Some([min_x, min_y, max_x, max_y]) => {
                Some(BoundingBox::new(*min_x, *min_y, *max_x, *max_y))
            }
            Some([min_x, min_y, _, max_x, max_y, _]) => {
                Some(BoundingBox::new(*min_x, *min_y, *max_x, *max_y))
            }
            _ => None,
        }
    }

    /// `datetime` when set, otherwise the `start_datetime`/`end_datetime` pair.
    pub fn item_time(&self) -> HarvestResult<ItemTime> {
        let field = |name: &str| self.properties.get(name).and_then(Value::as_str);

        if let Some(datetime) = field("datetime") {
            return Ok(ItemTime::Instant(parse_iso8601(datetime)?));
        }
        match (field("start_datetime"), field("end_datetime")) {
            (Some(start), Some(end)) => Ok(ItemTime::Range {
                start: parse_iso8601(start)?,
                end: parse_iso8601(end)?,
            }),
            _ => Err(HarvestError::data_shape(
                format!("item {}", self.id),
                "neither datetime nor start_datetime/end_datetime is set",
            )),
        }
    }
}

#[async_trait]
pub trait StacSearchClient: Send + Sync {
    /// Run a search and return every matching item, in provider order.
    async fn search(&self, search: &StacSearch) -> HarvestResult<Vec<StacItem>>;
}

// ============================================================================
// Tabular queries
// ============================================================================

#[async_trait]
pub trait TabularClient: Send + Sync {
    /// Run a query URL and return its rows.
    async fn query(&self, url: &str) -> HarvestResult<Vec<Map<String, Value>>>;
}

// ============================================================================
// Capabilities documents
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Wms,
    Wmts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapabilitiesRequest {
    pub endpoint: String,
    pub layer: String,
    pub version: Option<String>,
    pub kind: ServiceKind,
}

/// Bounding box and raw time positions of one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerCapabilities {
    pub bbox: Option<BoundingBox>,
    pub time_positions: Vec<String>,
}

#[async_trait]
pub trait CapabilitiesClient: Send + Sync {
    async fn layer_info(&self, request: &CapabilitiesRequest) -> HarvestResult<LayerCapabilities>;
}

// ============================================================================
// Datacubes
// ============================================================================

#[async_trait]
pub trait DatacubeClient: Send + Sync {
    /// Describe one cube as a STAC item carrying `cube:dimensions` and `cube:variables`.
    async fn describe(
        &self,
        endpoint: &str,
        collection_id: &str,
        item_id: &str,
    ) -> HarvestResult<StacItem>;
}

// ============================================================================
// Credentials, content and licenses
// ============================================================================

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Bearer token for a client identity. Implementations cache per identity.
    async fn bearer_token(&self, client_id: &str) -> HarvestResult<String>;
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> HarvestResult<String>;
}

/// A resolved SPDX license.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseInfo {
    pub id: String,
    /// URLs of the license text.
    pub sources: Vec<String>,
}

pub trait LicenseLookup: Send + Sync {
    fn lookup(&self, id: &str) -> Option<LicenseInfo>;
}

/// The full set of collaborators handed to a build.
#[derive(Clone)]
pub struct Clients {
    pub stac: Arc<dyn StacSearchClient>,
    pub tabular: Arc<dyn TabularClient>,
    pub capabilities: Arc<dyn CapabilitiesClient>,
    pub datacube: Arc<dyn DatacubeClient>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub content: Arc<dyn ContentFetcher>,
    pub licenses: Arc<dyn LicenseLookup>,
}
