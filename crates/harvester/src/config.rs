//! Declarative harvest model.
//!
//! Catalog files reference collection and indicator files by name; the loader
//! in the binary resolves those references and hands the engine fully
//! populated [`CatalogDefinition`]s. Collection and endpoint keys follow the
//! PascalCase spelling used by the configuration files.

use chrono::{DateTime, Utc};
use harvest_common::{
    generate_times, parse_iso8601, BoundingBox, HarvestError, HarvestResult, TimeStep,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use catalog_model::Provider;

// ============================================================================
// Engine settings
// ============================================================================

/// What to do when a remote-backed collection yields no items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyExtentPolicy {
    /// Keep the global bbox and the open interval starting 1900-01-01.
    #[default]
    Sentinel,
    /// Fail the collection with a data-shape error.
    Fail,
}

/// Provider base URLs and engine behaviour shared by every catalog build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    pub sh_catalog_url: String,
    pub sh_wms_url: String,
    pub sh_instance_id: Option<String>,
    pub sh_client_id: Option<String>,
    pub raster_endpoint: String,
    pub search_start: String,
    pub search_end: String,
    pub empty_extent: EmptyExtentPolicy,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            sh_catalog_url: "https://services.sentinel-hub.com/api/v1/catalog/1.0.0/".to_string(),
            sh_wms_url: "https://services.sentinel-hub.com/ogc/wms".to_string(),
            sh_instance_id: None,
            sh_client_id: None,
            raster_endpoint: "https://staging-raster.delta-backend.com".to_string(),
            search_start: "1900-01-01T00:00:00Z".to_string(),
            search_end: "3000-01-01T00:00:00Z".to_string(),
            empty_extent: EmptyExtentPolicy::Sentinel,
        }
    }
}

impl HarvestSettings {
    /// The full search window as parsed instants.
    pub fn search_window(&self) -> HarvestResult<(DateTime<Utc>, DateTime<Utc>)> {
        Ok((parse_iso8601(&self.search_start)?, parse_iso8601(&self.search_end)?))
    }
}

// ============================================================================
// Catalogs
// ============================================================================

/// One top-level catalog and everything it references.
#[derive(Debug, Clone)]
pub struct CatalogDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Public base href of the published catalog.
    pub endpoint: String,
    pub assets_endpoint: String,
    pub entries: Vec<CatalogEntry>,
}

/// A catalog member: a plain collection, or an indicator aggregating several.
#[derive(Debug, Clone)]
pub enum CatalogEntry {
    Collection(CollectionDefinition),
    Indicator {
        definition: CollectionDefinition,
        members: Vec<CollectionDefinition>,
    },
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        match self {
            CatalogEntry::Collection(def) => &def.name,
            CatalogEntry::Indicator { definition, .. } => &definition.name,
        }
    }
}

// ============================================================================
// Collections
// ============================================================================

/// Shared descriptive metadata plus the resources that populate a collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CollectionDefinition {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub eodash_identifier: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub themes: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub satellite: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub sensor: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub agency: Vec<String>,
    #[serde(default, rename = "yAxis")]
    pub y_axis: Option<String>,
    #[serde(default)]
    pub license: Option<LicenseSpec>,
    #[serde(default)]
    pub provider: Vec<Provider>,
    #[serde(default)]
    pub citation: Option<Citation>,
    #[serde(default)]
    pub legend: Option<String>,
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub map_projection: Option<Value>,
    #[serde(default)]
    pub data_projection: Option<Value>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub resources: Vec<EndpointConfig>,
    #[serde(default)]
    pub subcollections: Vec<Subcollection>,
    /// Member collection names (indicator files only).
    #[serde(default)]
    pub collections: Vec<String>,
}

impl CollectionDefinition {
    /// Display title, falling back to the name.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

/// License as an SPDX identifier or an explicit list of license documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LicenseSpec {
    Id(String),
    Links(Vec<LicenseLink>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LicenseLink {
    pub url: String,
    #[serde(default, rename = "Type")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default, rename = "DOI")]
    pub doi: Option<String>,
    #[serde(default, rename = "Citation")]
    pub citation: Option<String>,
    #[serde(default, rename = "Publication")]
    pub publication: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reference {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
}

/// A named place an indicator is split into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    pub identifier: String,
    pub name: String,
    /// `[lon, lat]`
    #[serde(default)]
    pub point: Option<[f64; 2]>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub filter_dates: Option<Vec<String>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub country: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "OverwriteBBox")]
    pub overwrite_bbox: Option<BoundingBox>,
    #[serde(default)]
    pub times: Option<Vec<String>>,
}

impl Location {
    /// `"lat,lon"` as bubbled onto location links.
    pub fn latlng(&self) -> Option<String> {
        self.point.map(|[lon, lat]| format!("{},{}", lat, lon))
    }
}

/// Reference to another collection file nested under a parent collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Subcollection {
    /// Name of the referenced collection file.
    pub collection: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub point: Option<[f64; 2]>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub country: Vec<String>,
    /// Filled in by the loader.
    #[serde(skip)]
    pub definition: Option<Box<CollectionDefinition>>,
}

impl Subcollection {
    /// A subcollection with a name and a point becomes a located child.
    pub fn is_located(&self) -> bool {
        self.name.is_some() && self.point.is_some()
    }

    pub fn latlng(&self) -> Option<String> {
        self.point.map(|[lon, lat]| format!("{},{}", lat, lon))
    }
}

// ============================================================================
// Endpoints
// ============================================================================

/// A provider-tagged resource description.
///
/// The variant is fixed when the configuration is parsed; an unknown `Name`
/// tag is rejected at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Name")]
pub enum EndpointConfig {
    #[serde(rename = "Sentinel Hub")]
    SentinelHubStac(SentinelHubStacEndpoint),
    #[serde(rename = "Sentinel Hub WMS")]
    SentinelHubWms(SentinelHubWmsEndpoint),
    #[serde(rename = "GeoDB")]
    GeoDb(GeoDbEndpoint),
    #[serde(rename = "GeoDB Vector Tiles")]
    GeoDbVectorTiles(VectorTileEndpoint),
    #[serde(rename = "VEDA")]
    Veda(VedaEndpoint),
    #[serde(rename = "WMS")]
    Wms(WmsEndpoint),
    #[serde(rename = "WMTS")]
    Wmts(WmtsEndpoint),
    #[serde(rename = "xcube")]
    Xcube(XcubeEndpoint),
    #[serde(rename = "Collection-only")]
    CollectionOnly(CollectionOnlyEndpoint),
}

impl EndpointConfig {
    /// The configuration tag, also bubbled as `endpointtype`.
    pub fn name(&self) -> &'static str {
        match self {
            EndpointConfig::SentinelHubStac(_) => "Sentinel Hub",
            EndpointConfig::SentinelHubWms(_) => "Sentinel Hub WMS",
            EndpointConfig::GeoDb(_) => "GeoDB",
            EndpointConfig::GeoDbVectorTiles(_) => "GeoDB Vector Tiles",
            EndpointConfig::Veda(_) => "VEDA",
            EndpointConfig::Wms(_) => "WMS",
            EndpointConfig::Wmts(_) => "WMTS",
            EndpointConfig::Xcube(_) => "xcube",
            EndpointConfig::CollectionOnly(_) => "Collection-only",
        }
    }

    /// Explicit bbox replacing whatever the provider reports.
    pub fn overwrite_bbox(&self) -> Option<BoundingBox> {
        match self {
            EndpointConfig::SentinelHubStac(e) => e.overwrite_bbox,
            EndpointConfig::SentinelHubWms(e) => e.overwrite_bbox,
            EndpointConfig::Wms(e) => e.overwrite_bbox,
            EndpointConfig::Wmts(e) => e.overwrite_bbox,
            EndpointConfig::CollectionOnly(e) => e.overwrite_bbox,
            _ => None,
        }
    }

    /// Source data projection, for providers that report none themselves.
    pub fn data_projection(&self) -> Option<&Value> {
        match self {
            EndpointConfig::SentinelHubStac(e) => e.data_projection.as_ref(),
            _ => None,
        }
    }

    /// Configured WMS styles.
    pub fn styles(&self) -> Option<&str> {
        match self {
            EndpointConfig::Wms(e) => e.styles.as_deref(),
            _ => None,
        }
    }

    /// The configured time override, if this variant supports one.
    pub fn time_override(&self) -> Option<&TimeOverride> {
        match self {
            EndpointConfig::SentinelHubWms(e) => Some(&e.time),
            EndpointConfig::Wms(e) => Some(&e.time),
            EndpointConfig::Wmts(e) => Some(&e.time),
            EndpointConfig::CollectionOnly(e) => Some(&e.time),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SentinelHubStacEndpoint {
    pub collection_id: String,
    /// Catalog collection type prefix, `byoc` unless stated.
    #[serde(default, rename = "Type")]
    pub collection_type: Option<String>,
    pub layer_id: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default, rename = "OverwriteBBox")]
    pub overwrite_bbox: Option<BoundingBox>,
    #[serde(default)]
    pub data_projection: Option<Value>,
}

impl SentinelHubStacEndpoint {
    /// Remote collection id as the catalog API expects it, e.g. `byoc-<id>`.
    pub fn remote_collection(&self) -> String {
        format!(
            "{}-{}",
            self.collection_type.as_deref().unwrap_or("byoc"),
            self.collection_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SentinelHubWmsEndpoint {
    pub layer_id: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(flatten)]
    pub time: TimeOverride,
    #[serde(default, rename = "OverwriteBBox")]
    pub overwrite_bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GeoDbEndpoint {
    #[serde(rename = "EndPoint")]
    pub endpoint: String,
    pub database: String,
    pub collection_id: String,
    #[serde(default = "default_id_key")]
    pub id_key: String,
    #[serde(default = "default_name_key")]
    pub name_key: String,
    #[serde(default)]
    pub additional_query_string: Option<String>,
}

fn default_id_key() -> String {
    "aoi_id".to_string()
}

fn default_name_key() -> String {
    "city".to_string()
}

impl GeoDbEndpoint {
    /// Table URL, `{EndPoint}{Database}_{CollectionId}`.
    pub fn table_url(&self) -> String {
        format!("{}{}_{}", self.endpoint, self.database, self.collection_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VectorTileEndpoint {
    #[serde(rename = "EndPoint")]
    pub endpoint: String,
    pub instance: String,
    pub source: String,
    pub layer_id: String,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub match_key: Option<String>,
    #[serde(default)]
    pub time_key: Option<String>,
}

/// How a VEDA collection is visualized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VedaType {
    Cog,
    Tiles,
    Raster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VedaEndpoint {
    #[serde(rename = "EndPoint")]
    pub endpoint: String,
    pub collection_id: String,
    #[serde(default, rename = "Type")]
    pub veda_type: Option<VedaType>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub bidx: Vec<i64>,
    #[serde(default)]
    pub colormap: Option<String>,
    #[serde(default)]
    pub colormap_name: Option<String>,
    #[serde(default)]
    pub rescale: Option<[f64; 2]>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub assets: Vec<String>,
    #[serde(default)]
    pub color_formula: Option<String>,
    #[serde(default)]
    pub no_data: Option<Value>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WmsEndpoint {
    #[serde(rename = "EndPoint")]
    pub endpoint: String,
    pub layer_id: String,
    #[serde(default = "default_wms_version")]
    pub version: String,
    #[serde(default)]
    pub styles: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(flatten)]
    pub time: TimeOverride,
    #[serde(default, rename = "OverwriteBBox")]
    pub overwrite_bbox: Option<BoundingBox>,
}

fn default_wms_version() -> String {
    "1.1.1".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WmtsEndpoint {
    #[serde(rename = "EndPoint")]
    pub endpoint: String,
    pub layer_id: String,
    #[serde(default)]
    pub dimensions: Map<String, Value>,
    #[serde(flatten)]
    pub time: TimeOverride,
    #[serde(default, rename = "OverwriteBBox")]
    pub overwrite_bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct XcubeEndpoint {
    #[serde(rename = "EndPoint")]
    pub endpoint: String,
    #[serde(default)]
    pub stac_endpoint: Option<String>,
    pub collection_id: String,
    pub datacube_id: String,
    pub variable: String,
    #[serde(default)]
    pub colormap_name: Option<String>,
    #[serde(default)]
    pub rescale: Option<[f64; 2]>,
    #[serde(default = "default_xcube_crs")]
    pub crs: String,
}

fn default_xcube_crs() -> String {
    "EPSG:3857".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CollectionOnlyEndpoint {
    #[serde(flatten)]
    pub time: TimeOverride,
    #[serde(default, rename = "OverwriteBBox")]
    pub overwrite_bbox: Option<BoundingBox>,
    #[serde(default, rename = "Disable_Items")]
    pub disable_items: bool,
}

// ============================================================================
// Time overrides
// ============================================================================

/// An explicit time list or a generation rule replacing provider times.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimeOverride {
    #[serde(default)]
    pub times: Option<Vec<String>>,
    #[serde(default)]
    pub date_time_interval: Option<DateTimeInterval>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DateTimeInterval {
    #[serde(default = "default_interval_start")]
    pub start: String,
    /// An instant or the literal `today`.
    #[serde(default = "default_interval_end")]
    pub end: String,
    #[serde(default)]
    pub timedelta: TimeStep,
}

fn default_interval_start() -> String {
    "2020-09-01T00:00:00".to_string()
}

fn default_interval_end() -> String {
    "2020-10-01T00:00:00".to_string()
}

impl TimeOverride {
    /// The overriding time list; an explicit list wins over a generation rule.
    pub fn resolve(&self, now: DateTime<Utc>) -> HarvestResult<Option<Vec<String>>> {
        if let Some(times) = &self.times {
            return Ok(Some(times.clone()));
        }
        match &self.date_time_interval {
            Some(interval) => {
                let times = generate_times(&interval.start, &interval.end, &interval.timedelta, now)
                    .map_err(|e| HarvestError::configuration("DateTimeInterval", e.to_string()))?;
                Ok(Some(times))
            }
            None => Ok(None),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

/// Accept either a single value or a list.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}
