//! Common test utilities for harvester tests
//!
//! Provides in-memory collaborators that record what the engine asked for,
//! plus helpers for building contexts, items and definitions.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

use harvest_common::{HarvestError, HarvestResult};
use harvester::{
    CapabilitiesClient, CapabilitiesRequest, Clients, CollectionDefinition, ContentFetcher,
    CredentialProvider, DatacubeClient, HarvestContext, HarvestSettings, LayerCapabilities,
    LicenseInfo, LicenseLookup, StacItem, StacSearch, StacSearchClient, TabularClient,
};

// ============================================================================
// Fakes
// ============================================================================

/// Returns the configured items of a remote collection that intersect the search box.
#[derive(Default)]
pub struct FakeStac {
    pub items: HashMap<String, Vec<StacItem>>,
    pub failing: HashSet<String>,
    pub searches: Mutex<Vec<StacSearch>>,
}

impl FakeStac {
    pub fn with_items(mut self, collection: &str, items: Vec<StacItem>) -> Self {
        self.items.insert(collection.to_string(), items);
        self
    }

    pub fn failing_on(mut self, collection: &str) -> Self {
        self.failing.insert(collection.to_string());
        self
    }

    pub fn searches(&self) -> Vec<StacSearch> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl StacSearchClient for FakeStac {
    async fn search(&self, search: &StacSearch) -> HarvestResult<Vec<StacItem>> {
        self.searches.lock().unwrap().push(search.clone());
        if self.failing.contains(&search.collection) {
            return Err(HarvestError::provider_fetch(
                "STAC",
                search.endpoint.clone(),
                "HTTP 503 Service Unavailable",
            ));
        }
        Ok(self
            .items
            .get(&search.collection)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| {
                        item.bounding_box()
                            .map_or(true, |bbox| bbox.intersects(&search.bbox))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Answers a query with the rows of the first registered needle found in the URL.
#[derive(Default)]
pub struct FakeTabular {
    pub responses: Vec<(String, Vec<Map<String, Value>>)>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeTabular {
    pub fn respond(mut self, needle: &str, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|row| row.as_object().cloned())
            .collect();
        self.responses.push((needle.to_string(), rows));
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl TabularClient for FakeTabular {
    async fn query(&self, url: &str) -> HarvestResult<Vec<Map<String, Value>>> {
        self.queries.lock().unwrap().push(url.to_string());
        Ok(self
            .responses
            .iter()
            .find(|(needle, _)| url.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeCapabilities {
    pub layers: HashMap<String, LayerCapabilities>,
    pub calls: AtomicUsize,
}

impl FakeCapabilities {
    pub fn with_layer(mut self, layer: &str, capabilities: LayerCapabilities) -> Self {
        self.layers.insert(layer.to_string(), capabilities);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilitiesClient for FakeCapabilities {
    async fn layer_info(&self, request: &CapabilitiesRequest) -> HarvestResult<LayerCapabilities> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.layers.get(&request.layer).cloned().ok_or_else(|| {
            HarvestError::data_shape(request.endpoint.clone(), "layer not found")
        })
    }
}

#[derive(Default)]
pub struct FakeDatacube {
    pub cube: Option<StacItem>,
}

#[async_trait]
impl DatacubeClient for FakeDatacube {
    async fn describe(
        &self,
        endpoint: &str,
        _collection_id: &str,
        _item_id: &str,
    ) -> HarvestResult<StacItem> {
        self.cube
            .clone()
            .ok_or_else(|| HarvestError::provider_fetch("xcube", endpoint, "HTTP 404 Not Found"))
    }
}

#[derive(Default)]
pub struct FakeCredentials {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CredentialProvider for FakeCredentials {
    async fn bearer_token(&self, _client_id: &str) -> HarvestResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("test-token".to_string())
    }
}

#[derive(Default)]
pub struct FakeContent {
    pub documents: HashMap<String, String>,
}

#[async_trait]
impl ContentFetcher for FakeContent {
    async fn fetch_text(&self, url: &str) -> HarvestResult<String> {
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| HarvestError::provider_fetch("content", url, "HTTP 404 Not Found"))
    }
}

pub struct FakeLicenses;

impl LicenseLookup for FakeLicenses {
    fn lookup(&self, id: &str) -> Option<LicenseInfo> {
        (id == "CC-BY-4.0").then(|| LicenseInfo {
            id: "CC-BY-4.0".to_string(),
            sources: vec!["https://creativecommons.org/licenses/by/4.0/legalcode".to_string()],
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

pub const ASSETS_ENDPOINT: &str = "https://assets.example.com/";

/// Every fake, kept around so tests can inspect recorded calls.
#[derive(Default)]
pub struct Fakes {
    pub stac: Arc<FakeStac>,
    pub tabular: Arc<FakeTabular>,
    pub capabilities: Arc<FakeCapabilities>,
    pub datacube: Arc<FakeDatacube>,
    pub credentials: Arc<FakeCredentials>,
    pub content: Arc<FakeContent>,
}

impl Fakes {
    pub fn clients(&self) -> Clients {
        Clients {
            stac: self.stac.clone(),
            tabular: self.tabular.clone(),
            capabilities: self.capabilities.clone(),
            datacube: self.datacube.clone(),
            credentials: self.credentials.clone(),
            content: self.content.clone(),
            licenses: Arc::new(FakeLicenses),
        }
    }

    pub fn context(&self) -> HarvestContext {
        self.context_with(HarvestSettings::default())
    }

    pub fn context_with(&self, settings: HarvestSettings) -> HarvestContext {
        HarvestContext::new(Arc::new(settings), self.clients(), ASSETS_ENDPOINT).with_now(now())
    }
}

/// The fixed reference instant used by every test.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

// ============================================================================
// Builders
// ============================================================================

pub fn stac_item(id: &str, datetime: &str, bbox: [f64; 4]) -> StacItem {
    serde_json::from_value(json!({
        "id": id,
        "bbox": bbox,
        "geometry": null,
        "properties": {"datetime": datetime},
        "assets": {
            "cog_default": {"href": format!("s3://bucket/{}.tif", id), "type": "image/tiff"}
        }
    }))
    .unwrap()
}

/// Parse a collection definition from YAML.
pub fn definition(yaml: &str) -> CollectionDefinition {
    serde_yaml::from_str(yaml).unwrap()
}
