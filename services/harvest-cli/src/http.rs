//! reqwest-backed collaborators.
//!
//! One shared [`Client`] serves STAC searches, tabular queries, capabilities
//! documents, datacube descriptions and markdown content. Failures are
//! reported as `ProviderFetch` errors and never retried here.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use harvest_common::{format_zulu, HarvestError, HarvestResult};
use harvester::{
    CapabilitiesClient, CapabilitiesRequest, ContentFetcher, DatacubeClient, LayerCapabilities,
    ServiceKind, StacItem, StacSearch, StacSearchClient, TabularClient,
};

/// Items requested per search page.
const PAGE_SIZE: usize = 100;

/// Upper bound on followed `next` links for one search.
const MAX_PAGES: usize = 500;

/// HTTP implementation of every fetch-style collaborator.
pub struct HttpClients {
    client: Client,
}

impl HttpClients {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// The underlying client, shared with the credential provider.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    async fn get_text(&self, provider: &str, url: &str) -> HarvestResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| HarvestError::provider_fetch(provider, url, e))?;
        response
            .text()
            .await
            .map_err(|e| HarvestError::provider_fetch(provider, url, e))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        provider: &str,
        url: &str,
    ) -> HarvestResult<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| HarvestError::provider_fetch(provider, url, e))?;
        response
            .json::<T>()
            .await
            .map_err(|e| HarvestError::provider_fetch(provider, url, e))
    }
}

// ============================================================================
// STAC search
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    features: Vec<StacItem>,
    #[serde(default)]
    links: Vec<PageLink>,
}

#[derive(Debug, Deserialize)]
struct PageLink {
    rel: String,
    href: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    body: Option<Value>,
}

/// The next request to issue for a paged search.
struct PageRequest {
    method: Method,
    url: String,
    body: Option<Value>,
}

impl SearchPage {
    fn next(&self) -> Option<PageRequest> {
        let link = self.links.iter().find(|l| l.rel == "next")?;
        let method = match link.method.as_deref() {
            Some(m) if m.eq_ignore_ascii_case("POST") => Method::POST,
            _ => Method::GET,
        };
        let body = if method == Method::POST {
            link.body.clone()
        } else {
            None
        };
        Some(PageRequest {
            method,
            url: link.href.clone(),
            body,
        })
    }
}

fn search_body(search: &StacSearch) -> Value {
    json!({
        "collections": [search.collection],
        "bbox": search.bbox.to_array(),
        "datetime": format!("{}/{}", format_zulu(&search.start), format_zulu(&search.end)),
        "limit": PAGE_SIZE,
    })
}

fn search_url(endpoint: &str) -> String {
    format!("{}/search", endpoint.trim_end_matches('/'))
}

fn with_headers(mut request: RequestBuilder, headers: &[(String, String)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

#[async_trait]
impl StacSearchClient for HttpClients {
    #[instrument(skip_all, fields(endpoint = %search.endpoint, collection = %search.collection))]
    async fn search(&self, search: &StacSearch) -> HarvestResult<Vec<StacItem>> {
        let mut items = Vec::new();
        let mut request = Some(PageRequest {
            method: Method::POST,
            url: search_url(&search.endpoint),
            body: Some(search_body(search)),
        });

        let mut pages = 0;
        while let Some(page_request) = request.take() {
            pages += 1;
            if pages > MAX_PAGES {
                warn!(pages = MAX_PAGES, "Search page limit reached, truncating results");
                break;
            }

            let mut builder = self
                .client
                .request(page_request.method, &page_request.url);
            builder = with_headers(builder, &search.headers);
            if let Some(body) = &page_request.body {
                builder = builder.json(body);
            }

            let page: SearchPage = builder
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| HarvestError::provider_fetch("STAC", &page_request.url, e))?
                .json()
                .await
                .map_err(|e| HarvestError::provider_fetch("STAC", &page_request.url, e))?;

            debug!(page = pages, features = page.features.len(), "Search page received");
            request = page.next();
            items.extend(page.features);
        }

        Ok(items)
    }
}

// ============================================================================
// Tabular queries
// ============================================================================

#[async_trait]
impl TabularClient for HttpClients {
    #[instrument(skip(self))]
    async fn query(&self, url: &str) -> HarvestResult<Vec<Map<String, Value>>> {
        let rows: Vec<Map<String, Value>> = self.get_json("GeoDB", url).await?;
        debug!(rows = rows.len(), "Tabular query returned");
        Ok(rows)
    }
}

// ============================================================================
// Capabilities documents
// ============================================================================

fn capabilities_url(request: &CapabilitiesRequest) -> String {
    let base = request.endpoint.trim_end_matches(&['?', '&'][..]);
    let separator = if base.contains('?') { '&' } else { '?' };
    match request.kind {
        ServiceKind::Wms => format!(
            "{}{}SERVICE=WMS&REQUEST=GetCapabilities&VERSION={}",
            base,
            separator,
            request.version.as_deref().unwrap_or("1.1.1")
        ),
        ServiceKind::Wmts => format!(
            "{}{}SERVICE=WMTS&REQUEST=GetCapabilities",
            base, separator
        ),
    }
}

fn ogc_kind(kind: ServiceKind) -> ogc_capabilities::ServiceKind {
    match kind {
        ServiceKind::Wms => ogc_capabilities::ServiceKind::Wms,
        ServiceKind::Wmts => ogc_capabilities::ServiceKind::Wmts,
    }
}

#[async_trait]
impl CapabilitiesClient for HttpClients {
    #[instrument(skip_all, fields(endpoint = %request.endpoint, layer = %request.layer))]
    async fn layer_info(&self, request: &CapabilitiesRequest) -> HarvestResult<LayerCapabilities> {
        let kind = ogc_kind(request.kind);
        let url = capabilities_url(request);
        let xml = self.get_text(kind.as_str(), &url).await?;

        let layer = ogc_capabilities::find_layer(&xml, kind, &request.layer)
            .map_err(|e| HarvestError::data_shape(format!("{} capabilities", kind.as_str()), e.to_string()))?;

        Ok(LayerCapabilities {
            bbox: layer.bbox,
            time_positions: layer.time_positions,
        })
    }
}

// ============================================================================
// Datacubes and content
// ============================================================================

#[async_trait]
impl DatacubeClient for HttpClients {
    #[instrument(skip(self))]
    async fn describe(
        &self,
        endpoint: &str,
        collection_id: &str,
        item_id: &str,
    ) -> HarvestResult<StacItem> {
        let url = format!(
            "{}/collections/{}/items/{}",
            endpoint.trim_end_matches('/'),
            collection_id,
            item_id
        );
        self.get_json("xcube", &url).await
    }
}

#[async_trait]
impl ContentFetcher for HttpClients {
    async fn fetch_text(&self, url: &str) -> HarvestResult<String> {
        self.get_text("content", url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use harvest_common::BoundingBox;

    fn request(endpoint: &str, kind: ServiceKind, version: Option<&str>) -> CapabilitiesRequest {
        CapabilitiesRequest {
            endpoint: endpoint.to_string(),
            layer: "layer".to_string(),
            version: version.map(str::to_string),
            kind,
        }
    }

    #[test]
    fn test_capabilities_url() {
        assert_eq!(
            capabilities_url(&request("https://wms.example.com/ows", ServiceKind::Wms, Some("1.3.0"))),
            "https://wms.example.com/ows?SERVICE=WMS&REQUEST=GetCapabilities&VERSION=1.3.0"
        );
        assert_eq!(
            capabilities_url(&request("https://wms.example.com/ows?map=x", ServiceKind::Wms, None)),
            "https://wms.example.com/ows?map=x&SERVICE=WMS&REQUEST=GetCapabilities&VERSION=1.1.1"
        );
        assert_eq!(
            capabilities_url(&request("https://tiles.example.com/wmts", ServiceKind::Wmts, None)),
            "https://tiles.example.com/wmts?SERVICE=WMTS&REQUEST=GetCapabilities"
        );
    }

    #[test]
    fn test_search_body() {
        let search = StacSearch {
            endpoint: "https://stac.example.com/api/".to_string(),
            collection: "no2".to_string(),
            bbox: BoundingBox::new(-10.0, 40.0, 10.0, 50.0),
            start: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            headers: Vec::new(),
        };

        let body = search_body(&search);
        assert_eq!(body["collections"], json!(["no2"]));
        assert_eq!(body["bbox"], json!([-10.0, 40.0, 10.0, 50.0]));
        assert_eq!(body["datetime"], "2020-01-01T00:00:00Z/2021-01-01T00:00:00Z");
        assert_eq!(search_url(&search.endpoint), "https://stac.example.com/api/search");
    }

    #[test]
    fn test_next_page_link() {
        let page: SearchPage = serde_json::from_value(json!({
            "features": [],
            "links": [
                {"rel": "self", "href": "https://stac.example.com/search"},
                {"rel": "next", "href": "https://stac.example.com/search", "method": "POST",
                 "body": {"token": "abc"}}
            ]
        }))
        .unwrap();

        let next = page.next().unwrap();
        assert_eq!(next.method, Method::POST);
        assert_eq!(next.body, Some(json!({"token": "abc"})));

        let last: SearchPage = serde_json::from_value(json!({"features": []})).unwrap();
        assert!(last.next().is_none());
    }
}
