//! Catalog aggregation engine.
//!
//! Turns declarative endpoint descriptions into a deduplicated, extent-correct
//! catalog tree.
//!
//! # Architecture
//!
//! - [`config`]: the declarative model (catalog, collection and endpoint definitions)
//! - [`clients`]: traits for every external collaborator (STAC search, tabular
//!   queries, capabilities documents, datacubes, credentials, content, licenses)
//! - [`visualization`]: pure URL-template synthesis per provider
//! - [`adapters`]: one adapter per provider family
//! - [`resolver`]: get-or-create and idempotent attach of collections
//! - [`composer`]: collection, subcollection and indicator composition
//! - [`driver`]: one concurrent build task per catalog definition

pub mod adapters;
pub mod clients;
pub mod composer;
pub mod config;
pub mod driver;
pub mod metadata;
pub mod resolver;
pub mod visualization;

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use clients::{
    CapabilitiesClient, CapabilitiesRequest, Clients, ContentFetcher, CredentialProvider,
    DatacubeClient, LayerCapabilities, LicenseInfo, LicenseLookup, ServiceKind, StacItem,
    StacSearch, StacSearchClient, TabularClient,
};
pub use config::{
    CatalogDefinition, CatalogEntry, CollectionDefinition, EmptyExtentPolicy, EndpointConfig,
    HarvestSettings,
};
pub use driver::{BuildReport, CatalogBuilder, CatalogFailure};

/// Everything an adapter needs besides the scope it writes into.
#[derive(Clone)]
pub struct HarvestContext {
    pub settings: Arc<HarvestSettings>,
    pub clients: Clients,
    /// Base URL that relative asset hrefs are resolved against.
    pub assets_endpoint: String,
    /// Reference instant for `today` in generated time lists.
    pub now: DateTime<Utc>,
}

impl HarvestContext {
    pub fn new(settings: Arc<HarvestSettings>, clients: Clients, assets_endpoint: impl Into<String>) -> Self {
        Self {
            settings,
            clients,
            assets_endpoint: assets_endpoint.into(),
            now: Utc::now(),
        }
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Resolve an href against the assets endpoint unless it is already absolute.
    pub fn asset_href(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!(
                "{}/{}",
                self.assets_endpoint.trim_end_matches('/'),
                href.trim_start_matches('/')
            )
        }
    }
}
