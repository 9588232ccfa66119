//! Concurrent build driver.
//!
//! One task per catalog definition. Tasks share nothing but the read-only
//! settings and the collaborator handles; each owns its catalog. Every task
//! runs to completion before the first failure is reported.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{error, info, instrument, warn};

use catalog_model::Catalog;
use harvest_common::{HarvestError, HarvestResult};

use crate::clients::Clients;
use crate::composer::{compose_collection, compose_indicator};
use crate::config::{CatalogDefinition, CatalogEntry, HarvestSettings};
use crate::HarvestContext;

/// A catalog whose build stopped at an error.
#[derive(Debug)]
pub struct CatalogFailure {
    pub catalog: String,
    pub error: HarvestError,
    /// Everything attached before the error.
    pub partial: Catalog,
}

/// Outcome of building several catalogs.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Fully built catalogs, in definition order.
    pub catalogs: Vec<Catalog>,
    /// Failed catalogs, in definition order.
    pub failures: Vec<CatalogFailure>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The built catalogs, or the first failure.
    pub fn into_result(self) -> HarvestResult<Vec<Catalog>> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.catalogs),
        }
    }
}

/// Builds catalog definitions concurrently.
pub struct CatalogBuilder {
    settings: Arc<HarvestSettings>,
    clients: Clients,
    now: Option<DateTime<Utc>>,
}

impl CatalogBuilder {
    pub fn new(settings: HarvestSettings, clients: Clients) -> Self {
        Self {
            settings: Arc::new(settings),
            clients,
            now: None,
        }
    }

    /// Pin the reference instant used for generated time lists.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn context(&self, definition: &CatalogDefinition) -> HarvestContext {
        let ctx = HarvestContext::new(
            self.settings.clone(),
            self.clients.clone(),
            definition.assets_endpoint.clone(),
        );
        match self.now {
            Some(now) => ctx.with_now(now),
            None => ctx,
        }
    }

    /// Build every definition on its own task and wait for all of them.
    #[instrument(skip_all, fields(catalogs = definitions.len()))]
    pub async fn build_all(&self, definitions: Vec<CatalogDefinition>) -> BuildReport {
        let mut shells = Vec::with_capacity(definitions.len());
        let mut handles = Vec::with_capacity(definitions.len());

        for definition in definitions {
            let ctx = self.context(&definition);
            shells.push(Catalog::new(
                definition.id.clone(),
                definition.title.clone(),
                definition.description.clone(),
            ));
            handles.push(tokio::spawn(async move {
                build_catalog(&ctx, &definition).await
            }));
        }

        let results = join_all(handles).await;

        let mut report = BuildReport::default();
        for (shell, result) in shells.into_iter().zip(results) {
            match result {
                Ok((catalog, None)) => report.catalogs.push(catalog),
                Ok((partial, Some(error))) => report.failures.push(CatalogFailure {
                    catalog: partial.id.clone(),
                    error,
                    partial,
                }),
                Err(join_error) => {
                    error!(catalog = %shell.id, error = %join_error, "Catalog build task aborted");
                    report.failures.push(CatalogFailure {
                        catalog: shell.id.clone(),
                        error: HarvestError::TaskAborted(join_error.to_string()),
                        partial: shell,
                    });
                }
            }
        }

        info!(
            built = report.catalogs.len(),
            failed = report.failures.len(),
            "Catalog builds finished"
        );
        report
    }
}

/// Build one catalog, stopping at the first failing entry.
///
/// Entries attached before the failure stay in the returned catalog.
#[instrument(skip_all, fields(catalog = %definition.id))]
pub async fn build_catalog(
    ctx: &HarvestContext,
    definition: &CatalogDefinition,
) -> (Catalog, Option<HarvestError>) {
    let mut catalog = Catalog::new(
        definition.id.clone(),
        definition.title.clone(),
        definition.description.clone(),
    );

    for entry in &definition.entries {
        let result = match entry {
            CatalogEntry::Collection(def) => compose_collection(ctx, &mut catalog, def).await,
            CatalogEntry::Indicator {
                definition: def,
                members,
            } => compose_indicator(ctx, &mut catalog, def, members).await,
        };

        if let Err(e) = result {
            error!(
                entry = %entry.name(),
                collection = e.collection().unwrap_or_default(),
                error = %e,
                "Catalog build failed"
            );
            return (catalog, Some(e));
        }
    }

    if catalog.children.is_empty() {
        warn!("Catalog has no collections");
    }
    info!(collections = catalog.children.len(), "Catalog built");
    (catalog, None)
}
