//! Sentinel Hub WMS: items from configured times, optionally per location.

use tracing::info;

use catalog_model::CollectionScope;
use harvest_common::HarvestResult;

use crate::config::{CollectionDefinition, EndpointConfig, SentinelHubWmsEndpoint};
use crate::resolver::{get_or_create, get_or_create_location};
use crate::HarvestContext;

use super::{add_collection_link, add_time_items, rollup_locations};

pub(super) async fn handle_wms(
    ctx: &HarvestContext,
    scope: &mut dyn CollectionScope,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
    sh: &SentinelHubWmsEndpoint,
) -> HarvestResult<()> {
    let mut entry = get_or_create(ctx, scope, &meta.name, meta, Some(endpoint)).await?;
    let times = entry.take_times();

    if meta.locations.is_empty() {
        let collection = entry.collection();
        add_time_items(
            ctx,
            collection,
            meta,
            endpoint,
            times.as_deref().unwrap_or_default(),
            sh.overwrite_bbox,
            None,
        )?;
        add_collection_link(ctx, collection, meta, endpoint);
        collection.update_extent_from_items();
        collection.extent.apply_override(sh.overwrite_bbox, None);
        info!(collection = %meta.name, items = collection.items.len(), "Sentinel Hub WMS collection built");
    } else {
        let root = entry.collection();
        for location in &meta.locations {
            let mut child = get_or_create_location(&mut *root, location, Some(endpoint));
            let location_times = child.take_times().unwrap_or_default();
            let bbox = location.bbox.or(sh.overwrite_bbox);

            let collection = child.collection();
            add_time_items(ctx, collection, meta, endpoint, &location_times, bbox, None)?;
            add_collection_link(ctx, collection, meta, endpoint);
            collection.update_extent_from_items();
            collection
                .extent
                .apply_override(location.overwrite_bbox.or(bbox), None);
            child.attach_location(location);
        }
        rollup_locations(root);
        info!(
            collection = %meta.name,
            locations = meta.locations.len(),
            "Sentinel Hub WMS collection built per location"
        );
    }

    entry.attach(ctx, meta, Some(endpoint));
    Ok(())
}
