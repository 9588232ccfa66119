//! Endpoint adapters, one per provider family.
//!
//! Every adapter resolves its collection in the given scope, populates items
//! and visualization links, computes the extent and finally attaches the
//! collection. A failing adapter returns before attaching, leaving siblings
//! that were already attached untouched.

mod capabilities;
mod collection_only;
mod geodb;
mod sentinel_hub;
mod stac;
mod vector_tiles;
mod xcube;

use std::collections::HashSet;

use serde_json::Value;
use tracing::{info, instrument};

use catalog_model::{Collection, CollectionScope, FieldKey, Item, ItemTime, Link};
use harvest_common::{format_zulu, parse_iso8601, BoundingBox, HarvestError, HarvestResult};

use crate::config::{CollectionDefinition, EmptyExtentPolicy, EndpointConfig};
use crate::visualization::{self, VisualizationContext};
use crate::HarvestContext;

/// Run the adapter matching the endpoint variant.
#[instrument(skip_all, fields(collection = %meta.name, provider = %endpoint.name()))]
pub async fn dispatch(
    ctx: &HarvestContext,
    scope: &mut dyn CollectionScope,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
) -> HarvestResult<()> {
    info!("Processing resource");
    match endpoint {
        EndpointConfig::SentinelHubStac(sh) => stac::handle_sentinel_hub(ctx, scope, meta, endpoint, sh).await,
        EndpointConfig::Veda(veda) => stac::handle_veda(ctx, scope, meta, endpoint, veda).await,
        EndpointConfig::SentinelHubWms(sh) => {
            sentinel_hub::handle_wms(ctx, scope, meta, endpoint, sh).await
        }
        EndpointConfig::GeoDb(geodb) => geodb::handle(ctx, scope, meta, endpoint, geodb).await,
        EndpointConfig::GeoDbVectorTiles(_) => vector_tiles::handle(ctx, scope, meta, endpoint).await,
        EndpointConfig::Wms(_) | EndpointConfig::Wmts(_) => {
            capabilities::handle(ctx, scope, meta, endpoint).await
        }
        EndpointConfig::Xcube(xcube) => xcube::handle(ctx, scope, meta, endpoint, xcube).await,
        EndpointConfig::CollectionOnly(only) => {
            collection_only::handle(ctx, scope, meta, endpoint, only).await
        }
    }
}

/// Add an item, bubbling its time onto the item link.
pub(crate) fn add_item_with_time(collection: &mut Collection, item: Item) -> &mut Link {
    let time = item.time;
    let link = collection.add_item(item);
    match time {
        ItemTime::Instant(t) => {
            link.extra_fields.insert(FieldKey::Datetime, format_zulu(&t));
        }
        ItemTime::Range { start, end } => {
            link.extra_fields
                .insert(FieldKey::StartDatetime, format_zulu(&start));
            link.extra_fields.insert(FieldKey::EndDatetime, format_zulu(&end));
        }
    }
    link
}

/// Add one instant item per time value, each with a time-scoped visualization link.
///
/// Values are normalised to `YYYY-MM-DDTHH:MM:SSZ`, which is also the item
/// id; values that normalise to an instant the collection already holds are
/// skipped.
pub(crate) fn add_time_items(
    ctx: &HarvestContext,
    collection: &mut Collection,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
    times: &[String],
    bbox: Option<BoundingBox>,
    geometry: Option<&Value>,
) -> HarvestResult<()> {
    let with_links = !matches!(
        endpoint,
        EndpointConfig::CollectionOnly(_) | EndpointConfig::GeoDb(_)
    );
    let mut seen = HashSet::new();

    for time in times {
        let instant = parse_iso8601(time)?;
        let stamp = format_zulu(&instant);
        if !seen.insert(stamp.clone()) || collection.item(&stamp).is_some() {
            continue;
        }

        let mut item = Item::new(stamp.clone(), ItemTime::Instant(instant));
        if let Some(bbox) = bbox {
            item = item.with_bbox(bbox);
        }
        if let Some(geometry) = geometry {
            item = item.with_geometry(geometry.clone());
        }
        if with_links {
            let viz = VisualizationContext::at_time(&stamp).with_endpoint_styles(endpoint);
            if let Some(link) = visualization::synthesize(endpoint, meta, &ctx.settings, &viz) {
                item.add_link(link);
            }
        }
        add_item_with_time(collection, item);
    }
    Ok(())
}

/// Add the collection-level visualization link (no time scope).
pub(crate) fn add_collection_link(
    ctx: &HarvestContext,
    collection: &mut Collection,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
) {
    if let Some(link) = visualization::synthesize(
        endpoint,
        meta,
        &ctx.settings,
        &VisualizationContext::default().with_endpoint_styles(endpoint),
    ) {
        collection.add_link(link);
    }
}

/// Recompute the extent from items, enforce the empty-data policy, then apply overrides.
pub(crate) fn finish_extent(
    ctx: &HarvestContext,
    collection: &mut Collection,
    endpoint: &EndpointConfig,
) -> HarvestResult<()> {
    if collection.items.is_empty() && ctx.settings.empty_extent == EmptyExtentPolicy::Fail {
        return Err(HarvestError::data_shape(
            collection.id.clone(),
            format!("{} returned no items", endpoint.name()),
        ));
    }
    collection.update_extent_from_items();
    collection
        .extent
        .apply_override(endpoint.overwrite_bbox(), None);
    Ok(())
}

/// Replace a fan-out root's spatial extent with its children's primary boxes
/// and its temporal extent with their envelope.
pub(crate) fn rollup_locations(root: &mut Collection) {
    let boxes: Vec<_> = root
        .children
        .iter()
        .map(|c| c.extent.spatial.primary())
        .collect();
    if let Some(spatial) = catalog_model::SpatialExtent::from_boxes(boxes) {
        root.extent.spatial = spatial;
    }
    if let Some(interval) =
        catalog_model::Extent::temporal_envelope(root.children.iter().map(|c| &c.extent))
    {
        root.extent.temporal = catalog_model::TemporalExtent::new(interval);
    }
}
