//! STAC-backed adapters: Sentinel Hub catalog and VEDA.

use std::collections::HashSet;

use tracing::{debug, info};

use catalog_model::{CollectionScope, Item};
use harvest_common::{format_zulu, BoundingBox, HarvestResult};

use crate::clients::{StacItem, StacSearch};
use crate::config::{
    CollectionDefinition, EndpointConfig, SentinelHubStacEndpoint, VedaEndpoint, VedaType,
};
use crate::resolver::{get_or_create, get_or_create_location};
use crate::visualization::{self, VisualizationContext};
use crate::HarvestContext;

use super::{add_collection_link, add_item_with_time, finish_extent, rollup_locations};

/// Where and how to search.
struct StacSource {
    endpoint: String,
    collection: String,
    bbox: Option<BoundingBox>,
    headers: Vec<(String, String)>,
}

pub(super) async fn handle_sentinel_hub(
    ctx: &HarvestContext,
    scope: &mut dyn CollectionScope,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
    sh: &SentinelHubStacEndpoint,
) -> HarvestResult<()> {
    let client_id = ctx.settings.sh_client_id.as_deref().unwrap_or_default();
    let token = ctx.clients.credentials.bearer_token(client_id).await?;

    let source = StacSource {
        endpoint: ctx.settings.sh_catalog_url.clone(),
        collection: sh.remote_collection(),
        bbox: sh.bbox,
        headers: vec![("Authorization".to_string(), format!("Bearer {}", token))],
    };
    run(ctx, scope, meta, endpoint, &source).await
}

pub(super) async fn handle_veda(
    ctx: &HarvestContext,
    scope: &mut dyn CollectionScope,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
    veda: &VedaEndpoint,
) -> HarvestResult<()> {
    let source = StacSource {
        endpoint: veda.endpoint.clone(),
        collection: veda.collection_id.clone(),
        bbox: veda.bbox,
        headers: Vec::new(),
    };
    run(ctx, scope, meta, endpoint, &source).await
}

async fn run(
    ctx: &HarvestContext,
    scope: &mut dyn CollectionScope,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
    source: &StacSource,
) -> HarvestResult<()> {
    if !meta.locations.is_empty() {
        return fan_out(ctx, scope, meta, endpoint, source).await;
    }

    let mut entry = get_or_create(ctx, scope, &meta.name, meta, Some(endpoint)).await?;
    let bbox = source.bbox.unwrap_or_else(BoundingBox::global);
    let added = populate(ctx, entry.collection(), meta, endpoint, source, bbox, None, None).await?;

    if collection_level_link(endpoint) {
        add_collection_link(ctx, entry.collection(), meta, endpoint);
    }
    finish_extent(ctx, entry.collection(), endpoint)?;
    entry.attach(ctx, meta, Some(endpoint));

    info!(collection = %meta.name, items = added, "STAC collection harvested");
    Ok(())
}

/// One child collection per location under a root named after the collection.
async fn fan_out(
    ctx: &HarvestContext,
    scope: &mut dyn CollectionScope,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
    source: &StacSource,
) -> HarvestResult<()> {
    let mut root_entry = get_or_create(ctx, scope, &meta.name, meta, Some(endpoint)).await?;
    let root = root_entry.collection();

    for location in &meta.locations {
        let mut child = get_or_create_location(&mut *root, location, Some(endpoint));
        let bbox = location
            .bbox
            .or(source.bbox)
            .unwrap_or_else(BoundingBox::global);
        let added = populate(
            ctx,
            child.collection(),
            meta,
            endpoint,
            source,
            bbox,
            location.filter_dates.as_deref(),
            Some(&meta.name),
        )
        .await?;

        if collection_level_link(endpoint) {
            add_collection_link(ctx, child.collection(), meta, endpoint);
        }
        finish_extent(ctx, child.collection(), endpoint)?;
        child
            .collection()
            .extent
            .apply_override(location.overwrite_bbox, None);
        child.attach_location(location);

        debug!(location = %location.identifier, items = added, "Location harvested");
    }

    rollup_locations(root);
    root_entry.attach(ctx, meta, Some(endpoint));

    info!(
        collection = %meta.name,
        locations = meta.locations.len(),
        "STAC collection fanned out over locations"
    );
    Ok(())
}

/// Search and attach results, skipping known ids, dates already seen and
/// dates that are not allow-listed.
///
/// Returns the number of items added.
#[allow(clippy::too_many_arguments)]
async fn populate(
    ctx: &HarvestContext,
    collection: &mut catalog_model::Collection,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
    source: &StacSource,
    bbox: BoundingBox,
    filter_dates: Option<&[String]>,
    root_collection: Option<&str>,
) -> HarvestResult<usize> {
    let (start, end) = ctx.settings.search_window()?;
    let search = StacSearch {
        endpoint: source.endpoint.clone(),
        collection: source.collection.clone(),
        bbox,
        start,
        end,
        headers: source.headers.clone(),
    };
    let results = ctx.clients.stac.search(&search).await?;

    let mut seen_dates = HashSet::new();
    let mut added = 0;

    for stac_item in results {
        if collection.item(&stac_item.id).is_some() {
            continue;
        }
        let time = stac_item.item_time()?;
        let day = time.date_key();

        if let Some(allowed) = filter_dates {
            if !allowed.iter().any(|d| d.get(..10).unwrap_or(d) == day) {
                continue;
            }
        }
        if !seen_dates.insert(day) {
            debug!(item = %stac_item.id, "Skipping item for an already harvested date");
            continue;
        }

        let viz = item_visualization(ctx, meta, endpoint, &stac_item, &format_zulu(&time.start()));
        let mut item = to_item(stac_item, time);
        if let Some(root) = root_collection {
            item.set_root_collection(root);
        }
        if let Some(link) = viz {
            item.add_link(link);
        }
        add_item_with_time(collection, item);
        added += 1;
    }
    Ok(added)
}

/// Per-item visualization link, when the item carries what the template needs.
fn item_visualization(
    ctx: &HarvestContext,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
    item: &StacItem,
    time: &str,
) -> Option<catalog_model::Link> {
    let viz = match endpoint {
        EndpointConfig::SentinelHubStac(_) => VisualizationContext::at_time(time),
        EndpointConfig::Veda(veda) => match veda.veda_type {
            Some(VedaType::Cog) => VisualizationContext {
                file_url: Some(item.assets.get("cog_default")?.href.as_str()),
                ..Default::default()
            },
            Some(VedaType::Raster)
                if !veda.assets.is_empty()
                    && veda.assets.iter().all(|a| item.assets.contains_key(a)) =>
            {
                VisualizationContext {
                    item_id: Some(item.id.as_str()),
                    ..Default::default()
                }
            }
            _ => return None,
        },
        _ => return None,
    };
    visualization::synthesize(endpoint, meta, &ctx.settings, &viz)
}

/// Tile endpoints that are not item-specific get one collection-level link.
fn collection_level_link(endpoint: &EndpointConfig) -> bool {
    matches!(
        endpoint,
        EndpointConfig::Veda(VedaEndpoint {
            veda_type: Some(VedaType::Tiles) | None,
            ..
        })
    )
}

fn to_item(stac_item: StacItem, time: catalog_model::ItemTime) -> Item {
    let bbox = stac_item.bounding_box();
    let mut item = Item::new(stac_item.id, time);
    item.bbox = bbox;
    item.geometry = stac_item.geometry;
    item.properties = stac_item.properties;
    for key in ["datetime", "start_datetime", "end_datetime"] {
        item.properties.remove(key);
    }
    item.assets = stac_item.assets;
    item
}
