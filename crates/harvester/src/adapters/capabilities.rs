//! WMS and WMTS: one item per advertised (or configured) time.

use tracing::info;

use catalog_model::CollectionScope;
use harvest_common::{expand_time_positions, HarvestError, HarvestResult};

use crate::clients::{CapabilitiesRequest, LayerCapabilities, ServiceKind};
use crate::config::{CollectionDefinition, EndpointConfig};
use crate::resolver::get_or_create;
use crate::HarvestContext;

use super::{add_collection_link, add_time_items, finish_extent};

pub(super) async fn handle(
    ctx: &HarvestContext,
    scope: &mut dyn CollectionScope,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
) -> HarvestResult<()> {
    let request = match endpoint {
        EndpointConfig::Wms(wms) => CapabilitiesRequest {
            endpoint: wms.endpoint.clone(),
            layer: wms.layer_id.clone(),
            version: Some(wms.version.clone()),
            kind: ServiceKind::Wms,
        },
        EndpointConfig::Wmts(wmts) => CapabilitiesRequest {
            endpoint: wmts.endpoint.clone(),
            layer: wmts.layer_id.clone(),
            version: None,
            kind: ServiceKind::Wmts,
        },
        other => {
            return Err(HarvestError::configuration(
                meta.name.clone(),
                format!("{} is not a capabilities endpoint", other.name()),
            ))
        }
    };

    let mut entry = get_or_create(ctx, scope, &meta.name, meta, Some(endpoint)).await?;
    let configured_times = entry.take_times();
    let overwrite_bbox = endpoint.overwrite_bbox();

    // Nothing to learn from the document when both times and bbox are fixed.
    let layer = if configured_times.is_some() && overwrite_bbox.is_some() {
        LayerCapabilities::default()
    } else {
        ctx.clients.capabilities.layer_info(&request).await?
    };

    let times = match configured_times {
        Some(times) => times,
        None => expand_time_positions(&layer.time_positions)?,
    };
    let bbox = overwrite_bbox.or(layer.bbox.map(|b| b.rounded(5)));

    let collection = entry.collection();
    add_time_items(ctx, collection, meta, endpoint, &times, bbox, None)?;
    add_collection_link(ctx, collection, meta, endpoint);
    finish_extent(ctx, collection, endpoint)?;
    collection.extent.apply_override(bbox, None);

    info!(
        collection = %meta.name,
        layer = %request.layer,
        items = collection.items.len(),
        "Capabilities collection harvested"
    );
    entry.attach(ctx, meta, Some(endpoint));
    Ok(())
}
