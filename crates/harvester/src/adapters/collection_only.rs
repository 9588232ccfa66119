//! Purely descriptive collections: configured times, no remote calls.

use catalog_model::{CollectionScope, TemporalExtent};
use harvest_common::{parse_iso8601, HarvestResult, TimeInterval};

use crate::config::{CollectionDefinition, CollectionOnlyEndpoint, EndpointConfig};
use crate::resolver::get_or_create;
use crate::HarvestContext;

use super::add_time_items;

pub(super) async fn handle(
    ctx: &HarvestContext,
    scope: &mut dyn CollectionScope,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
    only: &CollectionOnlyEndpoint,
) -> HarvestResult<()> {
    let mut entry = get_or_create(ctx, scope, &meta.name, meta, Some(endpoint)).await?;
    let times = entry.take_times();
    let collection = entry.collection();

    match times {
        Some(times) if !only.disable_items => {
            add_time_items(ctx, collection, meta, endpoint, &times, only.overwrite_bbox, None)?;
            collection.update_extent_from_items();
        }
        Some(times) => {
            // Items disabled: the time list only shapes the temporal extent.
            let mut parsed = Vec::with_capacity(times.len());
            for time in &times {
                parsed.push(parse_iso8601(time)?);
            }
            if let (Some(start), Some(end)) = (parsed.iter().min(), parsed.iter().max()) {
                collection.extent.temporal =
                    TemporalExtent::new(TimeInterval::closed(*start, *end));
            }
        }
        None => {}
    }
    collection.extent.apply_override(only.overwrite_bbox, None);

    entry.attach(ctx, meta, Some(endpoint));
    Ok(())
}
