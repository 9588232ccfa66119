//! GeoDB vector tiles: a tile-template link, no items.

use catalog_model::CollectionScope;
use harvest_common::HarvestResult;

use crate::config::{CollectionDefinition, EndpointConfig};
use crate::resolver::get_or_create;
use crate::HarvestContext;

use super::add_collection_link;

pub(super) async fn handle(
    ctx: &HarvestContext,
    scope: &mut dyn CollectionScope,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
) -> HarvestResult<()> {
    let mut entry = get_or_create(ctx, scope, &meta.name, meta, Some(endpoint)).await?;
    add_collection_link(ctx, entry.collection(), meta, endpoint);
    entry.attach(ctx, meta, Some(endpoint));
    Ok(())
}
