//! xcube datacubes: one item per temporal coordinate.

use serde_json::{Map, Value};
use tracing::info;

use catalog_model::{CollectionScope, FieldKey};
use harvest_common::{HarvestError, HarvestResult};

use crate::config::{CollectionDefinition, EndpointConfig, XcubeEndpoint};
use crate::resolver::get_or_create;
use crate::HarvestContext;

use super::{add_collection_link, add_time_items, finish_extent};

pub(super) async fn handle(
    ctx: &HarvestContext,
    scope: &mut dyn CollectionScope,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
    xcube: &XcubeEndpoint,
) -> HarvestResult<()> {
    let describe_endpoint = xcube.stac_endpoint.as_deref().unwrap_or(&xcube.endpoint);
    let cube = ctx
        .clients
        .datacube
        .describe(describe_endpoint, &xcube.collection_id, &xcube.datacube_id)
        .await?;
    let resource = format!("datacube {}", xcube.datacube_id);

    let variables = object_property(&cube.properties, "cube:variables", &resource)?;
    let variable = variables.get(&xcube.variable).ok_or_else(|| {
        HarvestError::data_shape(
            resource.clone(),
            format!("variable '{}' is not part of the cube", xcube.variable),
        )
    })?;

    let dimensions = object_property(&cube.properties, "cube:dimensions", &resource)?;
    let times = temporal_values(dimensions)
        .ok_or_else(|| HarvestError::data_shape(resource.clone(), "no temporal dimension"))?;

    let mut entry = get_or_create(ctx, scope, &meta.name, meta, Some(endpoint)).await?;
    let collection = entry.collection();

    if let Some(unit) = variable.get("unit").and_then(Value::as_str) {
        if meta.y_axis.is_none() && !collection.extra_fields.contains(FieldKey::YAxis) {
            collection.extra_fields.insert(FieldKey::YAxis, unit);
        }
    }

    add_time_items(
        ctx,
        collection,
        meta,
        endpoint,
        &times,
        cube.bounding_box(),
        cube.geometry.as_ref(),
    )?;
    add_collection_link(ctx, collection, meta, endpoint);
    finish_extent(ctx, collection, endpoint)?;

    info!(
        collection = %meta.name,
        datacube = %xcube.datacube_id,
        items = collection.items.len(),
        "Datacube sliced into items"
    );
    entry.attach(ctx, meta, Some(endpoint));
    Ok(())
}

fn object_property<'a>(
    properties: &'a Map<String, Value>,
    key: &str,
    resource: &str,
) -> HarvestResult<&'a Map<String, Value>> {
    properties
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| HarvestError::data_shape(resource, format!("missing '{}'", key)))
}

/// Values of the first dimension typed `temporal`, else of the one named `time`.
fn temporal_values(dimensions: &Map<String, Value>) -> Option<Vec<String>> {
    let dimension = dimensions
        .values()
        .find(|d| d.get("type").and_then(Value::as_str) == Some("temporal"))
        .or_else(|| dimensions.get("time"))?;

    Some(
        dimension
            .get("values")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    )
}
