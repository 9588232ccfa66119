//! Collection, subcollection and indicator composition.
//!
//! A collection runs its resources in declaration order against the same
//! scope, so several resources naming the same collection merge into one.
//! Subcollections either become located children of the collection or have
//! their items elevated into it. Indicators compose their member collections
//! as children and then roll extents and summaries up from them.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, instrument};

use catalog_model::{
    Catalog, Collection, CollectionScope, Extent, FieldKey, SpatialExtent, TemporalExtent,
};
use harvest_common::{BoundingBox, HarvestError, HarvestResult};

use crate::adapters;
use crate::config::{CollectionDefinition, Subcollection};
use crate::resolver::{decorate_location_link, get_or_create};
use crate::HarvestContext;

/// Compose one collection definition into `scope`.
///
/// Errors are wrapped with the collection name.
pub fn compose_collection<'a>(
    ctx: &'a HarvestContext,
    scope: &'a mut dyn CollectionScope,
    def: &'a CollectionDefinition,
) -> BoxFuture<'a, HarvestResult<()>> {
    async move {
        compose_resources(ctx, scope, def)
            .await
            .map_err(|e| e.in_collection(def.name.clone()))
    }
    .boxed()
}

/// Compose an indicator and its member collections into `catalog`.
#[instrument(skip_all, fields(indicator = %def.name, members = members.len()))]
pub async fn compose_indicator(
    ctx: &HarvestContext,
    catalog: &mut Catalog,
    def: &CollectionDefinition,
    members: &[CollectionDefinition],
) -> HarvestResult<()> {
    build_indicator(ctx, catalog, def, members)
        .await
        .map_err(|e| e.in_collection(def.name.clone()))
}

async fn build_indicator(
    ctx: &HarvestContext,
    catalog: &mut Catalog,
    def: &CollectionDefinition,
    members: &[CollectionDefinition],
) -> HarvestResult<()> {
    for resource in &def.resources {
        adapters::dispatch(ctx, catalog, def, resource).await?;
    }

    let mut entry = get_or_create(ctx, catalog, &def.name, def, None).await?;
    let indicator = entry.collection();
    for member in members {
        compose_collection(ctx, &mut *indicator, member).await?;
    }
    rollup_indicator(indicator);
    extract_summaries(indicator);
    info!(children = indicator.children.len(), "Indicator composed");

    entry.attach(ctx, def, None);
    Ok(())
}

async fn compose_resources(
    ctx: &HarvestContext,
    scope: &mut dyn CollectionScope,
    def: &CollectionDefinition,
) -> HarvestResult<()> {
    for resource in &def.resources {
        adapters::dispatch(ctx, scope, def, resource).await?;
    }

    if !def.resources.is_empty() && def.subcollections.is_empty() {
        return Ok(());
    }

    // Purely descriptive collections and subcollection parents.
    let mut entry = get_or_create(ctx, scope, &def.name, def, None).await?;
    if !def.subcollections.is_empty() {
        let parent = entry.collection();
        for sub in &def.subcollections {
            let sub_def = sub.definition.as_deref().ok_or_else(|| {
                HarvestError::configuration(&sub.collection, "subcollection definition not loaded")
            })?;
            if sub.is_located() {
                add_located_child(ctx, parent, sub, sub_def).await?;
            } else {
                elevate_items(ctx, parent, sub_def).await?;
            }
        }
        rollup_indicator(parent);
        extract_summaries(parent);
    }
    entry.attach(ctx, def, None);
    Ok(())
}

/// Compose `sub_def` as a child of `parent` and mark its link with the location.
async fn add_located_child(
    ctx: &HarvestContext,
    parent: &mut Collection,
    sub: &Subcollection,
    sub_def: &CollectionDefinition,
) -> HarvestResult<()> {
    compose_collection(ctx, &mut *parent, sub_def).await?;

    let name = sub.name.clone().unwrap_or_else(|| sub_def.name.clone());
    let id = sub.identifier.as_deref().unwrap_or(&sub_def.name);
    if let Some(link) = parent.child_link_mut(&sub_def.name) {
        decorate_location_link(link, id, &name, sub.latlng());
        if !sub.country.is_empty() {
            link.extra_fields.insert(FieldKey::Country, sub.country.clone());
        }
        link.title = Some(name.clone());
    }
    if let Some(child) = parent.child_mut(&sub_def.name) {
        child.title = name;
    }
    Ok(())
}

/// Build `sub_def` in a scratch catalog and copy every resulting item into `parent`.
async fn elevate_items(
    ctx: &HarvestContext,
    parent: &mut Collection,
    sub_def: &CollectionDefinition,
) -> HarvestResult<()> {
    let mut scratch = Catalog::new(format!("{}-scratch", sub_def.name), "", "");
    compose_collection(ctx, &mut scratch, sub_def).await?;

    let mut elevated = 0usize;
    for collection in scratch.all_collections() {
        for (item, source_link) in collection.items.iter().zip(collection.item_links()) {
            if parent.item(&item.id).is_some() {
                continue;
            }
            let fields = source_link.extra_fields.clone();
            let link = parent.add_item(item.clone());
            link.extra_fields.extend(&fields);

            if let Some(city) = fields.get(FieldKey::City) {
                parent.summaries.add_value(FieldKey::Cities, city);
            }
            if let Some(country) = fields.get(FieldKey::Country) {
                parent.summaries.add_value(FieldKey::Countries, country);
            }
            elevated += 1;
        }
    }
    debug!(subcollection = %sub_def.name, items = elevated, "Elevated subcollection items");
    Ok(())
}

/// Recompute an aggregating collection's extent from what it now holds.
///
/// The spatial extent is the overall box (items, else children, else the
/// current primary box) followed by every child's primary box. The temporal
/// extent is the item envelope, else the children's envelope.
pub fn rollup_indicator(collection: &mut Collection) {
    let item_extent =
        (!collection.items.is_empty()).then(|| Extent::from_items(&collection.items));

    let overall = match &item_extent {
        Some(extent) => extent.spatial.primary(),
        None => {
            let child_boxes: Vec<BoundingBox> = collection
                .children
                .iter()
                .map(|c| c.extent.spatial.primary())
                .collect();
            BoundingBox::union_all(child_boxes.iter())
                .unwrap_or_else(|| collection.extent.spatial.primary())
        }
    };
    collection.extent.spatial = SpatialExtent::new(overall);
    collection
        .extent
        .rollup_child_bboxes(collection.children.iter().map(|c| &c.extent));

    let interval = match item_extent {
        Some(extent) => Some(extent.temporal.primary()),
        None => Extent::temporal_envelope(collection.children.iter().map(|c| &c.extent)),
    };
    if let Some(interval) = interval {
        collection.extent.temporal = TemporalExtent::new(interval);
    }
}

/// Union descriptive fields of every child into the collection's summaries.
///
/// A child's `code` is summarised as `subcode`.
pub fn extract_summaries(collection: &mut Collection) {
    let Collection {
        children,
        summaries,
        ..
    } = &mut *collection;

    for child in children.iter() {
        for (source, target) in [
            (FieldKey::Code, FieldKey::Subcode),
            (FieldKey::Subcode, FieldKey::Subcode),
            (FieldKey::Themes, FieldKey::Themes),
            (FieldKey::Keywords, FieldKey::Keywords),
            (FieldKey::Satellite, FieldKey::Satellite),
            (FieldKey::Sensor, FieldKey::Sensor),
        ] {
            if let Some(value) = child.extra_fields.get(source) {
                summaries.add_value(target, value);
            }
        }
        for key in [FieldKey::Cities, FieldKey::Countries] {
            if let Some(values) = child.summaries.get(key) {
                for value in values {
                    summaries.add(key, value.clone());
                }
            }
        }
    }
}
