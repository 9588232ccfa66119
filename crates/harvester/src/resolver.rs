//! Collection resolution: get-or-create within a scope and idempotent attach.
//!
//! A [`CollectionEntry`] borrows the scope it was resolved in. An existing
//! child is edited in place; a new collection stays detached until
//! [`CollectionEntry::attach`] adds it, so a failing adapter never leaves a
//! half-built collection behind.

use serde_json::Value;
use tracing::{debug, instrument, warn};

use catalog_model::{Collection, CollectionScope, Extent, FieldKey, Link};

use crate::config::{CollectionDefinition, EndpointConfig, Location};
use crate::metadata;
use crate::HarvestContext;
use harvest_common::HarvestResult;

enum Slot {
    Attached(usize),
    Detached(Box<Collection>),
}

/// A collection resolved within a parent scope.
pub struct CollectionEntry<'s> {
    scope: &'s mut dyn CollectionScope,
    slot: Slot,
    times: Option<Vec<String>>,
}

/// Find the child `id` in `scope`, or build a new detached collection.
///
/// A new collection gets the global extent (with the endpoint's bbox
/// override applied) and a resolved description. When the endpoint carries a
/// time override the resolved list is available through
/// [`CollectionEntry::take_times`].
#[instrument(skip_all, fields(collection = %id))]
pub async fn get_or_create<'s>(
    ctx: &HarvestContext,
    scope: &'s mut dyn CollectionScope,
    id: &str,
    meta: &CollectionDefinition,
    endpoint: Option<&EndpointConfig>,
) -> HarvestResult<CollectionEntry<'s>> {
    let times = match endpoint.and_then(EndpointConfig::time_override) {
        Some(time_override) => time_override.resolve(ctx.now)?,
        None => None,
    };

    if let Some(index) = scope.child_position(id) {
        debug!(scope = %scope.scope_id(), "Reusing existing collection");
        return Ok(CollectionEntry {
            scope,
            slot: Slot::Attached(index),
            times,
        });
    }

    let description = resolve_description(ctx, meta).await;
    let mut extent = Extent::global();
    extent.apply_override(endpoint.and_then(EndpointConfig::overwrite_bbox), None);

    let collection = Collection::new(id, meta.display_title(), description, extent);
    Ok(CollectionEntry {
        scope,
        slot: Slot::Detached(Box::new(collection)),
        times,
    })
}

/// Find or create the per-location child of a fan-out root.
///
/// The child is keyed by the location identifier, titled with the location
/// name and described by the location description (or name). The location's
/// explicit time list is available through [`CollectionEntry::take_times`].
pub fn get_or_create_location<'s>(
    scope: &'s mut dyn CollectionScope,
    location: &Location,
    endpoint: Option<&EndpointConfig>,
) -> CollectionEntry<'s> {
    let times = location.times.clone();
    if let Some(index) = scope.child_position(&location.identifier) {
        return CollectionEntry {
            scope,
            slot: Slot::Attached(index),
            times,
        };
    }

    let mut extent = Extent::global();
    extent.apply_override(endpoint.and_then(EndpointConfig::overwrite_bbox), None);
    let description = location
        .description
        .clone()
        .unwrap_or_else(|| location.name.clone());
    let collection = Collection::new(
        location.identifier.clone(),
        location.name.clone(),
        description,
        extent,
    );
    CollectionEntry {
        scope,
        slot: Slot::Detached(Box::new(collection)),
        times,
    }
}

/// Literal description, a fetched markdown document, or the subtitle.
pub async fn resolve_description(ctx: &HarvestContext, meta: &CollectionDefinition) -> String {
    let fallback = meta.subtitle.clone().unwrap_or_default();
    match &meta.description {
        Some(description) if description.ends_with(".md") || description.ends_with(".MD") => {
            let url = ctx.asset_href(description);
            match ctx.clients.content.fetch_text(&url).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        collection = %meta.name,
                        url = %url,
                        error = %e,
                        "Failed to fetch markdown description, using subtitle"
                    );
                    fallback
                }
            }
        }
        Some(description) => description.clone(),
        None => fallback,
    }
}

impl<'s> CollectionEntry<'s> {
    /// Whether the collection was created by this lookup.
    pub fn is_new(&self) -> bool {
        matches!(self.slot, Slot::Detached(_))
    }

    pub fn collection(&mut self) -> &mut Collection {
        match &mut self.slot {
            Slot::Attached(index) => &mut self.scope.children_mut()[*index],
            Slot::Detached(collection) => &mut **collection,
        }
    }

    /// The time list computed from the endpoint's override, if any.
    pub fn take_times(&mut self) -> Option<Vec<String>> {
        self.times.take()
    }

    /// Attach to the scope (idempotent), filling collection information and
    /// bubbling descriptive fields onto the new link.
    ///
    /// An already attached child only gets its link fields refreshed, so
    /// summaries gathered after the first attach still reach the parent.
    pub fn attach(
        self,
        ctx: &HarvestContext,
        meta: &CollectionDefinition,
        endpoint: Option<&EndpointConfig>,
    ) {
        let CollectionEntry { scope, slot, .. } = self;
        let mut collection = match slot {
            Slot::Detached(collection) => collection,
            Slot::Attached(index) => {
                refresh_link(scope, index);
                return;
            }
        };

        if let Some(endpoint) = endpoint {
            collection
                .extra_fields
                .insert(FieldKey::EndpointType, endpoint.name());
        }
        metadata::add_collection_information(ctx, &mut collection, meta);
        if let Some(endpoint) = endpoint {
            metadata::add_endpoint_projection(&mut collection, endpoint);
        }

        let has_locations = !meta.locations.is_empty();
        if let Some(link) = insert_or_merge(scope, *collection) {
            link.extra_fields.insert(FieldKey::Locations, has_locations);
        }
    }

    /// Attach a per-location child, decorating its link with the location.
    pub fn attach_location(self, location: &Location) {
        let CollectionEntry { scope, slot, .. } = self;
        let Slot::Detached(collection) = slot else {
            return;
        };

        if let Some(link) = insert_or_merge(scope, *collection) {
            decorate_location_link(link, &location.identifier, &location.name, location.latlng());
            if !location.country.is_empty() {
                link.extra_fields
                    .insert(FieldKey::Country, location.country.clone());
            }
        }
    }
}

/// Push `collection` as a new child, or merge it into a same-id child.
///
/// Returns the new link when a child was pushed.
fn insert_or_merge(scope: &mut dyn CollectionScope, collection: Collection) -> Option<&mut Link> {
    if let Some(existing) = scope.child_mut(&collection.id) {
        debug!(collection = %collection.id, "Merging into existing collection");
        merge_collection(existing, collection);
        return None;
    }

    let link = bubbled_link_fields(&collection);
    let pushed = scope.push_child(collection);
    pushed.extra_fields.extend(&link);
    Some(pushed)
}

/// Re-apply the bubbled fields of the child at `index` onto its link.
///
/// The link id is left alone; located children carry their location id there.
fn refresh_link(scope: &mut dyn CollectionScope, index: usize) {
    let child = &scope.children()[index];
    let id = child.id.clone();
    let mut fields = bubbled_link_fields(child);
    fields.remove(FieldKey::Id);
    if let Some(link) = scope.child_link_mut(&id) {
        link.extra_fields.extend(&fields);
    }
}

/// The fixed field set copied from a collection onto the link pointing at it.
fn bubbled_link_fields(collection: &Collection) -> catalog_model::ExtraFields {
    let mut fields = catalog_model::ExtraFields::new();
    fields.insert(FieldKey::Id, collection.id.clone());

    for (source, target) in [
        (FieldKey::Subtitle, FieldKey::Subtitle),
        (FieldKey::Code, FieldKey::Code),
        (FieldKey::Subcode, FieldKey::Subcode),
        (FieldKey::Themes, FieldKey::Themes),
        (FieldKey::Keywords, FieldKey::Tags),
        (FieldKey::Satellite, FieldKey::Satellite),
        (FieldKey::Sensor, FieldKey::Sensor),
        (FieldKey::Agency, FieldKey::Agency),
        (FieldKey::YAxis, FieldKey::YAxis),
        (FieldKey::EndpointType, FieldKey::EndpointType),
    ] {
        if let Some(value) = collection.extra_fields.get(source) {
            fields.insert(target, value.clone());
        }
    }

    for (key, values) in collection.summaries.iter() {
        fields.insert(
            key,
            Value::Array(values.iter().cloned().map(Value::String).collect()),
        );
    }
    fields
}

/// Mark a child link as pointing at a named location.
pub fn decorate_location_link(link: &mut Link, id: &str, name: &str, latlng: Option<String>) {
    link.extra_fields.insert(FieldKey::Id, id);
    link.extra_fields.insert(FieldKey::Name, name);
    if let Some(latlng) = latlng {
        link.extra_fields.insert(FieldKey::Latlng, latlng);
    }
}

/// Append the items, links and children of `incoming` that `existing` lacks.
fn merge_collection(existing: &mut Collection, incoming: Collection) {
    let item_links: Vec<Link> = incoming.item_links().cloned().collect();
    let had_items = !incoming.items.is_empty();

    for (item, source_link) in incoming.items.into_iter().zip(item_links) {
        if existing.item(&item.id).is_some() {
            continue;
        }
        let link = existing.add_item(item);
        link.extra_fields.extend(&source_link.extra_fields);
    }

    for link in incoming.links {
        if link.rel == catalog_model::rel::ITEM || link.rel == catalog_model::rel::CHILD {
            continue;
        }
        if !existing
            .links
            .iter()
            .any(|l| l.rel == link.rel && l.href == link.href)
        {
            existing.add_link(link);
        }
    }

    for child in incoming.children {
        if existing.child(&child.id).is_none() {
            existing.push_child(child);
        }
    }
    existing.summaries.merge(&incoming.summaries);

    if had_items {
        existing.update_extent_from_items();
    }
}
