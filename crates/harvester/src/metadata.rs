//! Collection-level descriptive metadata.

use serde_json::Value;
use tracing::warn;

use catalog_model::collection::PROPRIETARY_LICENSE;
use catalog_model::{media_types, rel, Asset, Collection, FieldKey, Link};

use crate::config::{CollectionDefinition, EndpointConfig, LicenseSpec};
use crate::HarvestContext;

/// Fill license, providers, citation, assets and descriptive fields from the definition.
///
/// Lookup failures never abort the build; they fall back to `proprietary`.
pub fn add_collection_information(
    ctx: &HarvestContext,
    collection: &mut Collection,
    meta: &CollectionDefinition,
) {
    apply_license(ctx, collection, meta);

    if !meta.provider.is_empty() {
        collection.providers = meta.provider.clone();
    }

    if let Some(citation) = &meta.citation {
        if let Some(doi) = &citation.doi {
            collection.extra_fields.insert(FieldKey::SciDoi, doi.clone());
        }
        if let Some(text) = &citation.citation {
            collection.extra_fields.insert(FieldKey::SciCitation, text.clone());
        }
        if let Some(publication) = &citation.publication {
            collection
                .extra_fields
                .insert(FieldKey::SciPublications, publication.clone());
        }
    }

    if let Some(legend) = &meta.legend {
        collection.add_asset(
            "legend",
            Asset::new(ctx.asset_href(legend))
                .with_type(media_types::PNG)
                .with_role("metadata")
                .with_title("Legend"),
        );
    }
    if let Some(story) = &meta.story {
        collection.add_asset(
            "story",
            Asset::new(ctx.asset_href(story))
                .with_type(media_types::MARKDOWN)
                .with_role("metadata")
                .with_title("Story"),
        );
    }
    if let Some(image) = &meta.image {
        collection.add_asset(
            "thumbnail",
            Asset::new(ctx.asset_href(image))
                .with_type(media_types::PNG)
                .with_role("thumbnail")
                .with_title("Thumbnail"),
        );
    }
    for (index, reference) in meta.references.iter().enumerate() {
        let key = reference
            .key
            .clone()
            .unwrap_or_else(|| format!("reference_{}", index));
        collection.add_asset(
            key,
            Asset::new(reference.url.clone())
                .with_type(reference.media_type.as_deref().unwrap_or(media_types::HTML))
                .with_role("metadata")
                .with_title(reference.name.clone()),
        );
    }

    if let Some(epsg) = meta.data_projection.as_ref().and_then(epsg_code) {
        collection.extra_fields.insert(FieldKey::ProjEpsg, epsg);
    }
    if let Some(projection) = &meta.map_projection {
        collection
            .extra_fields
            .insert(FieldKey::MapProjection, projection.clone());
    }

    add_descriptive_fields(collection, meta);
}

/// `proj:epsg` from the endpoint, unless the definition already set one.
pub fn add_endpoint_projection(collection: &mut Collection, endpoint: &EndpointConfig) {
    if collection.extra_fields.contains(FieldKey::ProjEpsg) {
        return;
    }
    if let Some(epsg) = endpoint.data_projection().and_then(epsg_code) {
        collection.extra_fields.insert(FieldKey::ProjEpsg, epsg);
    }
}

/// Descriptive fields that [`crate::resolver`] later bubbles onto the parent link.
pub fn add_descriptive_fields(collection: &mut Collection, meta: &CollectionDefinition) {
    let fields = &mut collection.extra_fields;
    if let Some(subtitle) = &meta.subtitle {
        fields.insert(FieldKey::Subtitle, subtitle.clone());
    }
    if let Some(code) = &meta.eodash_identifier {
        fields.insert(FieldKey::Code, code.clone());
    }
    for (key, values) in [
        (FieldKey::Themes, &meta.themes),
        (FieldKey::Keywords, &meta.tags),
        (FieldKey::Satellite, &meta.satellite),
        (FieldKey::Sensor, &meta.sensor),
        (FieldKey::Agency, &meta.agency),
    ] {
        if !values.is_empty() {
            fields.insert(key, values.clone());
        }
    }
    // A provider-supplied axis label is kept.
    if let Some(y_axis) = meta.y_axis.as_ref().filter(|_| !fields.contains(FieldKey::YAxis)) {
        fields.insert(FieldKey::YAxis, y_axis.clone());
    }
}

fn apply_license(ctx: &HarvestContext, collection: &mut Collection, meta: &CollectionDefinition) {
    match &meta.license {
        Some(LicenseSpec::Id(id)) => match ctx.clients.licenses.lookup(id) {
            Some(info) => {
                collection.license = info.id;
                for source in info.sources {
                    collection.add_link(
                        Link::new(rel::LICENSE, source)
                            .with_type(media_types::HTML)
                            .with_title("License"),
                    );
                }
            }
            None => {
                warn!(
                    collection = %collection.id,
                    license = %id,
                    "License could not be resolved, using proprietary"
                );
                collection.license = PROPRIETARY_LICENSE.to_string();
            }
        },
        Some(LicenseSpec::Links(links)) => {
            for license in links {
                let mut link = Link::new(rel::LICENSE, license.url.clone())
                    .with_type(license.media_type.as_deref().unwrap_or(media_types::HTML));
                if let Some(title) = &license.title {
                    link = link.with_title(title.clone());
                }
                collection.add_link(link);
            }
            collection.license = if links.len() > 1 {
                "various".to_string()
            } else {
                PROPRIETARY_LICENSE.to_string()
            };
        }
        None => collection.license = PROPRIETARY_LICENSE.to_string(),
    }
}

/// EPSG code from `3857`, `"3857"` or `"EPSG:3857"`.
fn epsg_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim_start_matches("EPSG:").parse().ok(),
        _ => None,
    }
}
