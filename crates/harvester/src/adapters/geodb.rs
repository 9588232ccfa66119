//! GeoDB tabular endpoints: one point item per area of interest.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{info, warn};

use catalog_model::item::point_geometry;
use catalog_model::{CollectionScope, FieldKey, Item, ItemTime};
use harvest_common::{parse_iso8601, BoundingBox, HarvestError, HarvestResult};

use crate::config::{CollectionDefinition, EndpointConfig, GeoDbEndpoint};
use crate::resolver::get_or_create;
use crate::HarvestContext;

use super::{add_item_with_time, finish_extent};

/// Half-width in degrees of the box around each area-of-interest point.
const POINT_BUFFER: f64 = 0.01;

type Row = Map<String, Value>;

pub(super) async fn handle(
    ctx: &HarvestContext,
    scope: &mut dyn CollectionScope,
    meta: &CollectionDefinition,
    endpoint: &EndpointConfig,
    geodb: &GeoDbEndpoint,
) -> HarvestResult<()> {
    let rows = ctx.clients.tabular.query(&query_url(geodb)).await?;
    let groups = group_rows(&rows, &geodb.id_key);

    let mut entry = get_or_create(ctx, scope, &meta.name, meta, Some(endpoint)).await?;
    let y_axis = if meta.y_axis.is_none() && entry.is_new() {
        fetch_y_axis(ctx, geodb).await
    } else {
        None
    };

    let collection = entry.collection();
    if let Some(y_axis) = y_axis {
        collection.extra_fields.insert(FieldKey::YAxis, y_axis);
    }

    for (key, group) in &groups {
        let time = group_time(group).ok_or_else(|| {
            HarvestError::data_shape(
                format!("{} row group {}", geodb.table_url(), key),
                "no parsable 'time' value",
            )
        })?;

        let first = group[0];
        let city = first.get(&geodb.name_key).and_then(value_string);
        let country = first.get("country").filter(|v| !v.is_null()).cloned();
        let id = item_id(city.as_deref(), key);
        if collection.item(&id).is_some() {
            continue;
        }
        let aoi = first.get("aoi").and_then(value_string);

        let mut item = Item::new(id, time);
        if let Some((lat, lon)) = aoi.as_deref().and_then(parse_lat_lon) {
            item = item
                .with_geometry(point_geometry(lon, lat))
                .with_bbox(BoundingBox::around_point(lon, lat, POINT_BUFFER));
        }
        if let Some(city) = &city {
            item.properties.insert("city".to_string(), Value::String(city.clone()));
        }
        if let Some(country) = &country {
            item.properties.insert("country".to_string(), country.clone());
        }

        let link = add_item_with_time(collection, item);
        link.extra_fields.insert(FieldKey::Id, key.clone());
        if let Some(aoi) = &aoi {
            link.extra_fields.insert(FieldKey::Latlng, aoi.clone());
        }
        if let Some(country) = &country {
            link.extra_fields.insert(FieldKey::Country, country.clone());
        }
        if let Some(city) = &city {
            link.extra_fields.insert(FieldKey::City, city.clone());
        }

        if let Some(country) = &country {
            collection.summaries.add_value(FieldKey::Countries, country);
        }
        if let Some(city) = city {
            collection.summaries.add(FieldKey::Cities, city);
        }
    }

    finish_extent(ctx, collection, endpoint)?;
    info!(
        collection = %meta.name,
        items = collection.items.len(),
        "GeoDB collection harvested"
    );
    entry.attach(ctx, meta, Some(endpoint));
    Ok(())
}

/// `{table}?select=aoi,<id key>,country,<name key>,time` plus any extra query.
fn query_url(geodb: &GeoDbEndpoint) -> String {
    let mut columns = vec!["aoi", geodb.id_key.as_str(), "country", geodb.name_key.as_str(), "time"];
    let mut seen = std::collections::HashSet::new();
    columns.retain(|c| seen.insert(*c));

    let mut url = format!("{}?select={}", geodb.table_url(), columns.join(","));
    if let Some(extra) = &geodb.additional_query_string {
        if !extra.starts_with('&') {
            url.push('&');
        }
        url.push_str(extra);
    }
    url
}

async fn fetch_y_axis(ctx: &HarvestContext, geodb: &GeoDbEndpoint) -> Option<String> {
    let url = format!("{}?select=y_axis&limit=1", geodb.table_url());
    match ctx.clients.tabular.query(&url).await {
        Ok(rows) => rows
            .first()
            .and_then(|row| row.get("y_axis"))
            .and_then(value_string),
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to fetch y axis label");
            None
        }
    }
}

/// Group rows by key, in order of first appearance.
fn group_rows<'a>(rows: &'a [Row], key: &str) -> Vec<(String, Vec<&'a Row>)> {
    let mut groups: Vec<(String, Vec<&Row>)> = Vec::new();
    for row in rows {
        let Some(value) = row.get(key).and_then(value_string) else {
            continue;
        };
        match groups.iter_mut().find(|(k, _)| *k == value) {
            Some((_, members)) => members.push(row),
            None => groups.push((value, vec![row])),
        }
    }
    groups
}

/// `[min(time), max(time)]` over a group.
fn group_time(rows: &[&Row]) -> Option<ItemTime> {
    let times: Vec<DateTime<Utc>> = rows
        .iter()
        .filter_map(|row| row.get("time").and_then(Value::as_str))
        .filter_map(|t| parse_iso8601(t).ok())
        .collect();
    let start = *times.iter().min()?;
    let end = *times.iter().max()?;
    Some(ItemTime::Range { start, end })
}

/// Filesystem-safe id: the name stripped to ASCII alphanumerics, else the raw key.
fn item_id(name: Option<&str>, key: &str) -> String {
    let sanitized: String = name
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    if sanitized.is_empty() {
        key.to_string()
    } else {
        sanitized
    }
}

/// Parse `"lat,lon"`.
fn parse_lat_lon(value: &str) -> Option<(f64, f64)> {
    let (lat, lon) = value.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
