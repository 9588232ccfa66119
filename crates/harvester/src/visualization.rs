//! Visualization link synthesis.
//!
//! Maps an endpoint configuration plus optional item context to a link
//! describing a WMS, WMTS or tile endpoint. Query parameters appear only when
//! their configuration field is set, so generated templates stay byte-stable.

use chrono::Duration;
use serde_json::{json, Map, Value};
use tracing::warn;

use catalog_model::{media_types, rel, FieldKey, Link};
use harvest_common::{format_zulu, parse_iso8601};

use crate::config::{
    CollectionDefinition, EndpointConfig, SentinelHubStacEndpoint, SentinelHubWmsEndpoint,
    VectorTileEndpoint, VedaEndpoint, VedaType, WmsEndpoint, WmtsEndpoint, XcubeEndpoint,
};
use crate::HarvestSettings;

/// Per-object values a link may be scoped to.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisualizationContext<'a> {
    /// Source file for raster tiles (`url=` parameter).
    pub file_url: Option<&'a str>,
    /// Time the link is scoped to.
    pub time: Option<&'a str>,
    /// STAC item id for item-aware raster tiles.
    pub item_id: Option<&'a str>,
    /// WMS styles.
    pub styles: Option<&'a str>,
}

impl<'a> VisualizationContext<'a> {
    pub fn at_time(time: &'a str) -> Self {
        Self {
            time: Some(time),
            ..Default::default()
        }
    }

    /// Carry the endpoint's configured styles.
    pub fn with_endpoint_styles(self, endpoint: &'a EndpointConfig) -> Self {
        Self {
            styles: endpoint.styles(),
            ..self
        }
    }
}

/// Build the visualization link for an endpoint, `None` when it has no template.
pub fn synthesize(
    endpoint: &EndpointConfig,
    meta: &CollectionDefinition,
    settings: &HarvestSettings,
    ctx: &VisualizationContext<'_>,
) -> Option<Link> {
    let link = match endpoint {
        EndpointConfig::SentinelHubStac(sh) => Some(sentinel_hub_link(sh, settings, ctx)),
        EndpointConfig::SentinelHubWms(sh) => Some(sentinel_hub_wms_link(sh, settings, ctx)),
        EndpointConfig::Wms(wms) => Some(wms_link(wms, ctx)),
        EndpointConfig::Wmts(wmts) => Some(wmts_link(wmts, ctx)),
        EndpointConfig::Veda(veda) => veda_link(veda, settings, ctx),
        EndpointConfig::Xcube(xcube) => Some(xcube_link(xcube, ctx)),
        EndpointConfig::GeoDbVectorTiles(tiles) => Some(vector_tile_link(tiles, meta)),
        EndpointConfig::GeoDb(_) | EndpointConfig::CollectionOnly(_) => None,
    };

    if link.is_none() {
        warn!(
            collection = %meta.name,
            provider = %endpoint.name(),
            "No visualization template for endpoint, skipping link"
        );
    }
    link.map(|l| l.with_title(meta.display_title().to_string()))
}

fn sentinel_hub_instance(instance_id: Option<&String>, settings: &HarvestSettings) -> String {
    let instance = instance_id
        .or(settings.sh_instance_id.as_ref())
        .map(String::as_str)
        .unwrap_or_default();
    format!("{}/{}", settings.sh_wms_url.trim_end_matches('/'), instance)
}

fn sentinel_hub_link(
    sh: &SentinelHubStacEndpoint,
    settings: &HarvestSettings,
    ctx: &VisualizationContext<'_>,
) -> Link {
    let mut link = Link::new(rel::WMS, sentinel_hub_instance(sh.instance_id.as_ref(), settings))
        .with_type(sh.mime_type.as_deref().unwrap_or(media_types::PNG))
        .with_field(FieldKey::Role, json!(["data"]))
        .with_field(FieldKey::WmsLayers, json!([sh.layer_id]));
    if let Some(time) = ctx.time {
        link = link.with_field(FieldKey::WmsDimensions, json!({ "TIME": time }));
    }
    link
}

fn sentinel_hub_wms_link(
    sh: &SentinelHubWmsEndpoint,
    settings: &HarvestSettings,
    ctx: &VisualizationContext<'_>,
) -> Link {
    let mut link = Link::new(rel::WMS, sentinel_hub_instance(sh.instance_id.as_ref(), settings))
        .with_type(sh.mime_type.as_deref().unwrap_or(media_types::PNG))
        .with_field(FieldKey::Role, json!(["data"]))
        .with_field(FieldKey::WmsLayers, json!([sh.layer_id]));
    if let Some(time) = ctx.time {
        link = link.with_field(FieldKey::WmsDimensions, json!({ "TIME": five_day_window(time) }));
    }
    link
}

/// `start/end` where end is five days after start, minus one millisecond.
///
/// Unparsable times are passed through unchanged.
fn five_day_window(time: &str) -> String {
    match parse_iso8601(time) {
        Ok(start) => {
            let end = start + Duration::days(5) - Duration::milliseconds(1);
            format!(
                "{}/{}",
                format_zulu(&start),
                end.format("%Y-%m-%dT%H:%M:%S%.3fZ")
            )
        }
        Err(_) => time.to_string(),
    }
}

fn wms_link(wms: &WmsEndpoint, ctx: &VisualizationContext<'_>) -> Link {
    let mut link = Link::new(rel::WMS, wms.endpoint.clone())
        .with_type(wms.media_type.as_deref().unwrap_or(media_types::JPEG))
        .with_field(FieldKey::Role, json!(["data"]))
        .with_field(FieldKey::WmsLayers, json!([wms.layer_id]));
    if let Some(time) = ctx.time {
        link = link.with_field(FieldKey::WmsDimensions, json!({ "TIME": time }));
    }
    if let Some(styles) = ctx.styles {
        link = link.with_field(FieldKey::WmsStyles, json!([styles]));
    }
    link
}

fn wmts_link(wmts: &WmtsEndpoint, ctx: &VisualizationContext<'_>) -> Link {
    let mut dimensions: Map<String, Value> = wmts.dimensions.clone();
    if let Some(time) = ctx.time {
        dimensions.insert("time".to_string(), Value::String(time.to_string()));
    }

    let mut link = Link::new(rel::WMTS, wmts.endpoint.clone())
        .with_type(media_types::PNG)
        .with_field(FieldKey::Role, json!(["data"]))
        .with_field(FieldKey::WmtsLayer, wmts.layer_id.clone());
    if !dimensions.is_empty() {
        link = link.with_field(FieldKey::WmtsDimensions, Value::Object(dimensions));
    }
    link
}

fn veda_link(
    veda: &VedaEndpoint,
    settings: &HarvestSettings,
    ctx: &VisualizationContext<'_>,
) -> Option<Link> {
    let raster = settings.raster_endpoint.trim_end_matches('/');
    let href = match veda.veda_type? {
        VedaType::Cog => {
            let mut params = Vec::new();
            if let Some(url) = ctx.file_url {
                params.push(format!("url={}", urlencoding::encode(url)));
            }
            params.push("resampling_method=nearest".to_string());
            params.extend(veda.bidx.iter().map(|b| format!("bidx={}", b)));
            if let Some(colormap) = &veda.colormap {
                params.push(format!("colormap={}", urlencoding::encode(colormap)));
            }
            if let Some(name) = &veda.colormap_name {
                params.push(format!("colormap_name={}", name));
            }
            if let Some([min, max]) = veda.rescale {
                params.push(format!("rescale={},{}", min, max));
            }
            format!(
                "{}/cog/tiles/WebMercatorQuad/{{z}}/{{x}}/{{y}}?{}",
                raster,
                params.join("&")
            )
        }
        VedaType::Raster => {
            let mut params = vec![
                format!("collection={}", veda.collection_id),
                format!("item={}", ctx.item_id.unwrap_or("{item}")),
            ];
            params.extend(veda.assets.iter().map(|a| format!("assets={}", a)));
            if let Some(formula) = &veda.color_formula {
                params.push(format!("color_formula={}", urlencoding::encode(formula)));
            }
            if let Some(no_data) = &veda.no_data {
                params.push(format!("nodata={}", scalar_param(no_data)));
            }
            format!(
                "{}/stac/tiles/WebMercatorQuad/{{z}}/{{x}}/{{y}}?{}",
                raster,
                params.join("&")
            )
        }
        VedaType::Tiles => veda.endpoint.clone(),
    };

    Some(
        Link::new(rel::XYZ, href)
            .with_type(media_types::PNG)
            .with_field(FieldKey::Role, json!(["data"])),
    )
}

fn xcube_link(xcube: &XcubeEndpoint, ctx: &VisualizationContext<'_>) -> Link {
    let time = ctx.time.unwrap_or("{time}");
    let (vmin, vmax) = match xcube.rescale {
        Some([min, max]) => (min.to_string(), max.to_string()),
        None => ("{vmin}".to_string(), "{vmax}".to_string()),
    };
    let cbar = xcube.colormap_name.as_deref().unwrap_or("{cbar}");

    let href = format!(
        "{}/tiles/{}/{}/{{z}}/{{y}}/{{x}}?crs={}&time={}&vmin={}&vmax={}&cbar={}",
        xcube.endpoint.trim_end_matches('/'),
        xcube.datacube_id,
        xcube.variable,
        xcube.crs,
        time,
        vmin,
        vmax,
        cbar
    );
    Link::new(rel::XYZ, href)
        .with_type(media_types::PNG)
        .with_field(FieldKey::Role, json!(["data"]))
}

fn vector_tile_link(tiles: &VectorTileEndpoint, meta: &CollectionDefinition) -> Link {
    let href = format!(
        "{}{}:{}_{}@EPSG:3857@pbf/{{z}}/{{x}}/{{-y}}.pbf",
        tiles.endpoint, tiles.instance, tiles.source, tiles.layer_id
    );
    let mut link = Link::new(rel::XYZ, href)
        .with_type(media_types::PBF)
        .with_field(FieldKey::Description, meta.display_title().to_string())
        .with_field(FieldKey::Source, tiles.source.clone());
    if let Some(parameters) = &tiles.parameters {
        link = link.with_field(FieldKey::Parameters, parameters.clone());
    }
    if let Some(match_key) = &tiles.match_key {
        link = link.with_field(FieldKey::MatchKey, match_key.clone());
    }
    if let Some(time_key) = &tiles.time_key {
        link = link.with_field(FieldKey::TimeKey, time_key.clone());
    }
    link
}

fn scalar_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_day_window() {
        assert_eq!(
            five_day_window("2021-03-01T00:00:00Z"),
            "2021-03-01T00:00:00Z/2021-03-05T23:59:59.999Z"
        );
        assert_eq!(five_day_window("not-a-date"), "not-a-date");
    }

    #[test]
    fn test_cog_file_url_is_encoded() {
        let veda: VedaEndpoint = serde_json::from_value(json!({
            "EndPoint": "https://stac.example.com/",
            "CollectionId": "no2-monthly",
            "Type": "cog",
            "Bidx": 1
        }))
        .unwrap();
        let ctx = VisualizationContext {
            file_url: Some("https://data.example.com/get?file=m1.tif&sig=a b"),
            ..Default::default()
        };

        let link = veda_link(&veda, &HarvestSettings::default(), &ctx).unwrap();
        assert!(link.href.contains(
            "?url=https%3A%2F%2Fdata.example.com%2Fget%3Ffile%3Dm1.tif%26sig%3Da%20b&resampling_method=nearest&bidx=1"
        ));
    }

    #[test]
    fn test_wms_styles_come_from_context() {
        let endpoint: EndpointConfig = serde_yaml::from_str(
            r#"
Name: WMS
EndPoint: https://wms.example.com/ows
LayerId: ndvi
Styles: green
"#,
        )
        .unwrap();
        let meta: CollectionDefinition = serde_yaml::from_str("Name: ndvi\n").unwrap();
        let settings = HarvestSettings::default();

        let plain =
            synthesize(&endpoint, &meta, &settings, &VisualizationContext::default()).unwrap();
        assert!(plain.extra_fields.get(FieldKey::WmsStyles).is_none());

        let viz =
            VisualizationContext::at_time("2021-01-01T00:00:00Z").with_endpoint_styles(&endpoint);
        let styled = synthesize(&endpoint, &meta, &settings, &viz).unwrap();
        assert_eq!(styled.extra_fields.get(FieldKey::WmsStyles), Some(&json!(["green"])));
    }

    #[test]
    fn test_scalar_param() {
        assert_eq!(scalar_param(&json!(0)), "0");
        assert_eq!(scalar_param(&json!("nan")), "nan");
    }
}
