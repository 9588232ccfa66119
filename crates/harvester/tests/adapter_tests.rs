//! Endpoint adapter behaviour against in-memory collaborators.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::json;

use catalog_model::{rel, Catalog, FieldKey, ItemTime};
use harvest_common::{BoundingBox, ErrorKind};
use harvester::composer::compose_collection;
use harvester::{EmptyExtentPolicy, HarvestSettings, LayerCapabilities, StacItem};

use common::{definition, stac_item, FakeCapabilities, FakeDatacube, FakeStac, FakeTabular, Fakes};

fn catalog() -> Catalog {
    Catalog::new("test", "Test", "Test catalog")
}

// ============================================================================
// STAC search adapters
// ============================================================================

#[tokio::test]
async fn test_sentinel_hub_keeps_first_item_per_date() {
    let fakes = Fakes {
        stac: Arc::new(FakeStac::default().with_items(
            "byoc-abc",
            vec![
                stac_item("a", "2021-01-01T10:00:00Z", [10.0, 40.0, 11.0, 41.0]),
                stac_item("b", "2021-01-01T12:00:00Z", [10.0, 40.0, 11.0, 41.0]),
                stac_item("c", "2021-01-02T10:00:00Z", [12.0, 42.0, 13.0, 43.0]),
            ],
        )),
        ..Default::default()
    };
    let def = definition(
        r#"
Name: no2
Title: Nitrogen dioxide
Resources:
  - Name: Sentinel Hub
    CollectionId: abc
    LayerId: NO2
"#,
    );

    let mut catalog = catalog();
    compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap();

    assert_eq!(catalog.children.len(), 1);
    let collection = &catalog.children[0];
    assert_eq!(collection.id, "no2");

    let ids: Vec<&str> = collection.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);

    let links: Vec<_> = collection.item_links().collect();
    assert_eq!(
        links[0].field_str(FieldKey::Datetime),
        Some("2021-01-01T10:00:00Z")
    );

    let viz = &collection.items[0].links[0];
    assert_eq!(viz.rel, rel::WMS);
    assert_eq!(
        viz.extra_fields.get(FieldKey::WmsDimensions),
        Some(&json!({"TIME": "2021-01-01T10:00:00Z"}))
    );

    let searches = fakes.stac.searches();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].collection, "byoc-abc");
    assert!(searches[0]
        .headers
        .contains(&("Authorization".to_string(), "Bearer test-token".to_string())));
    assert_eq!(fakes.credentials.calls.load(Ordering::SeqCst), 1);

    assert_eq!(
        collection.extent.spatial.primary(),
        BoundingBox::new(10.0, 40.0, 13.0, 43.0)
    );
}

#[tokio::test]
async fn test_location_fan_out_builds_one_child_per_location() {
    let fakes = Fakes {
        stac: Arc::new(FakeStac::default().with_items(
            "airports-no2",
            vec![
                stac_item("vie-1", "2021-03-01T00:00:00Z", [16.2, 48.1, 16.5, 48.3]),
                stac_item("muc-1", "2021-03-02T00:00:00Z", [11.4, 48.0, 11.7, 48.2]),
            ],
        )),
        ..Default::default()
    };
    let def = definition(
        r#"
Name: airports
Title: Airports
Locations:
  - Identifier: vie
    Name: Vienna
    Point: [16.37, 48.2]
    Bbox: [16.0, 48.0, 17.0, 49.0]
    Country: AT
  - Identifier: muc
    Name: Munich
    Point: [11.57, 48.13]
    Bbox: [11.0, 47.5, 12.0, 48.5]
Resources:
  - Name: VEDA
    EndPoint: https://stac.example.com/
    CollectionId: airports-no2
    Type: cog
"#,
    );

    let mut catalog = catalog();
    compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap();

    let root = &catalog.children[0];
    assert_eq!(root.id, "airports");
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].id, "vie");
    assert_eq!(root.children[1].id, "muc");
    assert_eq!(root.children[0].items[0].collection.as_deref(), Some("airports"));

    // One box per location, not their union.
    let boxes = root.extent.spatial.boxes();
    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[0], root.children[0].extent.spatial.primary());
    assert_eq!(boxes[1], BoundingBox::new(11.4, 48.0, 11.7, 48.2));

    let child_link = root.links_with_rel(rel::CHILD).next().unwrap();
    assert_eq!(child_link.field_str(FieldKey::Name), Some("Vienna"));
    assert_eq!(child_link.field_str(FieldKey::Latlng), Some("48.2,16.37"));
    assert_eq!(child_link.extra_fields.get(FieldKey::Country), Some(&json!(["AT"])));

    let root_link = catalog.links.iter().find(|l| l.rel == rel::CHILD).unwrap();
    assert_eq!(root_link.extra_fields.get(FieldKey::Locations), Some(&json!(true)));

    assert_eq!(fakes.stac.searches().len(), 2);
}

#[tokio::test]
async fn test_sentinel_hub_data_projection_sets_epsg() {
    let fakes = Fakes {
        stac: Arc::new(FakeStac::default().with_items(
            "byoc-abc",
            vec![stac_item("a", "2021-01-01T10:00:00Z", [10.0, 40.0, 11.0, 41.0])],
        )),
        ..Default::default()
    };
    let def = definition(
        r#"
Name: no2
Resources:
  - Name: Sentinel Hub
    CollectionId: abc
    LayerId: NO2
    DataProjection: 3035
"#,
    );

    let mut catalog = catalog();
    compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap();

    assert_eq!(
        catalog.children[0].extra_fields.get(FieldKey::ProjEpsg),
        Some(&json!(3035))
    );
}

#[tokio::test]
async fn test_veda_collections_sharing_a_remote_id_stay_separate() {
    let fakes = Fakes {
        stac: Arc::new(FakeStac::default().with_items(
            "no2",
            vec![stac_item("a", "2021-01-01T00:00:00Z", [0.0, 0.0, 1.0, 1.0])],
        )),
        ..Default::default()
    };
    let cog = definition(
        r#"
Name: no2
Resources:
  - Name: VEDA
    EndPoint: https://stac.example.com/
    CollectionId: no2
    Type: cog
"#,
    );
    let raster = definition(
        r#"
Name: no2-raster
Resources:
  - Name: VEDA
    EndPoint: https://stac.example.com/
    CollectionId: no2
    Type: raster
    Assets: [cog_default]
"#,
    );

    let ctx = fakes.context();
    let mut catalog = catalog();
    compose_collection(&ctx, &mut catalog, &cog).await.unwrap();
    compose_collection(&ctx, &mut catalog, &raster).await.unwrap();

    let ids: Vec<&str> = catalog.children.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["no2", "no2-raster"]);
    let link_ids: Vec<Option<&str>> = catalog
        .links
        .iter()
        .map(|l| l.field_str(FieldKey::Id))
        .collect();
    assert_eq!(link_ids, vec![Some("no2"), Some("no2-raster")]);
    assert_eq!(catalog.children[0].items.len(), 1);
    assert_eq!(catalog.children[1].items.len(), 1);
}

#[tokio::test]
async fn test_repeated_veda_resource_adds_no_duplicate_items() {
    let fakes = Fakes {
        stac: Arc::new(FakeStac::default().with_items(
            "no2-monthly",
            vec![
                stac_item("a", "2021-01-01T00:00:00Z", [0.0, 0.0, 1.0, 1.0]),
                stac_item("b", "2021-02-01T00:00:00Z", [0.0, 0.0, 1.0, 1.0]),
            ],
        )),
        ..Default::default()
    };
    let def = definition(
        r#"
Name: no2
Resources:
  - Name: VEDA
    EndPoint: https://stac.example.com/
    CollectionId: no2-monthly
    Type: cog
  - Name: VEDA
    EndPoint: https://stac.example.com/
    CollectionId: no2-monthly
    Type: cog
"#,
    );

    let mut catalog = catalog();
    compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap();

    assert_eq!(catalog.children.len(), 1);
    let collection = &catalog.children[0];
    let ids: Vec<&str> = collection.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(collection.item_links().count(), 2);
    assert_eq!(fakes.stac.searches().len(), 2);
}

#[tokio::test]
async fn test_veda_cog_link_omits_unset_parameters() {
    let fakes = Fakes {
        stac: Arc::new(FakeStac::default().with_items(
            "no2-monthly",
            vec![stac_item("m1", "2021-01-01T00:00:00Z", [0.0, 0.0, 1.0, 1.0])],
        )),
        ..Default::default()
    };
    let plain = definition(
        r#"
Name: plain
Resources:
  - Name: VEDA
    EndPoint: https://stac.example.com/
    CollectionId: no2-monthly
    Type: cog
    Bidx: 1
"#,
    );
    let styled = definition(
        r#"
Name: styled
Resources:
  - Name: VEDA
    EndPoint: https://stac.example.com/
    CollectionId: no2-monthly
    Type: cog
    ColormapName: rdbu_r
    Colormap: '{"1": [255, 0, 0, 255]}'
    Rescale: [0, 100]
"#,
    );

    let ctx = fakes.context();
    let mut catalog = catalog();
    compose_collection(&ctx, &mut catalog, &plain).await.unwrap();
    compose_collection(&ctx, &mut catalog, &styled).await.unwrap();

    let plain_href = &catalog.children[0].items[0].links[0].href;
    assert!(plain_href.contains("url=s3%3A%2F%2Fbucket%2Fm1.tif"));
    assert!(plain_href.contains("bidx=1"));
    assert!(!plain_href.contains("colormap="));
    assert!(!plain_href.contains("rescale="));

    let styled_href = &catalog.children[1].items[0].links[0].href;
    assert!(styled_href.contains("colormap_name=rdbu_r"));
    assert!(styled_href.contains("rescale=0,100"));
    assert!(styled_href.contains("colormap=%7B%221%22"));
}

// ============================================================================
// Tabular adapter
// ============================================================================

#[tokio::test]
async fn test_geodb_groups_rows_into_point_items() {
    let fakes = Fakes {
        tabular: Arc::new(
            FakeTabular::default()
                .respond(
                    "select=aoi,",
                    vec![
                        json!({"aoi": "48.2,16.37", "aoi_id": "AT1", "country": "AT", "city": "Wien", "time": "2020-01-03T00:00:00"}),
                        json!({"aoi": "48.2,16.37", "aoi_id": "AT1", "country": "AT", "city": "Wien", "time": "2020-01-01T00:00:00"}),
                        json!({"aoi": "52.5,13.4", "aoi_id": "DE1", "country": "DE", "city": "Berlin", "time": "2020-02-01"}),
                    ],
                )
                .respond("select=y_axis", vec![json!({"y_axis": "tons"})]),
        ),
        ..Default::default()
    };
    let def = definition(
        r#"
Name: E10a
Resources:
  - Name: GeoDB
    EndPoint: https://geodb.example.com/
    Database: eodash
    CollectionId: E10a
"#,
    );

    let mut catalog = catalog();
    compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap();

    let collection = &catalog.children[0];
    assert_eq!(collection.items.len(), 2);

    let wien = &collection.items[0];
    assert_eq!(wien.id, "Wien");
    match wien.time {
        ItemTime::Range { start, end } => {
            assert_eq!(harvest_common::format_zulu(&start), "2020-01-01T00:00:00Z");
            assert_eq!(harvest_common::format_zulu(&end), "2020-01-03T00:00:00Z");
        }
        other => panic!("expected a range, got {:?}", other),
    }
    assert_eq!(wien.geometry, Some(json!({"type": "Point", "coordinates": [16.37, 48.2]})));

    let link = collection.item_links().next().unwrap();
    assert_eq!(link.field_str(FieldKey::Id), Some("AT1"));
    assert_eq!(link.field_str(FieldKey::City), Some("Wien"));
    assert_eq!(link.field_str(FieldKey::Latlng), Some("48.2,16.37"));

    assert_eq!(collection.summaries.get(FieldKey::Countries).unwrap().len(), 2);
    assert_eq!(collection.extra_fields.get_str(FieldKey::YAxis), Some("tons"));

    let queries = fakes.tabular.queries();
    assert_eq!(
        queries[0],
        "https://geodb.example.com/eodash_E10a?select=aoi,aoi_id,country,city,time"
    );
}

#[tokio::test]
async fn test_repeated_geodb_resource_adds_no_duplicate_items() {
    let fakes = Fakes {
        tabular: Arc::new(FakeTabular::default().respond(
            "select=aoi,",
            vec![
                json!({"aoi": "48.2,16.37", "aoi_id": "AT1", "country": "AT", "city": "Wien", "time": "2020-01-01"}),
            ],
        )),
        ..Default::default()
    };
    let def = definition(
        r#"
Name: E10b
yAxis: tons
Resources:
  - Name: GeoDB
    EndPoint: https://geodb.example.com/
    Database: eodash
    CollectionId: E10b
  - Name: GeoDB
    EndPoint: https://geodb.example.com/
    Database: eodash
    CollectionId: E10b
"#,
    );

    let mut catalog = catalog();
    compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap();

    let collection = &catalog.children[0];
    let ids: Vec<&str> = collection.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["Wien"]);
    assert_eq!(collection.item_links().count(), 1);
    assert_eq!(collection.summaries.get(FieldKey::Cities).unwrap().len(), 1);
}

// ============================================================================
// Capabilities adapters
// ============================================================================

#[tokio::test]
async fn test_capabilities_not_fetched_when_times_and_bbox_are_fixed() {
    let fakes = Fakes::default();
    let def = definition(
        r#"
Name: ndvi
Resources:
  - Name: WMS
    EndPoint: https://wms.example.com/ows
    LayerId: NDVI
    Times: ["2021-01-01", "2021-02-01", "2021-01-01T00:00:00Z"]
    OverwriteBBox: [10, 40, 20, 50]
"#,
    );

    let mut catalog = catalog();
    compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap();

    assert_eq!(fakes.capabilities.calls(), 0);

    let collection = &catalog.children[0];
    let ids: Vec<&str> = collection.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["2021-01-01T00:00:00Z", "2021-02-01T00:00:00Z"]);
    assert_eq!(
        collection.extent.spatial.primary(),
        BoundingBox::new(10.0, 40.0, 20.0, 50.0)
    );

    let collection_link = collection.links_with_rel(rel::WMS).next().unwrap();
    assert!(!collection_link.extra_fields.contains(FieldKey::WmsDimensions));
    assert_eq!(
        collection.items[1].links[0].extra_fields.get(FieldKey::WmsDimensions),
        Some(&json!({"TIME": "2021-02-01T00:00:00Z"}))
    );
}

#[tokio::test]
async fn test_capabilities_time_positions_are_expanded() {
    let fakes = Fakes {
        capabilities: Arc::new(FakeCapabilities::default().with_layer(
            "AWS_NO2",
            LayerCapabilities {
                bbox: Some(BoundingBox::new(5.1234567, 45.0, 15.0, 55.7654321)),
                time_positions: vec![
                    "2020-01-01/2020-01-03/P1D".to_string(),
                    "2020-01-02".to_string(),
                ],
            },
        )),
        ..Default::default()
    };
    let def = definition(
        r#"
Name: aws-no2
Resources:
  - Name: WMTS
    EndPoint: https://wmts.example.com/wmts
    LayerId: AWS_NO2
"#,
    );

    let mut catalog = catalog();
    compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap();

    assert_eq!(fakes.capabilities.calls(), 1);
    let collection = &catalog.children[0];
    assert_eq!(collection.items.len(), 3);
    assert_eq!(
        collection.extent.spatial.primary(),
        BoundingBox::new(5.12346, 45.0, 15.0, 55.76543)
    );
    assert_eq!(
        collection.items[0].links[0].extra_fields.get(FieldKey::WmtsDimensions),
        Some(&json!({"time": "2020-01-01T00:00:00Z"}))
    );
}

// ============================================================================
// Datacube adapter
// ============================================================================

fn cube() -> StacItem {
    serde_json::from_value(json!({
        "id": "cube",
        "bbox": [0.0, 50.0, 10.0, 60.0],
        "properties": {
            "cube:variables": {"no2": {"unit": "mol/m2"}},
            "cube:dimensions": {
                "x": {"type": "spatial"},
                "t": {"type": "temporal", "values": ["2021-01-01T00:00:00Z", "2021-01-02T00:00:00Z"]}
            }
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_xcube_missing_variable_is_a_data_shape_error() {
    let fakes = Fakes {
        datacube: Arc::new(FakeDatacube { cube: Some(cube()) }),
        ..Default::default()
    };
    let def = definition(
        r#"
Name: cube-so2
Resources:
  - Name: xcube
    EndPoint: https://xcube.example.com/api
    CollectionId: datacubes
    DatacubeId: demo
    Variable: so2
"#,
    );

    let mut catalog = catalog();
    let err = compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DataShape);
    assert_eq!(err.collection(), Some("cube-so2"));
    assert!(catalog.children.is_empty());
}

#[tokio::test]
async fn test_xcube_slices_time_dimension() {
    let fakes = Fakes {
        datacube: Arc::new(FakeDatacube { cube: Some(cube()) }),
        ..Default::default()
    };
    let def = definition(
        r#"
Name: cube-no2
Resources:
  - Name: xcube
    EndPoint: https://xcube.example.com/api
    CollectionId: datacubes
    DatacubeId: demo
    Variable: no2
"#,
    );

    let mut catalog = catalog();
    compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap();

    let collection = &catalog.children[0];
    assert_eq!(collection.items.len(), 2);
    assert_eq!(collection.items[0].bbox, Some(BoundingBox::new(0.0, 50.0, 10.0, 60.0)));
    assert_eq!(collection.extra_fields.get_str(FieldKey::YAxis), Some("mol/m2"));
    assert!(collection.items[1].links[0]
        .href
        .contains("time=2021-01-02T00:00:00Z"));
}

// ============================================================================
// Synthetic and tile adapters
// ============================================================================

#[tokio::test]
async fn test_collection_only_generates_items_without_links() {
    let fakes = Fakes::default();
    let def = definition(
        r#"
Name: synthetic
Resources:
  - Name: Collection-only
    DateTimeInterval:
      Start: "2022-01-01T00:00:00"
      End: "2022-01-05T00:00:00"
      Timedelta:
        days: 2
"#,
    );

    let mut catalog = catalog();
    compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap();

    let collection = &catalog.children[0];
    let ids: Vec<&str> = collection.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["2022-01-01T00:00:00Z", "2022-01-03T00:00:00Z", "2022-01-05T00:00:00Z"]
    );
    assert!(collection.items.iter().all(|i| i.links.is_empty()));
    assert_eq!(
        catalog.links[0].field_str(FieldKey::EndpointType),
        Some("Collection-only")
    );
}

#[tokio::test]
async fn test_vector_tiles_produce_only_a_template_link() {
    let fakes = Fakes::default();
    let def = definition(
        r#"
Name: tiles
Title: Vector tiles
Resources:
  - Name: GeoDB Vector Tiles
    EndPoint: https://tiles.example.com/
    Instance: eodash
    Source: E10a
    LayerId: geom
    MatchKey: aoi_id
    TimeKey: time
"#,
    );

    let mut catalog = catalog();
    compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap();

    let collection = &catalog.children[0];
    assert!(collection.items.is_empty());
    let link = collection.links_with_rel(rel::XYZ).next().unwrap();
    assert_eq!(
        link.href,
        "https://tiles.example.com/eodash:E10a_geom@EPSG:3857@pbf/{z}/{x}/{-y}.pbf"
    );
    assert_eq!(link.field_str(FieldKey::MatchKey), Some("aoi_id"));
    assert_eq!(link.field_str(FieldKey::TimeKey), Some("time"));
}

// ============================================================================
// Empty results
// ============================================================================

#[tokio::test]
async fn test_empty_results_follow_policy() {
    let def = definition(
        r#"
Name: empty
Resources:
  - Name: VEDA
    EndPoint: https://stac.example.com/
    CollectionId: nothing-here
    Type: tiles
"#,
    );
    let fakes = Fakes::default();

    let mut catalog = catalog();
    compose_collection(&fakes.context(), &mut catalog, &def)
        .await
        .unwrap();
    let collection = &catalog.children[0];
    assert_eq!(collection.extent.spatial.primary(), BoundingBox::global());
    assert_eq!(collection.extent.temporal.primary().end, None);

    let strict = HarvestSettings {
        empty_extent: EmptyExtentPolicy::Fail,
        ..Default::default()
    };
    let mut catalog = self::catalog();
    let err = compose_collection(&fakes.context_with(strict), &mut catalog, &def)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataShape);
    assert!(catalog.children.is_empty());
}
