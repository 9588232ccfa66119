//! Concurrent catalog builds.

mod common;

use std::sync::Arc;

use harvest_common::ErrorKind;
use tokio_test::{assert_err, assert_ok};
use harvester::{
    CatalogBuilder, CatalogDefinition, CatalogEntry, CollectionDefinition, HarvestSettings,
};

use common::{definition, now, stac_item, FakeStac, Fakes, ASSETS_ENDPOINT};

fn catalog_definition(id: &str, entries: Vec<CollectionDefinition>) -> CatalogDefinition {
    CatalogDefinition {
        id: id.to_string(),
        title: format!("Catalog {}", id),
        description: String::new(),
        endpoint: format!("https://catalogs.example.com/{}", id),
        assets_endpoint: ASSETS_ENDPOINT.to_string(),
        entries: entries.into_iter().map(CatalogEntry::Collection).collect(),
    }
}

fn synthetic(name: &str) -> CollectionDefinition {
    definition(&format!(
        r#"
Name: {name}
Resources:
  - Name: Collection-only
    Times: ["2021-01-01", "2021-01-02"]
"#
    ))
}

fn veda(name: &str, remote: &str) -> CollectionDefinition {
    definition(&format!(
        r#"
Name: {name}
Resources:
  - Name: VEDA
    EndPoint: https://stac.example.com/
    CollectionId: {remote}
    Type: cog
"#
    ))
}

fn fakes() -> Fakes {
    Fakes {
        stac: Arc::new(
            FakeStac::default()
                .with_items(
                    "good",
                    vec![stac_item("g1", "2021-01-01T00:00:00Z", [0.0, 0.0, 1.0, 1.0])],
                )
                .failing_on("broken"),
        ),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_one_failing_catalog_does_not_stop_siblings() {
    let fakes = fakes();
    let builder = CatalogBuilder::new(HarvestSettings::default(), fakes.clients()).with_now(now());

    let definitions = vec![
        catalog_definition("alpha", vec![synthetic("a1"), veda("a2", "good")]),
        catalog_definition("beta", vec![synthetic("b1"), veda("b2", "broken"), synthetic("b3")]),
        catalog_definition("gamma", vec![synthetic("c1")]),
    ];

    let report = builder.build_all(definitions).await;

    assert!(!report.is_success());
    let built: Vec<&str> = report.catalogs.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(built, vec!["alpha", "gamma"]);
    assert_eq!(report.catalogs[0].children.len(), 2);

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.catalog, "beta");
    assert_eq!(failure.error.kind(), ErrorKind::ProviderFetch);
    assert_eq!(failure.error.collection(), Some("b2"));

    // Work attached before the failure is kept, work after it never ran.
    let partial: Vec<&str> = failure.partial.children.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(partial, vec!["b1"]);

    let err = assert_err!(report.into_result());
    assert_eq!(err.kind(), ErrorKind::ProviderFetch);
}

#[tokio::test]
async fn test_all_catalogs_succeed() {
    let fakes = fakes();
    let builder = CatalogBuilder::new(HarvestSettings::default(), fakes.clients()).with_now(now());

    let report = builder
        .build_all(vec![
            catalog_definition("one", vec![synthetic("x")]),
            catalog_definition("two", vec![veda("y", "good")]),
        ])
        .await;

    assert!(report.is_success());
    let catalogs = assert_ok!(report.into_result());
    assert_eq!(catalogs.len(), 2);
    assert_eq!(catalogs[1].children[0].items.len(), 1);
}

#[tokio::test]
async fn test_indicator_entries_are_composed() {
    let fakes = fakes();
    let builder = CatalogBuilder::new(HarvestSettings::default(), fakes.clients()).with_now(now());

    let mut definition = catalog_definition("ind", Vec::new());
    definition.entries.push(CatalogEntry::Indicator {
        definition: common::definition("Name: N3\n"),
        members: vec![synthetic("N3a"), synthetic("N3b")],
    });

    let catalogs = builder
        .build_all(vec![definition])
        .await
        .into_result()
        .unwrap();

    let indicator = &catalogs[0].children[0];
    assert_eq!(indicator.id, "N3");
    assert_eq!(indicator.children.len(), 2);
}
