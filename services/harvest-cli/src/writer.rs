//! Static JSON catalog output.
//!
//! Layout under the output directory:
//!
//! ```text
//! <catalog>/catalog.json
//! <catalog>/<collection>/collection.json
//! <catalog>/<collection>/<child>/collection.json
//! <catalog>/<collection>/<year>/<item>.json
//! ```
//!
//! Every document gets `root` and `parent` links relative to its own
//! location and an absolute `self` link under the catalog endpoint.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use catalog_model::{media_types, rel, Catalog, Collection, Item};

pub struct CatalogWriter {
    output_dir: PathBuf,
}

impl CatalogWriter {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Write one catalog tree and return the path of its `catalog.json`.
    pub fn write(&self, catalog: &Catalog, endpoint: &str) -> Result<PathBuf> {
        let root_dir = self.output_dir.join(&catalog.id);
        fs::create_dir_all(&root_dir)
            .with_context(|| format!("Failed to create {:?}", root_dir))?;

        let base = endpoint.trim_end_matches('/');
        let mut document = to_document(catalog)?;
        push_links(
            &mut document,
            vec![
                link(rel::ROOT, "./catalog.json", &catalog.title),
                link(rel::SELF, &format!("{}/catalog.json", base), &catalog.title),
            ],
        );
        let catalog_path = root_dir.join("catalog.json");
        write_json(&catalog_path, &document)?;

        let location = Location {
            dir: root_dir,
            url: base.to_string(),
            depth: 0,
            parent_file: "catalog.json",
        };
        for collection in &catalog.children {
            write_collection(&location, collection, &catalog.title)?;
        }

        Ok(catalog_path)
    }
}

/// Where a parent document lives.
struct Location {
    dir: PathBuf,
    url: String,
    /// Directories below the catalog root.
    depth: usize,
    parent_file: &'static str,
}

fn write_collection(parent: &Location, collection: &Collection, root_title: &str) -> Result<()> {
    let here = Location {
        dir: parent.dir.join(&collection.id),
        url: format!("{}/{}", parent.url, collection.id),
        depth: parent.depth + 1,
        parent_file: "collection.json",
    };
    fs::create_dir_all(&here.dir).with_context(|| format!("Failed to create {:?}", here.dir))?;

    let mut document = to_document(collection)?;
    push_links(
        &mut document,
        vec![
            link(rel::ROOT, &root_href(here.depth), root_title),
            link(rel::PARENT, &format!("../{}", parent.parent_file), ""),
            link(
                rel::SELF,
                &format!("{}/collection.json", here.url),
                &collection.title,
            ),
        ],
    );
    write_json(&here.dir.join("collection.json"), &document)?;

    for item in &collection.items {
        write_item(&here, item, root_title)?;
    }
    debug!(
        collection = %collection.id,
        items = collection.items.len(),
        children = collection.children.len(),
        "Collection written"
    );

    for child in &collection.children {
        write_collection(&here, child, root_title)?;
    }
    Ok(())
}

fn write_item(collection: &Location, item: &Item, root_title: &str) -> Result<()> {
    let year = item.year();
    let dir = collection.dir.join(&year);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;

    let mut document = to_document(item)?;
    push_links(
        &mut document,
        vec![
            link(rel::ROOT, &root_href(collection.depth + 1), root_title),
            link(rel::PARENT, "../collection.json", ""),
            link(
                rel::SELF,
                &format!("{}/{}/{}.json", collection.url, year, item.id),
                "",
            ),
        ],
    );
    write_json(&dir.join(format!("{}.json", item.id)), &document)
}

fn root_href(depth: usize) -> String {
    format!("{}catalog.json", "../".repeat(depth))
}

fn link(rel: &str, href: &str, title: &str) -> Value {
    let mut link = json!({
        "rel": rel,
        "href": href,
        "type": media_types::JSON,
    });
    if !title.is_empty() {
        link["title"] = Value::String(title.to_string());
    }
    link
}

fn to_document<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to serialize catalog document")
}

fn push_links(document: &mut Value, links: Vec<Value>) {
    if let Some(existing) = document.get_mut("links").and_then(Value::as_array_mut) {
        existing.extend(links);
    } else {
        document["links"] = Value::Array(links);
    }
}

fn write_json(path: &Path, document: &Value) -> Result<()> {
    let content = serde_json::to_string_pretty(document)?;
    fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}
