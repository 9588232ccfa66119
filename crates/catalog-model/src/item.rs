//! Items: discrete spatio-temporal records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use harvest_common::{date_key, format_zulu, BoundingBox};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::asset::Asset;
use crate::link::Link;

/// When an item is valid: exactly one instant, or a start/end pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTime {
    Instant(DateTime<Utc>),
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl ItemTime {
    /// `(start, end)`; an instant is both.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        match *self {
            ItemTime::Instant(t) => (t, t),
            ItemTime::Range { start, end } => (start, end),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.bounds().0
    }

    /// Calendar date of the start, for per-day deduplication.
    pub fn date_key(&self) -> String {
        date_key(&self.start())
    }
}

/// GeoJSON point geometry.
pub fn point_geometry(lon: f64, lat: f64) -> Value {
    json!({
        "type": "Point",
        "coordinates": [lon, lat]
    })
}

/// A single catalog entry: an observation, a time slice, a location.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub bbox: Option<BoundingBox>,
    pub geometry: Option<Value>,
    pub time: ItemTime,
    pub properties: Map<String, Value>,
    pub assets: BTreeMap<String, Asset>,
    pub links: Vec<Link>,
    /// Id of a separate root collection this item points back to (non-owning).
    pub collection: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, time: ItemTime) -> Self {
        Self {
            id: id.into(),
            bbox: None,
            geometry: None,
            time,
            properties: Map::new(),
            assets: BTreeMap::new(),
            links: Vec::new(),
            collection: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_geometry(mut self, geometry: Value) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    /// Point this item back at a root collection for client navigation.
    pub fn set_root_collection(&mut self, collection_id: impl Into<String>) {
        self.collection = Some(collection_id.into());
    }

    /// Year directory the item is stored under.
    pub fn year(&self) -> String {
        self.time.start().format("%Y").to_string()
    }

    /// Properties with the temporal fields merged in.
    pub fn output_properties(&self) -> Map<String, Value> {
        let mut properties = self.properties.clone();
        match self.time {
            ItemTime::Instant(t) => {
                properties.insert("datetime".into(), Value::String(format_zulu(&t)));
            }
            ItemTime::Range { start, end } => {
                properties.insert("datetime".into(), Value::Null);
                properties.insert("start_datetime".into(), Value::String(format_zulu(&start)));
                properties.insert("end_datetime".into(), Value::String(format_zulu(&end)));
            }
        }
        properties
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", "Feature")?;
        map.serialize_entry("stac_version", crate::catalog::STAC_VERSION)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("geometry", &self.geometry)?;
        if let Some(bbox) = &self.bbox {
            map.serialize_entry("bbox", bbox)?;
        }
        map.serialize_entry("properties", &self.output_properties())?;
        map.serialize_entry("links", &self.links)?;
        map.serialize_entry("assets", &self.assets)?;
        if let Some(collection) = &self.collection {
            map.serialize_entry("collection", collection)?;
        }
        map.end()
    }
}
