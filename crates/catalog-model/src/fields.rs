//! Bubbled metadata fields.
//!
//! Links, items and collections carry extra fields beyond their core schema.
//! The set of recognized keys is closed so that the wire contract stays
//! stable; each key knows its serialized spelling.

use std::collections::{BTreeMap, BTreeSet};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Recognized extra-field keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
    // Descriptive metadata bubbled from collection configuration
    Id,
    Title,
    Subtitle,
    Code,
    Subcode,
    Themes,
    Tags,
    Keywords,
    Satellite,
    Sensor,
    Agency,
    Locations,
    YAxis,
    EndpointType,
    MapProjection,

    // Location and summary fields
    Cities,
    Countries,
    City,
    Country,
    Name,
    Latlng,

    // Temporal bubbles on item links
    Datetime,
    StartDatetime,
    EndDatetime,

    // Visualization parameters
    Role,
    WmsLayers,
    WmsStyles,
    WmsDimensions,
    WmtsLayer,
    WmtsDimensions,
    Description,
    Parameters,
    MatchKey,
    TimeKey,
    Source,

    // Scientific and projection extensions
    ProjEpsg,
    SciDoi,
    SciCitation,
    SciPublications,
}

impl FieldKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::Id => "id",
            FieldKey::Title => "title",
            FieldKey::Subtitle => "subtitle",
            FieldKey::Code => "code",
            FieldKey::Subcode => "subcode",
            FieldKey::Themes => "themes",
            FieldKey::Tags => "tags",
            FieldKey::Keywords => "keywords",
            FieldKey::Satellite => "satellite",
            FieldKey::Sensor => "sensor",
            FieldKey::Agency => "agency",
            FieldKey::Locations => "locations",
            FieldKey::YAxis => "yAxis",
            FieldKey::EndpointType => "endpointtype",
            FieldKey::MapProjection => "eodash:mapProjection",
            FieldKey::Cities => "cities",
            FieldKey::Countries => "countries",
            FieldKey::City => "city",
            FieldKey::Country => "country",
            FieldKey::Name => "name",
            FieldKey::Latlng => "latlng",
            FieldKey::Datetime => "datetime",
            FieldKey::StartDatetime => "start_datetime",
            FieldKey::EndDatetime => "end_datetime",
            FieldKey::Role => "role",
            FieldKey::WmsLayers => "wms:layers",
            FieldKey::WmsStyles => "wms:styles",
            FieldKey::WmsDimensions => "wms:dimensions",
            FieldKey::WmtsLayer => "wmts:layer",
            FieldKey::WmtsDimensions => "wmts:dimensions",
            FieldKey::Description => "description",
            FieldKey::Parameters => "parameters",
            FieldKey::MatchKey => "matchKey",
            FieldKey::TimeKey => "timeKey",
            FieldKey::Source => "source",
            FieldKey::ProjEpsg => "proj:epsg",
            FieldKey::SciDoi => "sci:doi",
            FieldKey::SciCitation => "sci:citation",
            FieldKey::SciPublications => "sci:publications",
        }
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered mapping of extra fields.
///
/// Insertion order is preserved; inserting an existing key replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraFields {
    entries: Vec<(FieldKey, Value)>,
}

impl ExtraFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: FieldKey, value: impl Into<Value>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: FieldKey, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: FieldKey) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// String value of a field, if present and a string.
    pub fn get_str(&self, key: FieldKey) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: FieldKey) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Copy every entry of `other` into `self`, replacing existing keys.
    pub fn extend(&mut self, other: &ExtraFields) {
        for (key, value) in &other.entries {
            self.insert(*key, value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &Value)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ExtraFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key.as_str(), value)?;
        }
        map.end()
    }
}

/// Distinct-value summaries of a collection (countries, cities, themes, ...).
///
/// Values are kept sorted so that output is reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summaries {
    lists: BTreeMap<FieldKey, BTreeSet<String>>,
}

impl Summaries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: FieldKey, value: impl Into<String>) {
        self.lists.entry(key).or_default().insert(value.into());
    }

    /// Add a JSON value: strings are added directly, arrays element-wise.
    pub fn add_value(&mut self, key: FieldKey, value: &Value) {
        match value {
            Value::String(s) => self.add(key, s.clone()),
            Value::Array(values) => {
                for v in values {
                    self.add_value(key, v);
                }
            }
            Value::Null => {}
            other => self.add(key, other.to_string()),
        }
    }

    pub fn get(&self, key: FieldKey) -> Option<&BTreeSet<String>> {
        self.lists.get(&key)
    }

    /// Non-empty summary lists in key order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &BTreeSet<String>)> {
        self.lists
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(k, v)| (*k, v))
    }

    pub fn merge(&mut self, other: &Summaries) {
        for (key, values) in other.iter() {
            for value in values {
                self.add(key, value.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lists.values().all(BTreeSet::is_empty)
    }
}

impl Serialize for Summaries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, values) in self.iter() {
            map.serialize_entry(key.as_str(), values)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_preserves_order_and_replaces() {
        let mut fields = ExtraFields::new();
        fields.insert(FieldKey::Title, "A");
        fields.insert(FieldKey::Code, "N1");
        fields.insert(FieldKey::Title, "B");

        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"{"title":"B","code":"N1"}"#);
    }

    #[test]
    fn test_summaries_flatten_arrays() {
        let mut summaries = Summaries::new();
        summaries.add_value(FieldKey::Countries, &json!(["AT", "DE"]));
        summaries.add_value(FieldKey::Countries, &json!("AT"));

        let countries = summaries.get(FieldKey::Countries).unwrap();
        assert_eq!(countries.len(), 2);
        assert_eq!(
            serde_json::to_value(&summaries).unwrap(),
            json!({"countries": ["AT", "DE"]})
        );
    }
}
