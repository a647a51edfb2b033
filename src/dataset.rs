//! Campus-keyed restaurant dataset.
//!
//! Records are kept as JSON objects so fields this tool does not know about
//! survive a load/save cycle untouched. `restaurant_count` is derived from the
//! record list whenever a campus is serialized and is never read back.
use anyhow::{anyhow, Context, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::Path;

/// The two campuses a dataset can hold, in their canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Campus {
    Seoul,
    Global,
}

impl Campus {
    pub const ALL: [Campus; 2] = [Campus::Seoul, Campus::Global];

    pub fn key(self) -> &'static str {
        match self {
            Self::Seoul => "seoul",
            Self::Global => "global",
        }
    }

    /// Label written into a freshly created campus section.
    pub fn label(self) -> &'static str {
        match self {
            Self::Seoul => "서울캠퍼스",
            Self::Global => "글로벌캠퍼스",
        }
    }

    /// Neighbourhood used in prompts and map searches.
    pub fn location_hint(self) -> &'static str {
        match self {
            Self::Seoul => "이문동",
            Self::Global => "용인시 처인구 모현읍",
        }
    }
}

impl fmt::Display for Campus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single restaurant entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Restaurant(Map<String, Value>);

impl Restaurant {
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String(name.into()));
        Self(fields)
    }

    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.0.insert(field.to_string(), value);
    }

    /// The record's name with surrounding whitespace removed.
    pub fn name(&self) -> &str {
        self.0
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("")
    }

    /// Rating as a number, accepting numeric strings. `None` when absent,
    /// null, or unparsable.
    pub fn rating(&self) -> Option<f64> {
        self.0.get("rating").and_then(numeric_value)
    }

    pub fn reviews(&self) -> Vec<&str> {
        self.0
            .get("reviews")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Overwrite every non-null field present in `update`, keeping this
    /// record's `name`. Returns the number of fields written.
    pub fn merge_from(&mut self, update: &Map<String, Value>) -> usize {
        let mut written = 0;
        for (field, value) in update {
            if field == "name" || value.is_null() {
                continue;
            }
            self.0.insert(field.clone(), value.clone());
            written += 1;
        }
        written
    }
}

/// Parse a JSON number or numeric string as `f64`.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// One campus section of the dataset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawCampusData")]
pub struct CampusData {
    pub campus: String,
    pub restaurants: Vec<Restaurant>,
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawCampusData {
    #[serde(default)]
    campus: String,
    #[serde(default)]
    restaurants: Vec<Restaurant>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawCampusData> for CampusData {
    fn from(raw: RawCampusData) -> Self {
        let mut extra = raw.extra;
        // Stored counts are stale by definition; the list is authoritative.
        extra.remove("restaurant_count");
        Self {
            campus: raw.campus,
            restaurants: raw.restaurants,
            extra,
        }
    }
}

impl Serialize for CampusData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.extra.len()))?;
        map.serialize_entry("campus", &self.campus)?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("restaurant_count", &self.restaurant_count())?;
        map.serialize_entry("restaurants", &self.restaurants)?;
        map.end()
    }
}

impl CampusData {
    pub fn new(campus: Campus) -> Self {
        Self {
            campus: campus.label().to_string(),
            restaurants: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn restaurant_count(&self) -> usize {
        self.restaurants.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = name.trim();
        self.restaurants.iter().any(|r| r.name() == name)
    }
}

/// All campuses plus any unrelated top-level keys of the source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seoul: Option<CampusData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<CampusData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Dataset {
    pub fn campus(&self, campus: Campus) -> Option<&CampusData> {
        match campus {
            Campus::Seoul => self.seoul.as_ref(),
            Campus::Global => self.global.as_ref(),
        }
    }

    pub fn campus_mut(&mut self, campus: Campus) -> Option<&mut CampusData> {
        match campus {
            Campus::Seoul => self.seoul.as_mut(),
            Campus::Global => self.global.as_mut(),
        }
    }

    /// Return the campus section, creating an empty one when missing.
    pub fn campus_entry(&mut self, campus: Campus) -> &mut CampusData {
        let slot = match campus {
            Campus::Seoul => &mut self.seoul,
            Campus::Global => &mut self.global,
        };
        slot.get_or_insert_with(|| CampusData::new(campus))
    }

    /// Present campuses in canonical order.
    pub fn campuses(&self) -> impl Iterator<Item = (Campus, &CampusData)> {
        Campus::ALL
            .into_iter()
            .filter_map(|campus| self.campus(campus).map(|data| (campus, data)))
    }

    pub fn restaurant_count(&self) -> usize {
        self.campuses().map(|(_, data)| data.restaurant_count()).sum()
    }
}

/// Load a dataset from disk.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let bytes = fs::read(path).with_context(|| format!("read dataset {}", path.display()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse dataset JSON {}", path.display()))?;
    if !value.is_object() {
        return Err(anyhow!(
            "dataset {} must be a JSON object keyed by campus",
            path.display()
        ));
    }
    let dataset: Dataset = serde_json::from_value(value)
        .with_context(|| format!("decode dataset {}", path.display()))?;
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn restaurant_count_is_recomputed_on_serialize() {
        let raw = json!({
            "seoul": {
                "campus": "서울캠퍼스",
                "restaurant_count": 99,
                "restaurants": [{"name": "Pasta House"}]
            }
        });
        let mut dataset: Dataset = serde_json::from_value(raw).unwrap();
        dataset
            .campus_mut(Campus::Seoul)
            .unwrap()
            .restaurants
            .push(Restaurant::new("Kim's BBQ"));

        let value = serde_json::to_value(&dataset).unwrap();
        assert_eq!(value["seoul"]["restaurant_count"], json!(2));
        assert!(value.get("global").is_none());
    }

    #[test]
    fn unknown_fields_survive_roundtrip() {
        let raw = json!({
            "last_updated": "2024-01-01T00:00:00",
            "global": {
                "campus": "글로벌캠퍼스",
                "region": "yongin",
                "restaurants": [{"name": "Noodle Bar", "menu_url": "http://x"}]
            }
        });
        let dataset: Dataset = serde_json::from_value(raw).unwrap();
        let value = serde_json::to_value(&dataset).unwrap();
        assert_eq!(value["last_updated"], json!("2024-01-01T00:00:00"));
        assert_eq!(value["global"]["region"], json!("yongin"));
        assert_eq!(
            value["global"]["restaurants"][0]["menu_url"],
            json!("http://x")
        );
    }

    #[test]
    fn merge_keeps_name_and_skips_nulls() {
        let mut record = Restaurant::new("Pasta House");
        record.set("phone", json!("02-123-4567"));
        let update = json!({
            "name": "PASTA HOUSE (renamed)",
            "phone": null,
            "rating": 4.2,
            "category": "Italian"
        });
        let written = record.merge_from(update.as_object().unwrap());

        assert_eq!(written, 2);
        assert_eq!(record.name(), "Pasta House");
        assert_eq!(record.get("phone"), Some(&json!("02-123-4567")));
        assert_eq!(record.rating(), Some(4.2));
    }

    #[test]
    fn rating_accepts_numeric_strings() {
        let mut record = Restaurant::new("a");
        record.set("rating", json!(" 3.5 "));
        assert_eq!(record.rating(), Some(3.5));
        record.set("rating", json!("n/a"));
        assert_eq!(record.rating(), None);
    }
}
