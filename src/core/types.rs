use super::error::{Result, SyncError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// JSON field map of a record or document.
pub type Fields = Map<String, Value>;

/// A row as exchanged with the remote store: a JSON object carrying an `id` field.
pub type Row = Map<String, Value>;

/// Name of the identifier field every row carries.
pub const ID_FIELD: &str = "id";

/// A value that can live in a synchronized collection.
///
/// The identifier must be unique within its collection and stable for the
/// lifetime of the record.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn record_id(&self) -> &str;
}

/// Schemaless record: an id plus arbitrary JSON fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Fields::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }
}

impl Record for Entity {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// Serializes a record into a remote row.
pub fn to_row<T: Serialize>(record: &T) -> Result<Row> {
    match serde_json::to_value(record)? {
        Value::Object(row) => Ok(row),
        other => Err(SyncError::Codec(format!(
            "record must serialize to an object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Deserializes a remote row into a record.
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Reads the `id` of a row, if it has a non-empty string id.
pub fn row_id(row: &Row) -> Option<&str> {
    row.get(ID_FIELD)
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Content hash of a record's canonical JSON form.
///
/// Object keys are emitted in sorted order, so two records with the same
/// fields in a different order share a fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(blake3::Hash);

impl Fingerprint {
    pub fn of<T: Serialize>(record: &T) -> Result<Self> {
        let canonical = serde_json::to_value(record)?;
        let bytes = serde_json::to_vec(&canonical)?;
        Ok(Self(blake3::hash(&bytes)))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.0.to_hex();
        write!(f, "Fingerprint({})", &hex.as_str()[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_round_trips_flattened() {
        let entity = Entity::new("A").with("stock", 5).with("name", "Chair");
        let row = to_row(&entity).unwrap();

        assert_eq!(row.get("id"), Some(&json!("A")));
        assert_eq!(row.get("stock"), Some(&json!(5)));

        let back: Entity = from_row(row).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let left: Value = serde_json::from_str(r#"{"id":"A","stock":5,"name":"x"}"#).unwrap();
        let right: Value = serde_json::from_str(r#"{"name":"x","stock":5,"id":"A"}"#).unwrap();

        assert_eq!(Fingerprint::of(&left).unwrap(), Fingerprint::of(&right).unwrap());
    }

    #[test]
    fn test_fingerprint_detects_changed_value() {
        let before = Entity::new("A").with("stock", 5);
        let after = Entity::new("A").with("stock", 3);

        assert_ne!(Fingerprint::of(&before).unwrap(), Fingerprint::of(&after).unwrap());
    }

    #[test]
    fn test_to_row_rejects_non_objects() {
        let result = to_row(&vec![1, 2, 3]);
        assert!(matches!(result, Err(SyncError::Codec(_))));
    }

    #[test]
    fn test_row_id_requires_non_blank_string() {
        let mut row = Row::new();
        assert_eq!(row_id(&row), None);

        row.insert("id".into(), json!("  "));
        assert_eq!(row_id(&row), None);

        row.insert("id".into(), json!(7));
        assert_eq!(row_id(&row), None);

        row.insert("id".into(), json!("u-1"));
        assert_eq!(row_id(&row), Some("u-1"));
    }
}
