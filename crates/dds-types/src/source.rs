//! Query results as a source of item identifiers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::{DdsError, ItemRequest, Result};

/// Attribute names checked, in order, for the collection id.
pub const COLLECTION_ID_KEYS: [&str; 4] =
    ["collectionId", "collectionID", "collection", "collection_name"];

/// Attribute names checked, in order, for the archive id.
pub const ARCHIVE_ID_KEYS: [&str; 4] = ["archiveId", "datasetId", "recordId", "featureId"];

/// Anything that exposes an identifier and a free-form attribute mapping.
///
/// Search results from different catalog front-ends name their fields
/// differently; the status poller only relies on this capability.
pub trait ItemSource {
    /// Returns the object's own identifier, if any.
    fn identifier(&self) -> Option<&str>;

    /// Returns the object's attributes.
    fn attributes(&self) -> &Map<String, Value>;
}

/// A search result as returned by a catalog query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Result identifier.
    pub uuid: Option<String>,
    /// Attributes attached to the result.
    #[serde(default)]
    pub query_data: Map<String, Value>,
}

impl QueryResult {
    /// Creates a query result.
    #[must_use]
    pub const fn new(uuid: Option<String>, query_data: Map<String, Value>) -> Self {
        Self { uuid, query_data }
    }
}

impl QueryResult {
    /// Builds a query result from a JSON object.
    ///
    /// Objects with a `query_data` member are read as serialized results; any
    /// other object is taken as the attribute mapping itself, with `uuid` as
    /// the identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object or is malformed.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut attributes = match value {
            Value::Object(attributes) => attributes,
            other => {
                return Err(DdsError::Resolution(format!(
                    "expected a JSON object, got {}",
                    type_name(&other)
                )));
            }
        };
        if attributes.contains_key("query_data") {
            return Ok(serde_json::from_value(Value::Object(attributes))?);
        }
        let uuid = match attributes.remove("uuid") {
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                attributes.insert("uuid".into(), other);
                None
            }
            None => None,
        };
        Ok(Self::new(uuid, attributes))
    }
}

impl From<&ItemRequest> for QueryResult {
    fn from(request: &ItemRequest) -> Self {
        let mut attributes = Map::new();
        attributes.insert(
            "collectionId".into(),
            Value::String(request.collection_id.clone()),
        );
        attributes.insert(
            "archiveId".into(),
            Value::String(request.archive_id.clone()),
        );
        Self::new(None, attributes)
    }
}

/// Reads query results from a JSON file holding an array of objects.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold an array of
/// objects.
pub fn load_query_results(path: &Path) -> Result<Vec<QueryResult>> {
    let text = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Array(items) => items.into_iter().map(QueryResult::from_value).collect(),
        other => Err(DdsError::Resolution(format!(
            "expected a JSON array in {}, got {}",
            path.display(),
            type_name(&other)
        ))),
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl ItemSource for QueryResult {
    fn identifier(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    fn attributes(&self) -> &Map<String, Value> {
        &self.query_data
    }
}

impl<T: ItemSource + ?Sized> ItemSource for &T {
    fn identifier(&self) -> Option<&str> {
        (**self).identifier()
    }

    fn attributes(&self) -> &Map<String, Value> {
        (**self).attributes()
    }
}

/// Renders a truthy attribute as an identifier string.
fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

fn first_present(attributes: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| attributes.get(*key).and_then(id_value))
}

/// Derives the collection/archive pair from a query result.
///
/// The archive id falls back to the result's own identifier. Returns `None`
/// when either half cannot be resolved.
#[must_use]
pub fn resolve_ids<S: ItemSource + ?Sized>(source: &S) -> Option<ItemRequest> {
    let attributes = source.attributes();
    let collection = first_present(attributes, &COLLECTION_ID_KEYS)?;
    let archive = first_present(attributes, &ARCHIVE_ID_KEYS).or_else(|| {
        source
            .identifier()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    })?;
    Some(ItemRequest::new(collection, archive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(uuid: Option<&str>, data: Value) -> QueryResult {
        let Value::Object(map) = data else {
            panic!("fixture must be an object")
        };
        QueryResult::new(uuid.map(str::to_string), map)
    }

    #[test]
    fn test_resolve_primary_keys() {
        let qr = result(None, json!({"collectionId": "RCM", "archiveId": "42"}));
        assert_eq!(resolve_ids(&qr), Some(ItemRequest::new("RCM", "42")));
    }

    #[test]
    fn test_resolve_key_order() {
        let qr = result(
            None,
            json!({"collection_name": "late", "collectionID": "early", "featureId": "f", "recordId": "r"}),
        );
        assert_eq!(resolve_ids(&qr), Some(ItemRequest::new("early", "r")));
    }

    #[test]
    fn test_resolve_falls_back_to_uuid() {
        let qr = result(Some("uuid-1"), json!({"collection": "RCM"}));
        assert_eq!(resolve_ids(&qr), Some(ItemRequest::new("RCM", "uuid-1")));
    }

    #[test]
    fn test_resolve_numeric_archive_id() {
        let qr = result(None, json!({"collectionId": "RCM", "recordId": 1234}));
        assert_eq!(resolve_ids(&qr), Some(ItemRequest::new("RCM", "1234")));
    }

    #[test]
    fn test_resolve_skips_empty_values() {
        let qr = result(None, json!({"collectionId": "", "collection": "RCM", "archiveId": null, "datasetId": "d"}));
        assert_eq!(resolve_ids(&qr), Some(ItemRequest::new("RCM", "d")));
    }

    #[test]
    fn test_resolve_missing_collection() {
        let qr = result(Some("uuid-1"), json!({"archiveId": "42"}));
        assert_eq!(resolve_ids(&qr), None);
    }

    #[test]
    fn test_resolve_missing_archive() {
        let qr = result(None, json!({"collectionId": "RCM"}));
        assert_eq!(resolve_ids(&qr), None);
    }

    #[test]
    fn test_from_value_raw_record() {
        let qr = QueryResult::from_value(json!({
            "uuid": "u-1",
            "collectionId": "RCM"
        }))
        .unwrap();
        assert_eq!(qr.identifier(), Some("u-1"));
        assert_eq!(resolve_ids(&qr), Some(ItemRequest::new("RCM", "u-1")));
    }

    #[test]
    fn test_from_value_serialized_result() {
        let qr = QueryResult::from_value(json!({
            "uuid": null,
            "query_data": {"collectionId": "RCM", "archiveId": 7}
        }))
        .unwrap();
        assert_eq!(qr.identifier(), None);
        assert_eq!(resolve_ids(&qr), Some(ItemRequest::new("RCM", "7")));
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        assert!(QueryResult::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_from_item_request() {
        let qr = QueryResult::from(&ItemRequest::new("RCM", "42"));
        assert_eq!(resolve_ids(&qr), Some(ItemRequest::new("RCM", "42")));
    }

    #[test]
    fn test_load_query_results() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, r#"[{"uuid": "a", "collectionId": "RCM"}, {"archiveId": "b"}]"#)
            .unwrap();

        let results = load_query_results(&path).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].identifier(), None);

        std::fs::write(&path, r#"{"uuid": "a"}"#).unwrap();
        assert!(matches!(
            load_query_results(&path),
            Err(DdsError::Resolution(_))
        ));
    }
}
