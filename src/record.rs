use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{json_kind, TransformError};
use crate::markup::clean_html;

/// One article entry as returned by the source API. The shape is not trusted:
/// anything the API sends is kept and only inspected during transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Value);

impl RawRecord {
    pub fn new(value: Value) -> Self {
        RawRecord(value)
    }

    /// Field lookup. Absent fields and non-object records both read as `None`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.as_object().and_then(|obj| obj.get(name))
    }

    /// The `id` field, or the typed-null placeholder when absent.
    pub fn id(&self) -> Value {
        self.field("id").cloned().unwrap_or(Value::Null)
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::from_value(self.field("id").unwrap_or(&Value::Null))
    }

    fn as_object(&self) -> Result<&serde_json::Map<String, Value>, TransformError> {
        self.0.as_object().ok_or(TransformError::NotAnObject {
            found: json_kind(&self.0),
        })
    }
}

/// Canonical deduplication key: the compact JSON rendering of the `id` field.
/// The number `1` and the string `"1"` stay distinct, and a missing id is the
/// same key as an explicit `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn from_value(value: &Value) -> Self {
        RecordKey(value.to_string())
    }

    /// Key for a user-typed id: valid JSON is taken as-is, anything else is
    /// treated as a bare string.
    pub fn parse(input: &str) -> Self {
        match serde_json::from_str::<Value>(input) {
            Ok(v) => RecordKey::from_value(&v),
            Err(_) => RecordKey::from_value(&Value::String(input.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lightweight projection bound for the metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataProjection {
    #[serde(rename = "record_id")]
    pub id: Value,
    pub domain_name: Value,
    pub language: Value,
    pub tags: Value,
    pub http_status: Value,
    pub published_by: Value,
    pub user_email: Value,
}

impl MetadataProjection {
    /// Copies the fields verbatim; only a record that is not an object fails.
    pub fn from_record(record: &RawRecord) -> Result<Self, TransformError> {
        let obj = record.as_object()?;
        let get = |name: &str| obj.get(name).cloned().unwrap_or(Value::Null);
        Ok(MetadataProjection {
            id: get("id"),
            domain_name: get("domain_name"),
            language: get("language"),
            tags: get("tags"),
            http_status: get("http_status"),
            published_by: get("published_by"),
            user_email: get("user_email"),
        })
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::from_value(&self.id)
    }
}

/// Full-content projection bound for the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentProjection {
    pub id: Value,
    pub title: Value,
    pub url: Value,
    pub preview_picture: Value,
    pub content: String,
    pub last_sourced: Value,
}

impl ContentProjection {
    pub fn from_record(record: &RawRecord) -> Result<Self, TransformError> {
        let obj = record.as_object()?;
        let get = |name: &str| obj.get(name).cloned().unwrap_or(Value::Null);
        let content = match obj.get("content") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(html)) => clean_html(html),
            Some(other) => {
                return Err(TransformError::FieldType {
                    field: "content",
                    expected: "string",
                    found: json_kind(other),
                })
            }
        };
        Ok(ContentProjection {
            id: get("id"),
            title: get("title"),
            url: get("url"),
            preview_picture: get("preview_picture"),
            content,
            last_sourced: get("last_sourced_from_wallabag"),
        })
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::from_value(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_string_ids_are_distinct_keys() {
        let a = RawRecord::new(json!({"id": 1}));
        let b = RawRecord::new(json!({"id": "1"}));
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn missing_id_equals_null_id() {
        let a = RawRecord::new(json!({"title": "x"}));
        let b = RawRecord::new(json!({"id": null}));
        assert_eq!(a.key(), b.key());
        assert_eq!(a.id(), Value::Null);
    }

    #[test]
    fn parse_key_accepts_numbers_and_bare_strings() {
        assert_eq!(RecordKey::parse("42"), RawRecord::new(json!({"id": 42})).key());
        assert_eq!(
            RecordKey::parse("abc"),
            RawRecord::new(json!({"id": "abc"})).key()
        );
        assert_eq!(
            RecordKey::parse("\"abc\""),
            RawRecord::new(json!({"id": "abc"})).key()
        );
    }

    #[test]
    fn metadata_missing_fields_become_null() {
        let record = RawRecord::new(json!({"id": 7, "language": "en"}));
        let meta = MetadataProjection::from_record(&record).unwrap();
        assert_eq!(meta.id, json!(7));
        assert_eq!(meta.language, json!("en"));
        assert_eq!(meta.domain_name, Value::Null);
        assert_eq!(meta.tags, Value::Null);
        assert_eq!(meta.user_email, Value::Null);
    }

    #[test]
    fn metadata_serializes_record_id() {
        let record = RawRecord::new(json!({"id": 3, "tags": ["a", "b"], "http_status": "200"}));
        let body = serde_json::to_value(MetadataProjection::from_record(&record).unwrap()).unwrap();
        assert_eq!(body["record_id"], json!(3));
        assert_eq!(body["tags"], json!(["a", "b"]));
        assert_eq!(body["http_status"], json!("200"));
        assert!(body.get("id").is_none());
    }

    #[test]
    fn content_cleans_markup_and_maps_timestamp() {
        let record = RawRecord::new(json!({
            "id": 1,
            "title": "T",
            "url": "https://example.org/a",
            "content": "<p>Hello <b>World</b></p>",
            "last_sourced_from_wallabag": "2024-05-01T10:00:00Z"
        }));
        let content = ContentProjection::from_record(&record).unwrap();
        assert_eq!(content.content, "Hello World");
        assert_eq!(content.last_sourced, json!("2024-05-01T10:00:00Z"));
        assert_eq!(content.preview_picture, Value::Null);
    }

    #[test]
    fn content_absent_or_null_is_empty_string() {
        let absent = ContentProjection::from_record(&RawRecord::new(json!({"id": 1}))).unwrap();
        let null = ContentProjection::from_record(&RawRecord::new(json!({"id": 1, "content": null})))
            .unwrap();
        assert_eq!(absent.content, "");
        assert_eq!(null.content, "");
    }

    #[test]
    fn content_of_wrong_type_is_rejected() {
        let record = RawRecord::new(json!({"id": 1, "content": 12}));
        let err = ContentProjection::from_record(&record).unwrap_err();
        assert_eq!(
            err,
            TransformError::FieldType {
                field: "content",
                expected: "string",
                found: "number"
            }
        );
    }

    #[test]
    fn non_object_record_is_rejected() {
        let record = RawRecord::new(json!("just a string"));
        assert_eq!(
            MetadataProjection::from_record(&record).unwrap_err(),
            TransformError::NotAnObject { found: "string" }
        );
    }
}
