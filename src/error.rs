use thiserror::Error;

/// Failure reading the upstream record collection.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} answered with status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("payload from {endpoint} is not a JSON array: {reason}")]
    Payload { endpoint: String, reason: String },
}

impl SourceError {
    /// Transport faults and non-2xx answers are worth another attempt; a
    /// malformed body is not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SourceError::Payload { .. })
    }
}

/// Failure building one projection out of one raw record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("record is a JSON {found}, not an object")]
    NotAnObject { found: &'static str },
    #[error("field `{field}` holds a JSON {found}, expected {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// Failure delivering projections to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("document store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("could not serialize document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Short JSON type name used in error messages.
pub fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
