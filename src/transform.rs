use std::fmt;

use tracing::{error, info};

use crate::error::TransformError;
use crate::record::{ContentProjection, MetadataProjection, RawRecord, RecordKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    Metadata,
    Content,
}

impl fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionKind::Metadata => write!(f, "metadata"),
            ProjectionKind::Content => write!(f, "content"),
        }
    }
}

/// One projection that could not be built for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// 0-indexed position in the transform input.
    pub position: usize,
    pub record_id: RecordKey,
    pub kind: ProjectionKind,
    pub error: TransformError,
}

#[derive(Debug, Default, Clone)]
pub struct TransformReport {
    pub metadata: Vec<MetadataProjection>,
    pub content: Vec<ContentProjection>,
    pub failures: Vec<RecordFailure>,
}

pub fn transform(records: &[RawRecord]) -> TransformReport {
    transform_with(
        records,
        MetadataProjection::from_record,
        ContentProjection::from_record,
    )
}

/// Build both projections for every record independently. A failure skips
/// only the projection being built for that record; input order is kept.
pub fn transform_with<M, C>(records: &[RawRecord], build_metadata: M, build_content: C) -> TransformReport
where
    M: Fn(&RawRecord) -> Result<MetadataProjection, TransformError>,
    C: Fn(&RawRecord) -> Result<ContentProjection, TransformError>,
{
    let mut report = TransformReport {
        metadata: Vec::with_capacity(records.len()),
        content: Vec::with_capacity(records.len()),
        failures: Vec::new(),
    };

    for (position, record) in records.iter().enumerate() {
        match build_metadata(record) {
            Ok(meta) => report.metadata.push(meta),
            Err(e) => report.failures.push(failure(position, record, ProjectionKind::Metadata, e)),
        }
        match build_content(record) {
            Ok(content) => report.content.push(content),
            Err(e) => report.failures.push(failure(position, record, ProjectionKind::Content, e)),
        }
    }

    info!(
        records = records.len(),
        metadata = report.metadata.len(),
        content = report.content.len(),
        failures = report.failures.len(),
        "Transform finished"
    );
    report
}

fn failure(position: usize, record: &RawRecord, kind: ProjectionKind, error: TransformError) -> RecordFailure {
    let record_id = record.key();
    error!(record_id = %record_id, position, projection = %kind, error = %error, "Error transforming record");
    RecordFailure {
        position,
        record_id,
        kind,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn records(values: Vec<Value>) -> Vec<RawRecord> {
        values.into_iter().map(RawRecord::new).collect()
    }

    #[test]
    fn builds_both_projections_in_order() {
        let input = records(vec![
            json!({"id": 1, "domain_name": "a.org", "content": "<p>one</p>"}),
            json!({"id": 2, "domain_name": "b.org", "content": "<p>two</p>"}),
        ]);
        let report = transform(&input);
        assert!(report.failures.is_empty());
        let meta_ids: Vec<_> = report.metadata.iter().map(|m| m.id.clone()).collect();
        let content: Vec<_> = report.content.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(meta_ids, vec![json!(1), json!(2)]);
        assert_eq!(content, vec!["one", "two"]);
    }

    #[test]
    fn sparse_record_never_fails() {
        let report = transform(&records(vec![json!({})]));
        assert!(report.failures.is_empty());
        assert_eq!(report.metadata[0].domain_name, Value::Null);
        assert_eq!(report.content[0].content, "");
        assert_eq!(report.content[0].title, Value::Null);
    }

    #[test]
    fn metadata_fault_is_isolated() {
        let input = records(vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
        let report = transform_with(
            &input,
            |r| {
                if r.id() == json!(2) {
                    Err(TransformError::NotAnObject { found: "injected" })
                } else {
                    MetadataProjection::from_record(r)
                }
            },
            ContentProjection::from_record,
        );

        assert_eq!(report.metadata.len(), 2);
        assert_eq!(report.content.len(), 3);
        assert_eq!(report.metadata[1].id, json!(3));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].position, 1);
        assert_eq!(report.failures[0].kind, ProjectionKind::Metadata);
        assert_eq!(report.failures[0].record_id, RecordKey::parse("2"));
    }

    #[test]
    fn bad_content_field_skips_only_content() {
        let input = records(vec![
            json!({"id": "a", "content": "<b>ok</b>"}),
            json!({"id": "b", "content": {"html": "nested"}}),
        ]);
        let report = transform(&input);
        assert_eq!(report.metadata.len(), 2);
        assert_eq!(report.content.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, ProjectionKind::Content);
        assert_eq!(report.failures[0].record_id, RecordKey::parse("b"));
    }

    #[test]
    fn non_object_record_fails_both() {
        let input = records(vec![json!(42), json!({"id": 1})]);
        let report = transform(&input);
        assert_eq!(report.metadata.len(), 1);
        assert_eq!(report.content.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|f| f.position == 0));
    }
}
