use chrono::{DateTime, Utc};
use tracing::info;

use crate::load::{BulkOutcome, DeliveryOutcome, DeliveryReport};
use crate::transform::{ProjectionKind, RecordFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Source yielded nothing; the run stopped after extraction.
    NoData,
    /// Loaders were skipped on request.
    DryRun,
    Completed,
}

/// Everything a run did, stage by stage. Degraded runs still finish as
/// `Completed`; the per-record outcomes say what went wrong.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub extracted: usize,
    pub unique: usize,
    pub transformed: usize,
    pub metadata_built: usize,
    pub content_built: usize,
    pub transform_failures: Vec<RecordFailure>,
    pub metadata: DeliveryReport,
    pub content: Option<BulkOutcome>,
}

impl RunReport {
    pub fn new(run_id: String, started_at: DateTime<Utc>) -> Self {
        RunReport {
            run_id,
            started_at,
            finished_at: None,
            status: RunStatus::NoData,
            extracted: 0,
            unique: 0,
            transformed: 0,
            metadata_built: 0,
            content_built: 0,
            transform_failures: Vec::new(),
            metadata: DeliveryReport::default(),
            content: None,
        }
    }

    pub fn duplicates(&self) -> usize {
        self.extracted.saturating_sub(self.unique)
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
        let failed = |kind: ProjectionKind| {
            self.transform_failures
                .iter()
                .filter(|f| f.kind == kind)
                .count()
        };
        info!(
            run_id = %self.run_id,
            status = ?self.status,
            extracted = self.extracted,
            duplicates = self.duplicates(),
            metadata_built = self.metadata_built,
            content_built = self.content_built,
            metadata_failures = failed(ProjectionKind::Metadata),
            content_failures = failed(ProjectionKind::Content),
            metadata_delivered = self.metadata.delivered(),
            content = ?self.content,
            "Pipeline run finished"
        );
    }

    /// Plain-text summary for the CLI.
    pub fn summary_lines(&self) -> Vec<String> {
        let took = self
            .finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
            .unwrap_or_default();
        let mut lines = vec![
            format!(
                "Run:        {} ({:?}), started {} UTC, took {:.1}s",
                self.run_id,
                self.status,
                self.started_at.format("%Y-%m-%d %H:%M:%S"),
                took
            ),
            format!(
                "Extracted:  {} ({} duplicates dropped)",
                self.extracted,
                self.duplicates()
            ),
        ];
        if self.status == RunStatus::NoData {
            return lines;
        }
        lines.push(format!(
            "Transform:  {} records -> {} metadata, {} content, {} failures",
            self.transformed,
            self.metadata_built,
            self.content_built,
            self.transform_failures.len()
        ));
        for f in &self.transform_failures {
            lines.push(format!(
                "  - record {} (#{}) {}: {}",
                f.record_id,
                f.position + 1,
                f.kind,
                f.error
            ));
        }
        if self.status == RunStatus::DryRun {
            return lines;
        }
        lines.push(format!(
            "Metadata:   {} delivered, {} rejected, {} failed, {} pauses",
            self.metadata.delivered(),
            self.metadata.rejected(),
            self.metadata.failed(),
            self.metadata.pauses
        ));
        for d in &self.metadata.deliveries {
            let detail = match &d.outcome {
                DeliveryOutcome::Delivered { .. } => continue,
                DeliveryOutcome::Rejected { body, .. } => truncate_body(body),
                DeliveryOutcome::Failed { reason } => reason.clone(),
            };
            let status = d
                .outcome
                .status()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            lines.push(format!("  - record {} [{}] {}", d.record_id, status, detail));
        }
        let content = match &self.content {
            Some(BulkOutcome::Inserted { count }) => format!("{} inserted", count),
            Some(BulkOutcome::Failed { reason }) => format!("failed ({})", reason),
            Some(BulkOutcome::Skipped) | None => "nothing to load".to_string(),
        };
        lines.push(format!("Content:    {}", content));
        lines
    }
}

fn truncate_body(body: &str) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= 80 {
        flat
    } else {
        format!("{}...", flat.chars().take(80).collect::<String>())
    }
}

pub fn new_run_id(now: DateTime<Utc>) -> String {
    format!("run-{}", now.format("%Y%m%dT%H%M%SZ"))
}
