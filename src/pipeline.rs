use chrono::Utc;
use tracing::{info, warn};

use crate::dedupe::deduplicate;
use crate::extract::{extract, RetryPolicy, Sleeper, Source};
use crate::load::{load_content, load_metadata, ContentSink, MetadataSink, PacingPolicy};
use crate::record::RawRecord;
use crate::report::{RunReport, RunStatus};
use crate::transform::transform;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop after transform; neither sink is touched.
    pub dry_run: bool,
    /// Keep only the first N unique records.
    pub limit: Option<usize>,
}

/// Clients and policies for one run. Everything is borrowed from the caller,
/// so connections live exactly as long as the run that uses them.
pub struct Pipeline<'a> {
    pub source: &'a dyn Source,
    pub metadata_sink: &'a dyn MetadataSink,
    pub content_sink: &'a mut dyn ContentSink,
    pub retry: RetryPolicy,
    pub pacing: PacingPolicy,
    pub sleeper: &'a dyn Sleeper,
}

/// Extract with retry, then drop repeated identifiers. Returns the raw count
/// alongside the unique records.
pub fn extract_unique(
    source: &dyn Source,
    retry: &RetryPolicy,
    sleeper: &dyn Sleeper,
) -> (usize, Vec<RawRecord>) {
    let records = extract(source, retry, sleeper);
    let extracted = records.len();
    let unique = deduplicate(records);
    if unique.len() < extracted {
        info!(
            extracted,
            unique = unique.len(),
            dropped = extracted - unique.len(),
            "Dropped duplicate records"
        );
    }
    (extracted, unique)
}

impl Pipeline<'_> {
    /// extract -> dedupe -> transform -> load metadata -> load content.
    /// Stage failures are recorded in the report, never returned.
    pub fn run(&mut self, run_id: String, options: &RunOptions) -> RunReport {
        let mut report = RunReport::new(run_id, Utc::now());
        info!(run_id = %report.run_id, dry_run = options.dry_run, limit = ?options.limit, "Starting pipeline run");

        let (extracted, mut records) = extract_unique(self.source, &self.retry, self.sleeper);
        report.extracted = extracted;
        report.unique = records.len();
        if records.is_empty() {
            warn!(endpoint = self.source.endpoint(), "No data extracted. Exiting pipeline.");
            report.finish(RunStatus::NoData);
            return report;
        }

        if let Some(limit) = options.limit {
            if records.len() > limit {
                info!(limit, available = records.len(), "Truncating to record limit");
                records.truncate(limit);
            }
        }

        let transformed = transform(&records);
        report.transformed = records.len();
        report.metadata_built = transformed.metadata.len();
        report.content_built = transformed.content.len();
        report.transform_failures = transformed.failures;

        if options.dry_run {
            info!("Dry run, skipping both loaders");
            report.finish(RunStatus::DryRun);
            return report;
        }

        report.metadata = load_metadata(
            self.metadata_sink,
            &transformed.metadata,
            &self.pacing,
            self.sleeper,
        );
        report.content = Some(load_content(&mut *self.content_sink, &transformed.content));

        report.finish(RunStatus::Completed);
        report
    }
}
