use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use tracing::{error, info, warn};

use crate::error::SinkError;
use crate::extract::Sleeper;
use crate::record::{ContentProjection, MetadataProjection, RecordKey};

/// Status and body of one metadata write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkResponse {
    pub status: u16,
    pub body: String,
}

impl SinkResponse {
    pub fn accepted(&self) -> bool {
        self.status == 200 || self.status == 201
    }
}

/// Receives metadata projections one at a time.
pub trait MetadataSink {
    fn endpoint(&self) -> &str;
    fn post(&self, projection: &MetadataProjection) -> Result<SinkResponse, SinkError>;
}

/// Receives the whole content batch in one call.
pub trait ContentSink {
    /// Human-readable destination, used in log lines.
    fn target(&self) -> &str;
    fn insert_many(&mut self, documents: &[ContentProjection]) -> Result<usize, SinkError>;
}

/// POSTs each projection as a JSON body to the metadata table API.
pub struct HttpMetadataSink {
    client: Client,
    endpoint: String,
}

impl HttpMetadataSink {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        HttpMetadataSink {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl MetadataSink for HttpMetadataSink {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn post(&self, projection: &MetadataProjection) -> Result<SinkResponse, SinkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(projection)
            .send()
            .map_err(|source| SinkError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        Ok(SinkResponse { status, body })
    }
}

/// Fixed pause after every `batch_size` deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingPolicy {
    pub batch_size: usize,
    pub delay: Duration,
}

impl PacingPolicy {
    /// Pause due before delivering the record at 0-indexed `index`: one after
    /// each full batch, never before the first record.
    pub fn pause_before(&self, index: usize) -> Option<Duration> {
        if self.batch_size == 0 || index == 0 || index % self.batch_size != 0 {
            None
        } else {
            Some(self.delay)
        }
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        PacingPolicy {
            batch_size: 10,
            delay: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { status: u16 },
    Rejected { status: u16, body: String },
    Failed { reason: String },
}

impl DeliveryOutcome {
    /// HTTP status the sink answered with, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryOutcome::Delivered { status } | DeliveryOutcome::Rejected { status, .. } => {
                Some(*status)
            }
            DeliveryOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDelivery {
    pub record_id: RecordKey,
    pub outcome: DeliveryOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub deliveries: Vec<RecordDelivery>,
    pub pauses: usize,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::Delivered { .. }))
    }

    pub fn rejected(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::Rejected { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::Failed { .. }))
    }

    fn count(&self, f: impl Fn(&DeliveryOutcome) -> bool) -> usize {
        self.deliveries.iter().filter(|d| f(&d.outcome)).count()
    }
}

/// Deliver metadata projections one by one. A rejected or failed record is
/// logged and skipped; the loop always reaches the end of the sequence.
pub fn load_metadata(
    sink: &dyn MetadataSink,
    projections: &[MetadataProjection],
    pacing: &PacingPolicy,
    sleeper: &dyn Sleeper,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    let endpoint = sink.endpoint();

    let pb = ProgressBar::new(projections.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} metadata ({per_sec})")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    for (index, projection) in projections.iter().enumerate() {
        if let Some(delay) = pacing.pause_before(index) {
            info!(
                delivered = index,
                delay_ms = delay.as_millis() as u64,
                "Pacing metadata delivery"
            );
            sleeper.sleep(delay);
            report.pauses += 1;
        }

        let record_id = projection.key();
        let outcome = match sink.post(projection) {
            Ok(response) if response.accepted() => {
                info!(record_id = %record_id, status = response.status, "Metadata loaded");
                DeliveryOutcome::Delivered {
                    status: response.status,
                }
            }
            Ok(response) => {
                warn!(
                    record_id = %record_id,
                    endpoint,
                    status = response.status,
                    body = %response.body,
                    "Failed to load metadata"
                );
                DeliveryOutcome::Rejected {
                    status: response.status,
                    body: response.body,
                }
            }
            Err(e) => {
                error!(record_id = %record_id, endpoint, error = %e, "Error loading metadata");
                DeliveryOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        report.deliveries.push(RecordDelivery { record_id, outcome });
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        endpoint,
        delivered = report.delivered(),
        rejected = report.rejected(),
        failed = report.failed(),
        pauses = report.pauses,
        "Metadata delivery finished"
    );
    report
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    Inserted { count: usize },
    Failed { reason: String },
    /// Nothing to write; the sink was not called.
    Skipped,
}

/// One bulk write carrying every content projection. No retry and no partial
/// recovery: the batch either lands or is reported lost.
pub fn load_content(sink: &mut dyn ContentSink, projections: &[ContentProjection]) -> BulkOutcome {
    if projections.is_empty() {
        info!(sink = sink.target(), "No content documents to load");
        return BulkOutcome::Skipped;
    }
    match sink.insert_many(projections) {
        Ok(count) => {
            info!(sink = sink.target(), count, "Content documents loaded");
            BulkOutcome::Inserted { count }
        }
        Err(e) => {
            error!(
                sink = sink.target(),
                documents = projections.len(),
                error = %e,
                "Error loading content documents"
            );
            BulkOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}
