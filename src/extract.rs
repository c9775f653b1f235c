use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{json_kind, SourceError};
use crate::record::RawRecord;

/// Anything that can hand over the raw record collection in one read.
pub trait Source {
    fn endpoint(&self) -> &str;
    fn fetch(&self) -> Result<Vec<RawRecord>, SourceError>;
}

/// Blocking pause between attempts. Swapped out in tests so no real time passes.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Pause taken after attempt `attempt` (0-indexed) fails:
    /// `min(base_delay * 2^attempt, max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
        }
    }
}

/// GET against the configured source endpoint.
pub struct HttpSource {
    client: Client,
    endpoint: String,
}

impl HttpSource {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        HttpSource {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl Source for HttpSource {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn fetch(&self) -> Result<Vec<RawRecord>, SourceError> {
        let transport = |source| SourceError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        };
        let response = self.client.get(&self.endpoint).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }
        let body = response.text().map_err(transport)?;
        decode_records(&self.endpoint, &body)
    }
}

/// An empty body or a JSON `null` reads as "no records".
fn decode_records(endpoint: &str, body: &str) -> Result<Vec<RawRecord>, SourceError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let payload = |reason: String| SourceError::Payload {
        endpoint: endpoint.to_string(),
        reason,
    };
    match serde_json::from_str::<Value>(body).map_err(|e| payload(e.to_string()))? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.into_iter().map(RawRecord::new).collect()),
        other => Err(payload(format!("found a JSON {}", json_kind(&other)))),
    }
}

/// Read the record collection, retrying transient failures with backoff.
/// Exhausted retries degrade to an empty sequence, same as an empty source.
pub fn extract(source: &dyn Source, policy: &RetryPolicy, sleeper: &dyn Sleeper) -> Vec<RawRecord> {
    let endpoint = source.endpoint();
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 0..max_attempts {
        debug!(endpoint, attempt = attempt + 1, max_attempts, "Fetching source records");
        match source.fetch() {
            Ok(records) => {
                info!(
                    endpoint,
                    attempt = attempt + 1,
                    records = records.len(),
                    "Data extraction successful"
                );
                return records;
            }
            Err(e) if !e.is_retryable() => {
                error!(endpoint, attempt = attempt + 1, error = %e, "Source payload rejected, not retrying");
                return Vec::new();
            }
            Err(e) => {
                if attempt + 1 == max_attempts {
                    warn!(endpoint, attempt = attempt + 1, max_attempts, error = %e, "Source fetch failed");
                    break;
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    endpoint,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Source fetch failed, backing off"
                );
                sleeper.sleep(delay);
            }
        }
    }

    error!(endpoint, attempts = max_attempts, "Data extraction failed after all attempts");
    Vec::new()
}
