use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::extract::RetryPolicy;
use crate::load::PacingPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub source: SourceSettings,
    pub metadata: MetadataSettings,
    pub content: ContentSettings,
    pub retry: RetrySettings,
    pub pacing: PacingSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataSettings {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentSettings {
    pub db_path: PathBuf,
    pub collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacingSettings {
    pub batch_size: usize,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
    pub dir: PathBuf,
    pub file: String,
}

impl Settings {
    /// Defaults, then `leaves.toml` (or the given file), then `LEAVES_*`
    /// environment variables with `__` between nested keys.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let builder = Config::builder()
            .set_default("source.url", "http://127.0.0.1:5000/cassandra-leaves")?
            .set_default("source.timeout_secs", 30)?
            .set_default("metadata.url", "http://127.0.0.1:8080/api/cassandra_leaves")?
            .set_default("metadata.timeout_secs", 30)?
            .set_default("content.db_path", "data/leaves.sqlite")?
            .set_default("content.collection", "useful_data")?
            .set_default("retry.max_attempts", 5)?
            .set_default("retry.base_delay_ms", 1000)?
            .set_default("retry.max_delay_ms", 32000)?
            .set_default("pacing.batch_size", 10)?
            .set_default("pacing.delay_ms", 20000)?
            .set_default("log.level", "info")?
            .set_default("log.dir", "logs")?
            .set_default("log.file", "etl_pipeline.log")?;

        let builder = match path {
            Some(p) => builder.add_source(File::from(p).required(true)),
            None => builder.add_source(File::with_name("leaves").required(false)),
        };

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("LEAVES")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.source.url.trim().is_empty(), "source.url must not be empty");
        ensure!(!self.metadata.url.trim().is_empty(), "metadata.url must not be empty");
        ensure!(
            !self.content.collection.trim().is_empty(),
            "content.collection must not be empty"
        );
        ensure!(self.retry.max_attempts >= 1, "retry.max_attempts must be at least 1");
        ensure!(
            self.retry.base_delay_ms <= self.retry.max_delay_ms,
            "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
            self.retry.base_delay_ms,
            self.retry.max_delay_ms
        );
        ensure!(self.pacing.batch_size >= 1, "pacing.batch_size must be at least 1");
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    pub fn pacing_policy(&self) -> PacingPolicy {
        PacingPolicy {
            batch_size: self.pacing.batch_size,
            delay: Duration::from_millis(self.pacing.delay_ms),
        }
    }
}
