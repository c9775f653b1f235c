//! Fakes for the pipeline seams, shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{SinkError, SourceError};
use crate::extract::{Sleeper, Source};
use crate::load::{ContentSink, MetadataSink, SinkResponse};
use crate::record::{ContentProjection, MetadataProjection, RawRecord};

/// Runtime that only hosts wiremock servers; the code under test stays blocking.
pub fn mock_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

#[derive(Default)]
pub struct RecordingSleeper {
    pauses: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.borrow().clone()
    }

    pub fn total(&self) -> Duration {
        self.pauses.borrow().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) {
        self.pauses.borrow_mut().push(delay);
    }
}

/// Replays a fixed list of fetch results, then either keeps failing or
/// returns nothing.
pub struct ScriptedSource {
    script: RefCell<VecDeque<Result<Vec<RawRecord>, SourceError>>>,
    keep_failing: bool,
    calls: Cell<u32>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<RawRecord>, SourceError>>) -> Self {
        ScriptedSource {
            script: RefCell::new(script.into()),
            keep_failing: false,
            calls: Cell::new(0),
        }
    }

    pub fn always_failing() -> Self {
        ScriptedSource {
            keep_failing: true,
            ..ScriptedSource::new(Vec::new())
        }
    }

    pub fn unavailable() -> SourceError {
        SourceError::Status {
            endpoint: "test://source".into(),
            status: 503,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl Source for ScriptedSource {
    fn endpoint(&self) -> &str {
        "test://source"
    }

    fn fetch(&self) -> Result<Vec<RawRecord>, SourceError> {
        self.calls.set(self.calls.get() + 1);
        match self.script.borrow_mut().pop_front() {
            Some(result) => result,
            None if self.keep_failing => Err(Self::unavailable()),
            None => Ok(Vec::new()),
        }
    }
}

/// Answers each post with the next scripted status (201 once the script runs out).
#[derive(Default)]
pub struct RecordingMetadataSink {
    statuses: RefCell<VecDeque<u16>>,
    pub posted: RefCell<Vec<MetadataProjection>>,
}

impl RecordingMetadataSink {
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn with_statuses(statuses: Vec<u16>) -> Self {
        RecordingMetadataSink {
            statuses: RefCell::new(statuses.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.posted.borrow().len()
    }
}

impl MetadataSink for RecordingMetadataSink {
    fn endpoint(&self) -> &str {
        "test://metadata"
    }

    fn post(&self, projection: &MetadataProjection) -> Result<SinkResponse, SinkError> {
        self.posted.borrow_mut().push(projection.clone());
        let status = self.statuses.borrow_mut().pop_front().unwrap_or(201);
        Ok(SinkResponse {
            status,
            body: String::new(),
        })
    }
}

#[derive(Default)]
pub struct MemoryContentSink {
    pub batches: Vec<Vec<ContentProjection>>,
}

impl ContentSink for MemoryContentSink {
    fn target(&self) -> &str {
        "memory"
    }

    fn insert_many(&mut self, documents: &[ContentProjection]) -> Result<usize, SinkError> {
        self.batches.push(documents.to_vec());
        Ok(documents.len())
    }
}

pub struct FailingContentSink;

impl ContentSink for FailingContentSink {
    fn target(&self) -> &str {
        "failing"
    }

    fn insert_many(&mut self, _documents: &[ContentProjection]) -> Result<usize, SinkError> {
        Err(SinkError::Store(rusqlite::Error::InvalidQuery))
    }
}
