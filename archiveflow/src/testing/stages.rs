//! Stand-in stages for tests.

use crate::errors::ArchiveflowError;
use crate::item::WorkItem;
use crate::stages::{RetryPolicy, RetryReason, Stage, StageOutcome};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;

/// Plays the part of the fetch step: writes a fixed body to the item's
/// source WARC file.
#[derive(Debug, Clone)]
pub struct WriteWarcStage {
    name: String,
    body: Vec<u8>,
}

impl WriteWarcStage {
    /// Creates the stage with a small placeholder body.
    #[must_use]
    pub fn new() -> Self {
        Self::with_body(b"WARC/1.0\r\n\r\n".to_vec())
    }

    /// Creates the stage writing `body`.
    #[must_use]
    pub fn with_body(body: Vec<u8>) -> Self {
        Self {
            name: "WriteWarc".to_string(),
            body,
        }
    }

    /// Length of the body this stage writes.
    #[must_use]
    pub fn body_len(&self) -> u64 {
        self.body.len() as u64
    }
}

impl Default for WriteWarcStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for WriteWarcStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        let path = item.require_paths(&self.name)?.source_warc_file.clone();
        tokio::fs::write(&path, &self.body).await?;
        item.log_output(format!("Wrote {} bytes to {}", self.body.len(), path.display()));
        Ok(StageOutcome::Complete)
    }
}

/// One scripted answer of a [`ScriptedStage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Answer `Complete`.
    Complete,
    /// Answer `Retry` with the given reason.
    Retry(RetryReason),
    /// Fail with an I/O error carrying this message.
    Fail(String),
}

/// A stage that answers from a script and counts its invocations.
///
/// Once the script runs dry every call completes.
#[derive(Debug)]
pub struct ScriptedStage {
    name: String,
    policy: Option<RetryPolicy>,
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<usize>,
}

impl ScriptedStage {
    /// Creates a simple stage with an empty script.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: None,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(0),
        }
    }

    /// Creates a retryable stage with an empty script.
    #[must_use]
    pub fn retryable(name: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            policy: Some(policy),
            ..Self::new(name)
        }
    }

    /// Appends steps to the script.
    #[must_use]
    pub fn then(self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.script.lock().extend(steps);
        self
    }

    /// Number of `process` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        self.policy
    }

    async fn process(&self, _item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        *self.calls.lock() += 1;
        let step = self.script.lock().pop_front().unwrap_or(Step::Complete);

        match step {
            Step::Complete => Ok(StageOutcome::Complete),
            Step::Retry(reason) => Ok(StageOutcome::Retry(reason)),
            Step::Fail(message) => Err(io::Error::new(io::ErrorKind::Other, message).into()),
        }
    }
}
