//! Stage trait and the job-processing stages.
//!
//! A stage is either *simple* (no retry policy: it completes or fails) or
//! *retryable* (it has a [`RetryPolicy`] and may answer
//! [`StageOutcome::Retry`] when the control service is unreachable). The
//! pipeline owns the retry loop; stages only report what happened.

mod fetch_depth;
mod heartbeat;
mod move_files;
mod prepare_paths;
mod relabel;
mod report;
mod reserve;
mod write_info;

pub use fetch_depth::SetFetchDepth;
pub use heartbeat::{StartHeartbeat, StopHeartbeat};
pub use move_files::MoveFiles;
pub use prepare_paths::PreparePaths;
pub use relabel::RelabelIfAborted;
pub use report::{MarkItemAsDone, SetWarcFileSize, DEFAULT_JOB_EXPIRY};
pub use reserve::ReserveJob;
pub use write_info::WriteInfo;

use crate::errors::{ArchiveflowError, ControlError};
use crate::item::WorkItem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

/// Default delay before a retryable stage runs again.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Retry policy of a retryable stage. Fixed for the stage's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the stage is re-invoked.
    pub retry_delay: Duration,
    /// Whether the item may be canceled while waiting.
    pub cancelable: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            cancelable: false,
        }
    }
}

impl RetryPolicy {
    /// Creates a non-cancelable policy with the given delay.
    #[must_use]
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            retry_delay,
            cancelable: false,
        }
    }

    /// Marks waits under this policy as cancelable.
    #[must_use]
    pub fn cancelable(mut self) -> Self {
        self.cancelable = true;
        self
    }
}

/// Why a stage asked to be re-invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    /// The control service could not be reached.
    ConnectionLost(String),
    /// The queue had nothing for us.
    NoJobAvailable,
}

impl RetryReason {
    /// The operator-facing notice, or `None` for routine waits.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        match self {
            Self::ConnectionLost(detail) if detail.is_empty() => {
                Some("Lost connection to control service".to_string())
            }
            Self::ConnectionLost(detail) => {
                Some(format!("Lost connection to control service ({detail})"))
            }
            Self::NoJobAvailable => None,
        }
    }

    /// Short label for events.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConnectionLost(_) => "connection_lost",
            Self::NoJobAvailable => "no_job_available",
        }
    }
}

/// Result of one `process` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Hand the item to the next stage.
    Complete,
    /// Run this stage again after the retry delay.
    Retry(RetryReason),
}

impl StageOutcome {
    /// Maps a control failure to a retry if it is recoverable.
    ///
    /// # Errors
    ///
    /// Returns the error unchanged unless it is a connection loss.
    pub fn from_control_error(err: ControlError) -> Result<Self, ArchiveflowError> {
        match err {
            ControlError::ConnectionLost(detail) => Ok(Self::Retry(RetryReason::ConnectionLost(detail))),
            other => Err(other.into()),
        }
    }

    /// Returns true if the stage completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// The retry policy, or `None` for a simple stage.
    fn retry_policy(&self) -> Option<RetryPolicy> {
        None
    }

    /// Marks the item as being in this stage.
    fn start(&self, item: &mut WorkItem) {
        item.enter_stage(self.name());
    }

    /// Does the stage's work.
    ///
    /// May be called again on the same item after a [`StageOutcome::Retry`],
    /// so anything done before the retry decision must be safe to repeat.
    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError>;
}

/// A simple stage backed by a synchronous closure.
pub struct FnStage<F>
where
    F: Fn(&mut WorkItem) -> Result<StageOutcome, ArchiveflowError> + Send + Sync,
{
    name: String,
    policy: Option<RetryPolicy>,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&mut WorkItem) -> Result<StageOutcome, ArchiveflowError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            policy: None,
            func,
        }
    }

    /// Makes the stage retryable.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&mut WorkItem) -> Result<StageOutcome, ArchiveflowError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&mut WorkItem) -> Result<StageOutcome, ArchiveflowError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        self.policy
    }

    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        (self.func)(item)
    }
}
