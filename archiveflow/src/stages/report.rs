//! Final reports to the control service.

use super::{RetryPolicy, Stage, StageOutcome, DEFAULT_RETRY_DELAY};
use crate::control::ControlClient;
use crate::errors::ArchiveflowError;
use crate::item::WorkItem;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Default lifetime of a finished job's record: 48 hours.
pub const DEFAULT_JOB_EXPIRY: Duration = Duration::from_secs(48 * 60 * 60);

/// Reports the size of the finished WARC to the control service.
pub struct SetWarcFileSize {
    control: Arc<dyn ControlClient>,
    policy: RetryPolicy,
}

impl SetWarcFileSize {
    /// Creates the stage with the default retry delay.
    #[must_use]
    pub fn new(control: Arc<dyn ControlClient>) -> Self {
        Self::with_retry_delay(control, DEFAULT_RETRY_DELAY)
    }

    /// Creates the stage with an explicit retry delay.
    #[must_use]
    pub fn with_retry_delay(control: Arc<dyn ControlClient>, retry_delay: Duration) -> Self {
        Self {
            control,
            policy: RetryPolicy::new(retry_delay),
        }
    }
}

impl std::fmt::Debug for SetWarcFileSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetWarcFileSize")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for SetWarcFileSize {
    fn name(&self) -> &str {
        "SetWarcFileSize"
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        Some(self.policy)
    }

    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        let ident = item.require_ident(self.name())?;
        let warc = &item.require_paths(self.name())?.target.warc_file;

        match self.control.set_warc_size(ident, warc).await {
            Ok(()) => Ok(StageOutcome::Complete),
            Err(e) => StageOutcome::from_control_error(e),
        }
    }
}

/// Marks the job done with an expiry.
pub struct MarkItemAsDone {
    control: Arc<dyn ControlClient>,
    expire: Duration,
    policy: RetryPolicy,
}

impl MarkItemAsDone {
    /// Creates the stage with the default retry delay.
    #[must_use]
    pub fn new(control: Arc<dyn ControlClient>, expire: Duration) -> Self {
        Self::with_retry_delay(control, expire, DEFAULT_RETRY_DELAY)
    }

    /// Creates the stage with an explicit retry delay.
    #[must_use]
    pub fn with_retry_delay(
        control: Arc<dyn ControlClient>,
        expire: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            control,
            expire,
            policy: RetryPolicy::new(retry_delay),
        }
    }

    /// How long the control service keeps the finished job's record.
    #[must_use]
    pub fn expire(&self) -> Duration {
        self.expire
    }
}

impl std::fmt::Debug for MarkItemAsDone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkItemAsDone")
            .field("expire", &self.expire)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for MarkItemAsDone {
    fn name(&self) -> &str {
        "MarkItemAsDone"
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        Some(self.policy)
    }

    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        item.require_ident(self.name())?;

        match self.control.mark_done(item, self.expire).await {
            Ok(()) => Ok(StageOutcome::Complete),
            Err(e) => StageOutcome::from_control_error(e),
        }
    }
}
