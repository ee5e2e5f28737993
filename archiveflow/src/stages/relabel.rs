//! Renames the job's destination if the job was aborted.

use super::{RetryPolicy, Stage, StageOutcome, DEFAULT_RETRY_DELAY};
use crate::control::ControlClient;
use crate::errors::ArchiveflowError;
use crate::item::WorkItem;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Asks the control service whether the job was aborted and, if so, adds
/// the `-aborted` suffix to the target file names.
pub struct RelabelIfAborted {
    control: Arc<dyn ControlClient>,
    data_dir: PathBuf,
    policy: RetryPolicy,
}

impl RelabelIfAborted {
    /// Creates the stage with the default retry delay.
    #[must_use]
    pub fn new(control: Arc<dyn ControlClient>, data_dir: impl Into<PathBuf>) -> Self {
        Self::with_retry_delay(control, data_dir, DEFAULT_RETRY_DELAY)
    }

    /// Creates the stage with an explicit retry delay.
    #[must_use]
    pub fn with_retry_delay(
        control: Arc<dyn ControlClient>,
        data_dir: impl Into<PathBuf>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            control,
            data_dir: data_dir.into(),
            policy: RetryPolicy::new(retry_delay),
        }
    }
}

impl std::fmt::Debug for RelabelIfAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelabelIfAborted")
            .field("data_dir", &self.data_dir)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for RelabelIfAborted {
    fn name(&self) -> &str {
        "RelabelIfAborted"
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        Some(self.policy)
    }

    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        let ident = item.require_ident(self.name())?;
        let aborted = match self.control.is_aborted(ident).await {
            Ok(aborted) => aborted,
            Err(e) => return StageOutcome::from_control_error(e),
        };

        if aborted {
            let paths = item.require_paths_mut(self.name())?;
            paths.mark_aborted(&self.data_dir);
            let target = paths.target.warc_file.display().to_string();
            item.aborted = true;
            item.log_output(format!("Adjusted target WARC path to {target}"));
        }

        Ok(StageOutcome::Complete)
    }
}
