//! Translates the job's fetch depth into fetch tool options.

use super::{Stage, StageOutcome};
use crate::errors::ArchiveflowError;
use crate::item::{FetchOptions, WorkItem};
use async_trait::async_trait;

/// Sets `recursive`, `level` and `depth` from `fetch_depth`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetFetchDepth;

impl SetFetchDepth {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for SetFetchDepth {
    fn name(&self) -> &str {
        "SetFetchDepth"
    }

    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        let depth = item
            .job
            .fetch_depth
            .as_deref()
            .ok_or_else(|| ArchiveflowError::missing(self.name(), "fetch_depth"))?;

        item.fetch_options = Some(FetchOptions::from_depth(depth));
        Ok(StageOutcome::Complete)
    }
}
