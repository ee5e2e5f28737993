//! Writes the job's info file.

use super::{Stage, StageOutcome};
use crate::errors::ArchiveflowError;
use crate::item::{InfoRecord, WorkItem};
use async_trait::async_trait;

/// Serializes an [`InfoRecord`] to the source info file.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteInfo;

impl WriteInfo {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for WriteInfo {
    fn name(&self) -> &str {
        "WriteInfo"
    }

    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        let path = item.require_paths(self.name())?.source_info_file.clone();
        let json = InfoRecord::from_item(item).to_json()?;

        tokio::fs::write(&path, json).await?;
        Ok(StageOutcome::Complete)
    }
}
