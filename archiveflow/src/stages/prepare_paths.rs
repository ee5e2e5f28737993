//! Creates the job's working directory and derives every artifact path.

use super::{Stage, StageOutcome};
use crate::errors::ArchiveflowError;
use crate::item::{check_path_component, derive_paths, WorkItem};
use crate::utils::{system_clock, Clock};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resets `<data_dir>/<ident>` and fills in [`ItemPaths`](crate::item::ItemPaths).
///
/// An existing working directory is destroyed, not reused: whatever a
/// previous attempt at the same job left there is garbage.
///
/// The `YYYYMMDD-HHMMSS` stamp in artifact names is the clock's time in UTC.
/// A slug that would turn the base file name into anything other than a
/// single file name fails the item before anything is touched on disk.
pub struct PreparePaths {
    data_dir: PathBuf,
    clock: Clock,
}

impl PreparePaths {
    /// Creates the stage using the system clock.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(data_dir, system_clock())
    }

    /// Creates the stage with an explicit clock.
    #[must_use]
    pub fn with_clock(data_dir: impl Into<PathBuf>, clock: Clock) -> Self {
        Self {
            data_dir: data_dir.into(),
            clock,
        }
    }

    /// Root of all job directories and finished artifacts.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl std::fmt::Debug for PreparePaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparePaths")
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for PreparePaths {
    fn name(&self) -> &str {
        "PreparePaths"
    }

    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        let ident = item.require_ident(self.name())?;
        let slug = item
            .job
            .slug
            .as_deref()
            .ok_or_else(|| ArchiveflowError::missing(self.name(), "slug"))?;

        let paths = derive_paths(&self.data_dir, ident, slug, &(self.clock)());
        check_path_component("warc_file_base", &paths.warc_file_base)?;

        if tokio::fs::metadata(&paths.item_dir).await.is_ok_and(|m| m.is_dir()) {
            debug!(dir = %paths.item_dir.display(), "Removing stale working directory");
            tokio::fs::remove_dir_all(&paths.item_dir).await?;
        }
        tokio::fs::create_dir_all(&paths.item_dir).await?;

        item.paths = Some(paths);
        Ok(StageOutcome::Complete)
    }
}
