//! Moves finished artifacts into the data directory.

use super::{Stage, StageOutcome};
use crate::errors::ArchiveflowError;
use crate::item::WorkItem;
use async_trait::async_trait;
use tracing::debug;

/// Renames the WARC and info files to their targets and removes the
/// working directory.
///
/// Both renames must stay on one filesystem. A failure of either is fatal
/// for the item; nothing is rolled back.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveFiles;

impl MoveFiles {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for MoveFiles {
    fn name(&self) -> &str {
        "MoveFiles"
    }

    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        let paths = item.require_paths(self.name())?;

        tokio::fs::rename(&paths.source_warc_file, &paths.target.warc_file).await?;
        tokio::fs::rename(&paths.source_info_file, &paths.target.info_file).await?;
        tokio::fs::remove_dir_all(&paths.item_dir).await?;

        debug!(
            warc = %paths.target.warc_file.display(),
            info = %paths.target.info_file.display(),
            "Artifacts moved"
        );
        Ok(StageOutcome::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{derive_paths, ItemPaths};
    use crate::utils::now_utc;
    use std::path::Path;

    fn prepared(data_dir: &Path) -> WorkItem {
        let mut item = WorkItem::new();
        let paths: ItemPaths = derive_paths(data_dir, "abc123", "example", &now_utc());
        std::fs::create_dir_all(&paths.item_dir).unwrap();
        item.paths = Some(paths);
        item
    }

    #[tokio::test]
    async fn test_moves_both_files_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = prepared(dir.path());
        let paths = item.paths.clone().unwrap();
        std::fs::write(&paths.source_warc_file, b"WARC/1.0").unwrap();
        std::fs::write(&paths.source_info_file, b"{}").unwrap();
        std::fs::write(&paths.cookie_jar, b"").unwrap();

        MoveFiles::new().process(&mut item).await.unwrap();

        assert_eq!(std::fs::read(&paths.target.warc_file).unwrap(), b"WARC/1.0");
        assert_eq!(std::fs::read(&paths.target.info_file).unwrap(), b"{}");
        assert!(!paths.item_dir.exists());
    }

    #[tokio::test]
    async fn test_missing_warc_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = prepared(dir.path());
        let paths = item.paths.clone().unwrap();
        std::fs::write(&paths.source_info_file, b"{}").unwrap();

        let err = MoveFiles::new().process(&mut item).await.unwrap_err();

        assert_eq!(err.kind(), "io");
        assert!(paths.source_info_file.exists());
    }

    #[tokio::test]
    async fn test_missing_info_after_warc_moved_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = prepared(dir.path());
        let paths = item.paths.clone().unwrap();
        std::fs::write(&paths.source_warc_file, b"WARC/1.0").unwrap();

        let err = MoveFiles::new().process(&mut item).await.unwrap_err();

        assert_eq!(err.kind(), "io");
        assert!(paths.target.warc_file.exists());
        assert!(paths.item_dir.exists());
    }
}
