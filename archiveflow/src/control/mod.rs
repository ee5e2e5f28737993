//! Interface to the control service that owns the job queue.
//!
//! The control service keeps the pending-job queue, the abort flags and the
//! liveness records. This crate only consumes it through [`ControlClient`];
//! the storage behind it is somebody else's concern.

use crate::errors::ControlError;
use crate::item::WorkItem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Job attributes as handed out by the queue.
///
/// Every field is optional on the wire. Stages that need a field fail the
/// item when it is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDescriptor {
    /// Requested fetch depth, or `"shallow"`.
    pub fetch_depth: Option<String>,
    /// Key of the job's log stream.
    pub log_key: Option<String>,
    /// When the job was queued. Passed through verbatim.
    pub queued_at: Option<serde_json::Value>,
    /// Human-readable job name used in file names.
    pub slug: Option<String>,
    /// Who queued the job.
    pub started_by: Option<String>,
    /// Where the job was queued from.
    pub started_in: Option<String>,
    /// Seed URL.
    pub url: Option<String>,
}

/// A job claimed from the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservedJob {
    /// Opaque job identifier.
    pub ident: String,
    /// The job's attributes.
    pub descriptor: JobDescriptor,
}

impl ReservedJob {
    /// Creates a reserved job.
    #[must_use]
    pub fn new(ident: impl Into<String>, descriptor: JobDescriptor) -> Self {
        Self {
            ident: ident.into(),
            descriptor,
        }
    }
}

/// Operations the pipeline needs from the control service.
///
/// Every operation may fail with [`ControlError::ConnectionLost`], which
/// retryable stages recover from. Any other error is fatal for the item.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlClient: Send + Sync {
    /// Claims the next job queued for `pipeline_id`, or `None` if the queue is empty.
    async fn reserve_job(&self, pipeline_id: &str) -> Result<Option<ReservedJob>, ControlError>;

    /// Returns whether the job has been flagged for abort.
    async fn is_aborted(&self, ident: &str) -> Result<bool, ControlError>;

    /// Reports that this worker is still processing the job.
    async fn heartbeat(&self, ident: &str) -> Result<(), ControlError>;

    /// Records the size of the finished WARC file at `path`.
    async fn set_warc_size(&self, ident: &str, path: &Path) -> Result<(), ControlError>;

    /// Marks the job done; the job record expires after `expire`.
    async fn mark_done(&self, item: &WorkItem, expire: Duration) -> Result<(), ControlError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_missing_fields_default_to_none() {
        let descriptor: JobDescriptor =
            serde_json::from_str(r#"{"slug": "example", "url": "http://x"}"#).unwrap();

        assert_eq!(descriptor.slug.as_deref(), Some("example"));
        assert_eq!(descriptor.url.as_deref(), Some("http://x"));
        assert!(descriptor.fetch_depth.is_none());
        assert!(descriptor.queued_at.is_none());
    }

    #[test]
    fn test_descriptor_keeps_queued_at_verbatim() {
        let descriptor: JobDescriptor =
            serde_json::from_str(r#"{"queued_at": 1394384742}"#).unwrap();
        assert_eq!(descriptor.queued_at, Some(serde_json::json!(1_394_384_742)));
    }

    #[tokio::test]
    async fn test_mock_client_reports_connection_loss() {
        let mut mock = MockControlClient::new();
        mock.expect_is_aborted()
            .returning(|_| Err(ControlError::connection_lost("refused")));

        let err = mock.is_aborted("abc").await.unwrap_err();
        assert!(err.is_connection_lost());
    }
}
