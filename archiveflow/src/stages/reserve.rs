//! Claims a job from the control service's queue.

use super::{RetryPolicy, RetryReason, Stage, StageOutcome, DEFAULT_RETRY_DELAY};
use crate::control::ControlClient;
use crate::errors::ArchiveflowError;
use crate::item::{JobAttributes, WorkItem};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Polls the queue until it hands out a job.
///
/// This is the only cancelable stage: until a job is claimed nothing is
/// held, so abandoning the wait is safe.
pub struct ReserveJob {
    control: Arc<dyn ControlClient>,
    pipeline_id: String,
    policy: RetryPolicy,
}

impl ReserveJob {
    /// Creates the stage with the default retry delay.
    #[must_use]
    pub fn new(control: Arc<dyn ControlClient>, pipeline_id: impl Into<String>) -> Self {
        Self::with_retry_delay(control, pipeline_id, DEFAULT_RETRY_DELAY)
    }

    /// Creates the stage with an explicit retry delay.
    #[must_use]
    pub fn with_retry_delay(
        control: Arc<dyn ControlClient>,
        pipeline_id: impl Into<String>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            control,
            pipeline_id: pipeline_id.into(),
            policy: RetryPolicy::new(retry_delay).cancelable(),
        }
    }

    /// The pipeline whose queue this stage polls.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }
}

impl std::fmt::Debug for ReserveJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReserveJob")
            .field("pipeline_id", &self.pipeline_id)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for ReserveJob {
    fn name(&self) -> &str {
        "ReserveJob"
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        Some(self.policy)
    }

    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        let reserved = match self.control.reserve_job(&self.pipeline_id).await {
            Ok(Some(reserved)) => reserved,
            Ok(None) => return Ok(StageOutcome::Retry(RetryReason::NoJobAvailable)),
            Err(e) => return StageOutcome::from_control_error(e),
        };

        item.assign_ident(reserved.ident.as_str())?;
        item.job = JobAttributes::from_descriptor(self.pipeline_id.as_str(), reserved.descriptor);
        item.log_output(format!("Received item {}.", reserved.ident));

        Ok(StageOutcome::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{JobDescriptor, MockControlClient, ReservedJob};
    use crate::errors::ControlError;
    use mockall::predicate::eq;

    fn descriptor() -> JobDescriptor {
        JobDescriptor {
            fetch_depth: Some("shallow".into()),
            log_key: Some("log:abc123".into()),
            queued_at: Some(serde_json::json!(1_394_384_742)),
            slug: Some("example".into()),
            started_by: Some("alice".into()),
            started_in: Some("#archive".into()),
            url: Some("http://x".into()),
        }
    }

    #[test]
    fn test_policy_is_cancelable() {
        let stage = ReserveJob::new(Arc::new(MockControlClient::new()), "pipe-1");
        let policy = stage.retry_policy().unwrap();
        assert!(policy.cancelable);
        assert_eq!(policy.retry_delay, DEFAULT_RETRY_DELAY);
        assert_eq!(stage.pipeline_id(), "pipe-1");
    }

    #[tokio::test]
    async fn test_reserved_job_populates_item() {
        let mut mock = MockControlClient::new();
        mock.expect_reserve_job()
            .with(eq("pipe-1"))
            .times(1)
            .returning(|_| Ok(Some(ReservedJob::new("abc123", descriptor()))));
        let stage = ReserveJob::new(Arc::new(mock), "pipe-1");

        let mut item = WorkItem::new();
        let outcome = stage.process(&mut item).await.unwrap();

        assert!(outcome.is_complete());
        assert_eq!(item.ident(), Some("abc123"));
        assert_eq!(item.job.pipeline_id.as_deref(), Some("pipe-1"));
        assert_eq!(item.job.slug.as_deref(), Some("example"));
        assert_eq!(item.job.log_key.as_deref(), Some("log:abc123"));
        assert_eq!(item.job.started_in.as_deref(), Some("#archive"));
        assert_eq!(item.output().last().map(String::as_str), Some("Received item abc123."));
    }

    #[tokio::test]
    async fn test_unsafe_ident_is_fatal() {
        for ident in ["/srv/archive", "..", ""] {
            let mut mock = MockControlClient::new();
            let owned = ident.to_string();
            mock.expect_reserve_job()
                .returning(move |_| Ok(Some(ReservedJob::new(owned.as_str(), descriptor()))));
            let stage = ReserveJob::new(Arc::new(mock), "pipe-1");

            let mut item = WorkItem::new();
            let err = stage.process(&mut item).await.unwrap_err();

            assert_eq!(err.kind(), "invalid_path_component", "{ident:?}");
            assert!(item.ident().is_none());
            assert!(item.job.slug.is_none());
            assert!(item.output().is_empty());
        }
    }

    #[tokio::test]
    async fn test_empty_queue_asks_for_retry() {
        let mut mock = MockControlClient::new();
        mock.expect_reserve_job().returning(|_| Ok(None));
        let stage = ReserveJob::new(Arc::new(mock), "pipe-1");

        let mut item = WorkItem::new();
        let outcome = stage.process(&mut item).await.unwrap();

        assert_eq!(outcome, StageOutcome::Retry(RetryReason::NoJobAvailable));
        assert!(item.ident().is_none());
        assert!(item.output().is_empty());
    }

    #[tokio::test]
    async fn test_connection_loss_asks_for_retry() {
        let mut mock = MockControlClient::new();
        mock.expect_reserve_job()
            .returning(|_| Err(ControlError::connection_lost("refused")));
        let stage = ReserveJob::new(Arc::new(mock), "pipe-1");

        let outcome = stage.process(&mut WorkItem::new()).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Retry(RetryReason::ConnectionLost(_))));
    }

    #[tokio::test]
    async fn test_rejection_is_fatal() {
        let mut mock = MockControlClient::new();
        mock.expect_reserve_job()
            .returning(|_| Err(ControlError::rejected("unknown pipeline")));
        let stage = ReserveJob::new(Arc::new(mock), "pipe-1");

        let err = stage.process(&mut WorkItem::new()).await.unwrap_err();
        assert_eq!(err.kind(), "control");
    }
}
