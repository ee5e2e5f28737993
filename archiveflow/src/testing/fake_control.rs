//! In-memory control service for tests.

use crate::control::{ControlClient, JobDescriptor, ReservedJob};
use crate::errors::ControlError;
use crate::item::WorkItem;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A call received by [`FakeControlClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCall {
    /// `reserve_job(pipeline_id)`
    Reserve(String),
    /// `is_aborted(ident)`
    IsAborted(String),
    /// `heartbeat(ident)`
    Heartbeat(String),
    /// `set_warc_size(ident, path)`, with the file's size at call time.
    SetWarcSize {
        /// Job identifier.
        ident: String,
        /// Path that was reported.
        path: PathBuf,
        /// Size on disk, `None` if the file was missing.
        size: Option<u64>,
    },
    /// `mark_done(item, expire)`
    MarkDone {
        /// Job identifier.
        ident: String,
        /// Requested expiry.
        expire: Duration,
    },
}

/// A scripted control service.
///
/// Each operation pops its next answer from a queue. An empty queue answers
/// "no job", "not aborted" or plain success. Every call is recorded.
#[derive(Debug, Default)]
pub struct FakeControlClient {
    reservations: Mutex<VecDeque<Result<Option<ReservedJob>, ControlError>>>,
    abort_checks: Mutex<VecDeque<Result<bool, ControlError>>>,
    size_reports: Mutex<VecDeque<Result<(), ControlError>>>,
    completions: Mutex<VecDeque<Result<(), ControlError>>>,
    heartbeat_failure: Mutex<Option<ControlError>>,
    heartbeat_hangs: AtomicBool,
    calls: Mutex<Vec<ControlCall>>,
}

impl FakeControlClient {
    /// Creates a fake with empty scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the answer to the next `reserve_job` call.
    pub fn push_reservation(&self, answer: Result<Option<ReservedJob>, ControlError>) {
        self.reservations.lock().push_back(answer);
    }

    /// Queues a job to hand out.
    pub fn push_job(&self, ident: impl Into<String>, descriptor: JobDescriptor) {
        self.push_reservation(Ok(Some(ReservedJob::new(ident, descriptor))));
    }

    /// Queues the answer to the next `is_aborted` call.
    pub fn push_abort_check(&self, answer: Result<bool, ControlError>) {
        self.abort_checks.lock().push_back(answer);
    }

    /// Queues the answer to the next `set_warc_size` call.
    pub fn push_size_report(&self, answer: Result<(), ControlError>) {
        self.size_reports.lock().push_back(answer);
    }

    /// Queues the answer to the next `mark_done` call.
    pub fn push_completion(&self, answer: Result<(), ControlError>) {
        self.completions.lock().push_back(answer);
    }

    /// Makes every heartbeat fail with `err` until cleared.
    pub fn fail_heartbeats(&self, err: ControlError) {
        *self.heartbeat_failure.lock() = Some(err);
    }

    /// Makes every later heartbeat call hang forever.
    pub fn hang_heartbeats(&self) {
        self.heartbeat_hangs.store(true, Ordering::SeqCst);
    }

    /// Lets heartbeats succeed again.
    pub fn clear_heartbeat_failure(&self) {
        *self.heartbeat_failure.lock() = None;
        self.heartbeat_hangs.store(false, Ordering::SeqCst);
    }

    /// All calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ControlCall> {
        self.calls.lock().clone()
    }

    /// Number of `reserve_job` calls.
    #[must_use]
    pub fn reserve_calls(&self) -> usize {
        self.count(|c| matches!(c, ControlCall::Reserve(_)))
    }

    /// Number of `is_aborted` calls.
    #[must_use]
    pub fn abort_checks(&self) -> usize {
        self.count(|c| matches!(c, ControlCall::IsAborted(_)))
    }

    /// Number of heartbeats received for `ident`, failed ones included.
    #[must_use]
    pub fn heartbeat_count(&self, ident: &str) -> usize {
        self.count(|c| matches!(c, ControlCall::Heartbeat(i) if i == ident))
    }

    /// Every `set_warc_size` call as `(ident, path, size)`.
    #[must_use]
    pub fn size_reports(&self) -> Vec<(String, PathBuf, Option<u64>)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                ControlCall::SetWarcSize { ident, path, size } => {
                    Some((ident.clone(), path.clone(), *size))
                }
                _ => None,
            })
            .collect()
    }

    /// Every `mark_done` call as `(ident, expire)`.
    #[must_use]
    pub fn completions(&self) -> Vec<(String, Duration)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                ControlCall::MarkDone { ident, expire } => Some((ident.clone(), *expire)),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&ControlCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: ControlCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ControlClient for FakeControlClient {
    async fn reserve_job(&self, pipeline_id: &str) -> Result<Option<ReservedJob>, ControlError> {
        self.record(ControlCall::Reserve(pipeline_id.to_string()));
        self.reservations.lock().pop_front().unwrap_or(Ok(None))
    }

    async fn is_aborted(&self, ident: &str) -> Result<bool, ControlError> {
        self.record(ControlCall::IsAborted(ident.to_string()));
        self.abort_checks.lock().pop_front().unwrap_or(Ok(false))
    }

    async fn heartbeat(&self, ident: &str) -> Result<(), ControlError> {
        self.record(ControlCall::Heartbeat(ident.to_string()));
        if self.heartbeat_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        match self.heartbeat_failure.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn set_warc_size(&self, ident: &str, path: &Path) -> Result<(), ControlError> {
        let size = tokio::fs::metadata(path).await.ok().map(|m| m.len());
        self.record(ControlCall::SetWarcSize {
            ident: ident.to_string(),
            path: path.to_path_buf(),
            size,
        });
        self.size_reports.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn mark_done(&self, item: &WorkItem, expire: Duration) -> Result<(), ControlError> {
        self.record(ControlCall::MarkDone {
            ident: item.ident().unwrap_or_default().to_string(),
            expire,
        });
        self.completions.lock().pop_front().unwrap_or(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_empty_scripts_use_defaults() {
        let fake = FakeControlClient::new();

        assert_eq!(fake.reserve_job("pipe").await, Ok(None));
        assert_eq!(fake.is_aborted("abc").await, Ok(false));
        assert_eq!(fake.heartbeat("abc").await, Ok(()));
        assert_eq!(
            fake.calls(),
            vec![
                ControlCall::Reserve("pipe".into()),
                ControlCall::IsAborted("abc".into()),
                ControlCall::Heartbeat("abc".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_scripts_answer_in_order() {
        let fake = FakeControlClient::new();
        fake.push_reservation(Err(ControlError::connection_lost("down")));
        fake.push_job("abc123", JobDescriptor::default());

        assert!(fake.reserve_job("pipe").await.unwrap_err().is_connection_lost());
        let job = fake.reserve_job("pipe").await.unwrap().unwrap();
        assert_eq!(job.ident, "abc123");
        assert_eq!(fake.reserve_job("pipe").await, Ok(None));
        assert_eq!(fake.reserve_calls(), 3);
    }

    #[tokio::test]
    async fn test_size_report_reads_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let warc = dir.path().join("x.warc.gz");
        std::fs::write(&warc, b"12345").unwrap();

        let fake = FakeControlClient::new();
        fake.set_warc_size("abc", &warc).await.unwrap();
        fake.set_warc_size("abc", &dir.path().join("missing")).await.unwrap();

        let reports = fake.size_reports();
        assert_eq!(reports[0], ("abc".to_string(), warc, Some(5)));
        assert_eq!(reports[1].2, None);
    }

    #[tokio::test]
    async fn test_heartbeat_failure_toggle() {
        let fake = FakeControlClient::new();
        fake.fail_heartbeats(ControlError::connection_lost("down"));
        assert!(fake.heartbeat("abc").await.is_err());

        fake.clear_heartbeat_failure();
        assert!(fake.heartbeat("abc").await.is_ok());
        assert_eq!(fake.heartbeat_count("abc"), 2);
        assert_eq!(fake.heartbeat_count("other"), 0);
    }
}
