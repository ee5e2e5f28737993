//! Drives items through the stage sequence.

use super::scheduler::{RetryScheduler, RetryVerdict};
use crate::errors::ArchiveflowError;
use crate::events::{EventKind, EventSink, PipelineEvent};
use crate::item::WorkItem;
use crate::observability::StageTimer;
use crate::stages::{Stage, StageOutcome};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// How an item's run ended.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Every stage completed.
    Completed,
    /// The item was canceled while waiting for a retry.
    Canceled,
    /// A stage failed; later stages did not run.
    Failed {
        /// The stage that failed.
        stage: String,
        /// Why it failed.
        error: ArchiveflowError,
    },
}

impl ItemOutcome {
    /// Returns true if every stage completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the item was canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Tally of item outcomes over a worker's run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    /// Items that completed.
    pub completed: usize,
    /// Items that were canceled.
    pub canceled: usize,
    /// Items that failed.
    pub failed: usize,
}

impl WorkerSummary {
    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Completed => self.completed += 1,
            ItemOutcome::Canceled => self.canceled += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Tells a running worker to stop taking new jobs.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    /// Creates an unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the signal. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once the signal is set.
    pub async fn stopped(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

enum StageRun {
    Completed,
    Canceled,
}

/// An ordered, validated sequence of stages.
///
/// Built by [`PipelineBuilder`](super::PipelineBuilder).
pub struct Pipeline {
    pub(super) name: String,
    pub(super) stages: Vec<Arc<dyn Stage>>,
    pub(super) events: Arc<dyn EventSink>,
    pub(super) scheduler: Arc<RetryScheduler>,
    pub(super) failure_pause: Duration,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .field("failure_pause", &self.failure_pause)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// The pipeline's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// The scheduler holding this pipeline's parked items.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<RetryScheduler> {
        &self.scheduler
    }

    /// Cancels a parked item by internal id.
    ///
    /// Only an item waiting in a cancelable retry can be canceled; returns
    /// whether the request took effect.
    pub fn cancel(&self, item_id: Uuid, reason: impl Into<String>) -> bool {
        self.scheduler.cancel(item_id, reason)
    }

    /// Runs `item` through every stage in order.
    ///
    /// A fatal stage error ends the run: later stages are skipped and a
    /// running heartbeat is stopped.
    pub async fn run_item(&self, item: &mut WorkItem) -> ItemOutcome {
        for stage in &self.stages {
            match self.run_stage(stage.as_ref(), item).await {
                Ok(StageRun::Completed) => {}
                Ok(StageRun::Canceled) => {
                    info!(item = %item.description(), stage = stage.name(), "Item canceled");
                    self.emit(item, EventKind::ItemCanceled, Some(stage.name()), None).await;
                    return ItemOutcome::Canceled;
                }
                Err(err) => {
                    if let Some(heartbeat) = item.take_heartbeat() {
                        heartbeat.stop();
                    }
                    error!(
                        item = %item.description(),
                        stage = stage.name(),
                        error = %err,
                        kind = err.kind(),
                        "Stage failed"
                    );
                    let data = json!({"error": err.to_string(), "kind": err.kind()});
                    self.emit(item, EventKind::ItemFailed, Some(stage.name()), Some(data)).await;
                    return ItemOutcome::Failed {
                        stage: stage.name().to_string(),
                        error: err,
                    };
                }
            }
        }

        info!(item = %item.description(), "Item done");
        self.emit(item, EventKind::ItemCompleted, None, None).await;
        ItemOutcome::Completed
    }

    async fn run_stage(&self, stage: &dyn Stage, item: &mut WorkItem) -> Result<StageRun, ArchiveflowError> {
        stage.start(item);
        self.emit(item, EventKind::StageStarted, Some(stage.name()), None).await;
        let timer = StageTimer::start(stage.name());

        loop {
            let reason = match stage.process(item).await? {
                StageOutcome::Complete => {
                    let elapsed = timer.finish();
                    let data = json!({"duration_ms": elapsed.as_secs_f64() * 1000.0});
                    self.emit(item, EventKind::StageCompleted, Some(stage.name()), Some(data)).await;
                    return Ok(StageRun::Completed);
                }
                StageOutcome::Retry(reason) => reason,
            };

            let Some(policy) = stage.retry_policy() else {
                return Err(ArchiveflowError::contract_violation(
                    stage.name(),
                    format!("simple stage asked for a retry ({})", reason.label()),
                ));
            };

            let data = json!({
                "reason": reason.label(),
                "delay_secs": policy.retry_delay.as_secs_f64(),
                "cancelable": policy.cancelable,
            });
            self.emit(item, EventKind::RetryScheduled, Some(stage.name()), Some(data)).await;

            match self.scheduler.schedule(item, stage.name(), policy, &reason).await {
                RetryVerdict::Fire => {}
                RetryVerdict::Dropped => return Ok(StageRun::Canceled),
            }
        }
    }

    async fn emit(
        &self,
        item: &WorkItem,
        kind: EventKind,
        stage: Option<&str>,
        data: Option<serde_json::Value>,
    ) {
        let mut event = PipelineEvent::new(kind, item.description());
        event.stage = stage.map(String::from);
        event.data = data;
        self.events.emit(&event).await;
    }

    /// Keeps `concurrent_items` slots busy with fresh items until `stop` is set.
    ///
    /// Stopping cancels every item parked in a cancelable wait, which is
    /// where idle slots spend their time. Items that already hold a job run
    /// to the end. A failed item is logged and its slot pauses for the
    /// failure pause before starting over.
    pub async fn run_until_stopped(&self, concurrent_items: usize, stop: &StopSignal) -> WorkerSummary {
        self.scheduler.resume();
        let summary = Mutex::new(WorkerSummary::default());
        let slots = concurrent_items.max(1);

        info!(pipeline = %self.name, slots, "Worker started");

        let drainer = async {
            stop.stopped().await;
            self.scheduler.drain("worker stopping");
        };
        let workers = join_all((0..slots).map(|slot| self.run_slot(slot, stop, &summary)));
        tokio::join!(drainer, workers);

        let summary = *summary.lock();
        info!(
            pipeline = %self.name,
            completed = summary.completed,
            canceled = summary.canceled,
            failed = summary.failed,
            "Worker stopped"
        );
        summary
    }

    async fn run_slot(&self, slot: usize, stop: &StopSignal, summary: &Mutex<WorkerSummary>) {
        while !stop.is_stopped() {
            let mut item = WorkItem::new();
            let span = info_span!("item", slot, id = %item.id());
            let outcome = self.run_item(&mut item).instrument(span).await;
            summary.lock().record(&outcome);

            if matches!(outcome, ItemOutcome::Failed { .. }) && !self.failure_pause.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(self.failure_pause) => {}
                    () = stop.stopped() => {}
                }
            }
        }
    }
}
