//! Parks items between retries of a stage.
//!
//! Every parked item has one entry keyed by its internal id, so an item can
//! be found and canceled before it has a job identifier. The entry is
//! removed when the wait ends, whichever way it ends.

use crate::item::{CancelGate, WorkItem};
use crate::stages::{RetryPolicy, RetryReason};
use crate::utils::{now_utc, Timestamp};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What to do once a retry wait is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Run the stage again.
    Fire,
    /// The item was canceled while waiting; drop it.
    Dropped,
}

/// A parked item.
#[derive(Debug, Clone)]
pub struct PendingRetry {
    /// Stage that will be re-invoked.
    pub stage: String,
    /// Whether the wait may be canceled.
    pub cancelable: bool,
    /// When the wait began.
    pub scheduled_at: Timestamp,
    /// Length of the wait.
    pub delay: Duration,
    gate: Arc<CancelGate>,
}

/// Tracks every item currently waiting for a retry.
#[derive(Debug, Default)]
pub struct RetryScheduler {
    pending: DashMap<Uuid, PendingRetry>,
    draining: AtomicBool,
}

impl RetryScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks `item` for `policy.retry_delay` before `stage` runs again.
    ///
    /// Connection-loss waits are written to the item's output log; waiting
    /// for a job is routine and only traced. While the wait lasts the item
    /// may be canceled if, and only if, the policy is cancelable. A
    /// cancellation ends the wait early.
    pub async fn schedule(
        &self,
        item: &mut WorkItem,
        stage: &str,
        policy: RetryPolicy,
        reason: &RetryReason,
    ) -> RetryVerdict {
        let delay_text = format_delay(policy.retry_delay);
        match reason.notice() {
            Some(notice) => {
                warn!(item = %item.description(), stage, delay_secs = %delay_text, "{notice}");
                item.log_output(format!("{notice}. Retrying {stage} in {delay_text} seconds."));
            }
            None => {
                debug!(item = %item.description(), stage, delay_secs = %delay_text, "No job available");
            }
        }

        let id = item.id();
        let gate = item.gate();
        gate.enter_wait(policy.cancelable);
        self.pending.insert(
            id,
            PendingRetry {
                stage: stage.to_string(),
                cancelable: policy.cancelable,
                scheduled_at: now_utc(),
                delay: policy.retry_delay,
                gate: gate.clone(),
            },
        );

        if policy.cancelable && self.draining.load(Ordering::SeqCst) {
            gate.request_cancel(DRAIN_REASON);
        }

        if policy.cancelable {
            tokio::select! {
                () = tokio::time::sleep(policy.retry_delay) => {}
                () = gate.cancelled() => {}
            }
        } else {
            tokio::time::sleep(policy.retry_delay).await;
        }

        self.pending.remove(&id);
        if gate.fire() {
            RetryVerdict::Fire
        } else {
            debug!(item = %item.description(), stage, reason = ?gate.reason(), "Retry dropped");
            RetryVerdict::Dropped
        }
    }

    /// Cancels the item with internal id `item_id` if it is parked in a
    /// cancelable wait. Returns whether the request took effect.
    pub fn cancel(&self, item_id: Uuid, reason: impl Into<String>) -> bool {
        let Some(gate) = self.pending.get(&item_id).map(|entry| entry.gate.clone()) else {
            return false;
        };
        gate.request_cancel(reason)
    }

    /// Cancels every cancelable wait, now and until [`resume`](Self::resume).
    ///
    /// Returns how many parked items were canceled.
    pub fn drain(&self, reason: &str) -> usize {
        self.draining.store(true, Ordering::SeqCst);

        let gates: Vec<Arc<CancelGate>> = self
            .pending
            .iter()
            .filter(|entry| entry.cancelable)
            .map(|entry| entry.gate.clone())
            .collect();
        let canceled = gates.iter().filter(|gate| gate.request_cancel(reason)).count();

        info!(canceled, still_waiting = self.pending.len().saturating_sub(canceled), "Draining retry waits");
        canceled
    }

    /// Lets cancelable waits run normally again.
    pub fn resume(&self) {
        self.draining.store(false, Ordering::SeqCst);
    }

    /// Returns true while the scheduler is draining.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Number of parked items.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns the pending entry of an item, if it is parked.
    #[must_use]
    pub fn pending(&self, item_id: Uuid) -> Option<PendingRetry> {
        self.pending.get(&item_id).map(|entry| entry.value().clone())
    }

    /// Returns true if the item is parked.
    #[must_use]
    pub fn is_pending(&self, item_id: Uuid) -> bool {
        self.pending.contains_key(&item_id)
    }
}

const DRAIN_REASON: &str = "worker stopping";

fn format_delay(delay: Duration) -> String {
    if delay.subsec_nanos() == 0 {
        delay.as_secs().to_string()
    } else {
        format!("{}", delay.as_secs_f64())
    }
}
