//! Periodic liveness reports for a held job.
//!
//! A [`HeartbeatSignal`] runs as its own task and is owned by the work item
//! between `StartHeartbeat` and `StopHeartbeat`. Dropping the signal stops the
//! task, so an item that fails mid-pipeline never leaves a heartbeat behind.

use crate::control::ControlClient;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Default interval between heartbeats.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A running heartbeat timer.
pub struct HeartbeatSignal {
    ident: String,
    period: Duration,
    sent: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl HeartbeatSignal {
    /// Starts reporting liveness for `ident` every `period`.
    ///
    /// The first report goes out one period after start. Report failures are
    /// logged and otherwise ignored; the control service expires stale jobs
    /// on its own. A report that has not returned within one period is
    /// abandoned and counted as failed.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(control: Arc<dyn ControlClient>, ident: impl Into<String>, period: Duration) -> Self {
        let ident = ident.into();
        let period = period.max(MIN_PERIOD);
        let sent = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));

        let handle = {
            let ident = ident.clone();
            let sent = sent.clone();
            let failed = failed.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval.tick().await;

                loop {
                    interval.tick().await;
                    // A report may not outlive its period.
                    match tokio::time::timeout(period, control.heartbeat(&ident)).await {
                        Ok(Ok(())) => {
                            sent.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(Err(e)) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            warn!(ident = %ident, error = %e, "Heartbeat failed");
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            warn!(ident = %ident, timeout_ms = period.as_millis() as u64, "Heartbeat timed out");
                        }
                    }
                }
            })
        };

        debug!(ident = %ident, period_ms = period.as_millis() as u64, "Heartbeat started");

        Self {
            ident,
            period,
            sent,
            failed,
            handle,
        }
    }

    /// The job this heartbeat reports for.
    #[must_use]
    pub fn ident(&self) -> &str {
        &self.ident
    }

    /// Interval between reports.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of reports the control service accepted.
    #[must_use]
    pub fn beats_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Number of reports that failed.
    #[must_use]
    pub fn beats_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Returns true while the timer task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops the timer.
    pub fn stop(self) {
        debug!(
            ident = %self.ident,
            beats_sent = self.beats_sent(),
            beats_failed = self.beats_failed(),
            "Heartbeat stopped"
        );
    }
}

impl Drop for HeartbeatSignal {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl std::fmt::Debug for HeartbeatSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatSignal")
            .field("ident", &self.ident)
            .field("period", &self.period)
            .field("beats_sent", &self.beats_sent())
            .finish_non_exhaustive()
    }
}
