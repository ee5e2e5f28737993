//! Starts and stops the job's heartbeat.

use super::{Stage, StageOutcome};
use crate::control::ControlClient;
use crate::errors::ArchiveflowError;
use crate::heartbeat::{HeartbeatSignal, DEFAULT_HEARTBEAT_PERIOD};
use crate::item::WorkItem;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Starts the periodic heartbeat for the reserved job.
pub struct StartHeartbeat {
    control: Arc<dyn ControlClient>,
    period: Duration,
}

impl StartHeartbeat {
    /// Creates the stage with the default period.
    #[must_use]
    pub fn new(control: Arc<dyn ControlClient>) -> Self {
        Self::with_period(control, DEFAULT_HEARTBEAT_PERIOD)
    }

    /// Creates the stage with an explicit period.
    #[must_use]
    pub fn with_period(control: Arc<dyn ControlClient>, period: Duration) -> Self {
        Self { control, period }
    }
}

impl std::fmt::Debug for StartHeartbeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartHeartbeat")
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for StartHeartbeat {
    fn name(&self) -> &str {
        "StartHeartbeat"
    }

    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        let ident = item.require_ident(self.name())?.to_string();
        let signal = HeartbeatSignal::start(self.control.clone(), ident, self.period);

        if let Some(previous) = item.set_heartbeat(signal) {
            warn!(item = %item.description(), "Replacing a heartbeat that was still running");
            previous.stop();
        }

        Ok(StageOutcome::Complete)
    }
}

/// Stops the heartbeat once the job's output is final.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopHeartbeat;

impl StopHeartbeat {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for StopHeartbeat {
    fn name(&self) -> &str {
        "StopHeartbeat"
    }

    async fn process(&self, item: &mut WorkItem) -> Result<StageOutcome, ArchiveflowError> {
        match item.take_heartbeat() {
            Some(signal) => signal.stop(),
            None => {
                warn!(item = %item.description(), "No heartbeat to stop");
                item.log_output("Warning: couldn't find a heartbeat to stop");
            }
        }

        Ok(StageOutcome::Complete)
    }
}
