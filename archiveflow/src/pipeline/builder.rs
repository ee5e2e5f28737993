//! Pipeline builder with validation.

use super::executor::Pipeline;
use super::scheduler::RetryScheduler;
use crate::config::WorkerConfig;
use crate::control::ControlClient;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::events::{EventSink, NoOpEventSink};
use crate::stages::{
    MarkItemAsDone, MoveFiles, PreparePaths, RelabelIfAborted, ReserveJob, SetFetchDepth,
    SetWarcFileSize, Stage, StartHeartbeat, StopHeartbeat, WriteInfo, DEFAULT_RETRY_DELAY,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating validated pipelines.
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    events: Option<Arc<dyn EventSink>>,
    scheduler: Option<Arc<RetryScheduler>>,
    failure_pause: Duration,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("failure_pause", &self.failure_pause)
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            events: None,
            scheduler: None,
            failure_pause: DEFAULT_RETRY_DELAY,
        }
    }

    /// The standard archive job sequence around an external `fetch` stage.
    ///
    /// ReserveJob, StartHeartbeat, SetFetchDepth, PreparePaths, `fetch`,
    /// RelabelIfAborted, WriteInfo, MoveFiles, SetWarcFileSize,
    /// StopHeartbeat, MarkItemAsDone.
    #[must_use]
    pub fn archive_job(
        config: &WorkerConfig,
        control: Arc<dyn ControlClient>,
        fetch: Arc<dyn Stage>,
    ) -> Self {
        let delay = config.retry_delay();

        Self::new(format!("archive-job:{}", config.pipeline_id))
            .stage(Arc::new(ReserveJob::with_retry_delay(
                control.clone(),
                config.pipeline_id.as_str(),
                delay,
            )))
            .stage(Arc::new(StartHeartbeat::with_period(
                control.clone(),
                config.heartbeat_period(),
            )))
            .stage(Arc::new(SetFetchDepth::new()))
            .stage(Arc::new(PreparePaths::new(config.data_dir.clone())))
            .stage(fetch)
            .stage(Arc::new(RelabelIfAborted::with_retry_delay(
                control.clone(),
                config.data_dir.clone(),
                delay,
            )))
            .stage(Arc::new(WriteInfo::new()))
            .stage(Arc::new(MoveFiles::new()))
            .stage(Arc::new(SetWarcFileSize::with_retry_delay(control.clone(), delay)))
            .stage(Arc::new(StopHeartbeat::new()))
            .stage(Arc::new(MarkItemAsDone::with_retry_delay(
                control,
                config.job_expiry(),
                delay,
            )))
            .with_failure_pause(delay)
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the event sink. Defaults to [`NoOpEventSink`].
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Shares a retry scheduler with other pipelines.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<RetryScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Sets how long a worker slot rests after a failed item.
    #[must_use]
    pub fn with_failure_pause(mut self, pause: Duration) -> Self {
        self.failure_pause = pause;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no stages or two stages share a name.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages").with_error_info(
                ContractErrorInfo::new("CONTRACT-004-EMPTY", "Cannot build an empty pipeline")
                    .with_fix_hint("Add at least one stage to the pipeline before building."),
            ));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            let name = stage.name();
            if !seen.insert(name) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{name}' appears more than once"
                ))
                .with_stages(vec![name.to_string()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONTRACT-004-DUPLICATE",
                        format!("Duplicate stage name '{name}'"),
                    )
                    .with_fix_hint("Give every stage in a pipeline a distinct name."),
                ));
            }
        }

        Ok(Pipeline {
            name: self.name,
            stages: self.stages,
            events: self.events.unwrap_or_else(|| Arc::new(NoOpEventSink)),
            scheduler: self.scheduler.unwrap_or_default(),
            failure_pause: self.failure_pause,
        })
    }
}
