//! # Archiveflow
//!
//! The per-job pipeline of a distributed web-archiving worker.
//!
//! A worker repeatedly runs a fresh [`WorkItem`](item::WorkItem) through an
//! ordered list of stages: it reserves a crawl job from the control
//! service's queue, keeps a heartbeat running while it holds the job,
//! prepares the on-disk layout, lets an external fetch produce a WARC file,
//! writes the info file, moves both artifacts into the data directory and
//! reports completion.
//!
//! - **Retry on connection loss**: stages that talk to the control service
//!   retry at a fixed delay for as long as it stays unreachable
//! - **Heartbeat**: liveness reports run on their own task while a job is held
//! - **Cancellation**: an item can be canceled only while it waits for a job
//! - **Observability**: `tracing` logs, per-item output log, pipeline events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use archiveflow::prelude::*;
//!
//! let config = WorkerConfig::from_env()?;
//! config.validate()?;
//! init_tracing(config.log_format)?;
//!
//! let pipeline = PipelineBuilder::archive_job(&config, control, fetch_stage).build()?;
//! let stop = StopSignal::new();
//! let summary = pipeline.run_until_stopped(config.concurrent_items, &stop).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod control;
pub mod errors;
pub mod events;
pub mod heartbeat;
pub mod item;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::WorkerConfig;
    pub use crate::control::{ControlClient, JobDescriptor, ReservedJob};
    pub use crate::errors::{
        ArchiveflowError, ContractErrorInfo, ControlError, PipelineValidationError,
    };
    pub use crate::events::{EventKind, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};
    pub use crate::heartbeat::HeartbeatSignal;
    pub use crate::item::{CancelHandle, FetchOptions, ItemPaths, WorkItem};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{ItemOutcome, Pipeline, PipelineBuilder, StopSignal, WorkerSummary};
    pub use crate::stages::{RetryPolicy, RetryReason, Stage, StageOutcome};
    pub use crate::utils::Timestamp;
}
