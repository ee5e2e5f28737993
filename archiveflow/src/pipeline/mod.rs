//! Pipeline building and execution.
//!
//! This module provides:
//! - A validating builder, including the standard archive job sequence
//! - The executor that drives items through stages
//! - The retry scheduler that parks items between retries
//! - A worker loop that keeps a fixed number of items in flight

mod builder;
mod executor;
mod scheduler;


pub use builder::PipelineBuilder;
pub use executor::{ItemOutcome, Pipeline, StopSignal, WorkerSummary};
pub use scheduler::{PendingRetry, RetryScheduler, RetryVerdict};
