//! Test doubles for archiveflow pipelines.
//!
//! This module provides:
//! - A scripted in-memory control service
//! - A fetch stand-in that writes a WARC file
//! - A stage that answers from a script

mod fake_control;
mod stages;

pub use fake_control::{ControlCall, FakeControlClient};
pub use stages::{ScriptedStage, Step, WriteWarcStage};
