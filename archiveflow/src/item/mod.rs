//! The work item: one crawl job as it flows through the pipeline.
//!
//! Attributes are filled in progressively by stages. Fields that only exist
//! after a given stage are `Option`s, and stages that depend on them use the
//! `require_*` accessors, which turn a missing attribute into an error naming
//! the stage.

mod gate;
mod info;
pub mod paths;

pub use gate::{CancelGate, CancelHandle};
pub use info::InfoRecord;
pub use paths::{
    check_path_component, derive_paths, derive_target_paths, FetchOptions, ItemPaths, TargetPaths,
};

use crate::control::JobDescriptor;
use crate::errors::ArchiveflowError;
use crate::heartbeat::HeartbeatSignal;
use crate::utils::{now_utc, Timestamp};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Job attributes copied onto the item by the reservation stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobAttributes {
    /// Pipeline the job was reserved for.
    pub pipeline_id: Option<String>,
    /// Human-readable job name.
    pub slug: Option<String>,
    /// When the job was queued.
    pub queued_at: Option<serde_json::Value>,
    /// Who queued the job.
    pub started_by: Option<String>,
    /// Where the job was queued from.
    pub started_in: Option<String>,
    /// Requested fetch depth.
    pub fetch_depth: Option<String>,
    /// Seed URL.
    pub url: Option<String>,
    /// Key of the job's log stream.
    pub log_key: Option<String>,
}

impl JobAttributes {
    /// Builds the attributes from a queue descriptor.
    #[must_use]
    pub fn from_descriptor(pipeline_id: impl Into<String>, descriptor: JobDescriptor) -> Self {
        Self {
            pipeline_id: Some(pipeline_id.into()),
            slug: descriptor.slug,
            queued_at: descriptor.queued_at,
            started_by: descriptor.started_by,
            started_in: descriptor.started_in,
            fetch_depth: descriptor.fetch_depth,
            url: descriptor.url,
            log_key: descriptor.log_key,
        }
    }
}

/// One crawl job's state.
#[derive(Debug)]
pub struct WorkItem {
    id: Uuid,
    created_at: Timestamp,
    ident: Option<String>,
    /// Attributes from the job descriptor.
    pub job: JobAttributes,
    /// Set by `SetFetchDepth`.
    pub fetch_options: Option<FetchOptions>,
    /// Set by `PreparePaths`, target half rewritten by `RelabelIfAborted`.
    pub paths: Option<ItemPaths>,
    /// Whether the control service flagged the job for abort.
    pub aborted: bool,
    heartbeat: Option<HeartbeatSignal>,
    gate: Arc<CancelGate>,
    current_stage: Option<String>,
    output: Vec<String>,
}

impl Default for WorkItem {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkItem {
    /// Creates an empty item for a new pipeline cycle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: now_utc(),
            ident: None,
            job: JobAttributes::default(),
            fetch_options: None,
            paths: None,
            aborted: false,
            heartbeat: None,
            gate: Arc::new(CancelGate::new()),
            current_stage: None,
            output: Vec::new(),
        }
    }

    /// Internal id, stable for the item's whole life.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the item was created.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// The job identifier, once a job has been reserved.
    #[must_use]
    pub fn ident(&self) -> Option<&str> {
        self.ident.as_deref()
    }

    /// Assigns the job identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveflowError::InvalidPathComponent`] if the identifier
    /// cannot be used as a directory name under the data directory, and
    /// [`ArchiveflowError::IdentReassigned`] if a different identifier is
    /// already set.
    pub fn assign_ident(&mut self, ident: impl Into<String>) -> Result<(), ArchiveflowError> {
        let ident = ident.into();
        check_path_component("ident", &ident)?;
        match &self.ident {
            Some(existing) if *existing != ident => Err(ArchiveflowError::IdentReassigned {
                existing: existing.clone(),
                attempted: ident,
            }),
            _ => {
                self.ident = Some(ident);
                Ok(())
            }
        }
    }

    /// Returns the job identifier or an error naming `stage`.
    pub fn require_ident(&self, stage: &str) -> Result<&str, ArchiveflowError> {
        self.ident()
            .ok_or_else(|| ArchiveflowError::missing(stage, "ident"))
    }

    /// Returns the prepared paths or an error naming `stage`.
    pub fn require_paths(&self, stage: &str) -> Result<&ItemPaths, ArchiveflowError> {
        self.paths
            .as_ref()
            .ok_or_else(|| ArchiveflowError::missing(stage, "paths"))
    }

    /// Mutable variant of [`WorkItem::require_paths`].
    pub fn require_paths_mut(&mut self, stage: &str) -> Result<&mut ItemPaths, ArchiveflowError> {
        self.paths
            .as_mut()
            .ok_or_else(|| ArchiveflowError::missing(stage, "paths"))
    }

    /// Human-readable label used in log lines.
    #[must_use]
    pub fn description(&self) -> String {
        match &self.ident {
            Some(ident) => format!("Item {ident}"),
            None => format!("Item {}", self.id),
        }
    }

    /// Appends a line to the item's output log.
    pub fn log_output(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!(item = %self.description(), "{}", line);
        self.output.push(line);
    }

    /// The item's output log.
    #[must_use]
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Records that `stage` has started working on the item.
    pub fn enter_stage(&mut self, stage: &str) {
        self.current_stage = Some(stage.to_string());
        let line = format!("Starting {stage} for {}", self.description());
        self.log_output(line);
    }

    /// The stage the item is currently in.
    #[must_use]
    pub fn current_stage(&self) -> Option<&str> {
        self.current_stage.as_deref()
    }

    /// Attaches a running heartbeat, returning any previous one.
    pub fn set_heartbeat(&mut self, heartbeat: HeartbeatSignal) -> Option<HeartbeatSignal> {
        self.heartbeat.replace(heartbeat)
    }

    /// Detaches the heartbeat, if any.
    pub fn take_heartbeat(&mut self) -> Option<HeartbeatSignal> {
        self.heartbeat.take()
    }

    /// Returns true while the worker holds a live job for this item.
    #[must_use]
    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat.is_some()
    }

    /// The running heartbeat, if any.
    #[must_use]
    pub fn heartbeat(&self) -> Option<&HeartbeatSignal> {
        self.heartbeat.as_ref()
    }

    /// Returns a handle that can cancel the item from elsewhere.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(self.id, self.gate.clone())
    }

    /// Whether a cancellation request would currently take effect.
    #[must_use]
    pub fn may_be_canceled(&self) -> bool {
        self.gate.may_be_canceled()
    }

    /// Whether the item has been canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.gate.is_canceled()
    }

    pub(crate) fn gate(&self) -> Arc<CancelGate> {
        self.gate.clone()
    }
}
