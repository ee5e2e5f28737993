//! Error types for the archiveflow worker.
//!
//! Only [`ControlError::ConnectionLost`] is recovered locally (by retryable
//! stages). Every other error ends the current item's run as failed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for archiveflow operations.
#[derive(Debug, Error)]
pub enum ArchiveflowError {
    /// The control service answered with a failure other than connection loss.
    #[error("{0}")]
    Control(#[from] ControlError),

    /// A stage needed an attribute an earlier stage should have set.
    #[error("Stage {stage} requires '{attribute}' but it is not set")]
    MissingAttribute {
        /// The stage that needed the attribute.
        stage: String,
        /// The attribute name.
        attribute: &'static str,
    },

    /// The job identifier was assigned twice.
    #[error("Item already holds job '{existing}', refusing to reassign to '{attempted}'")]
    IdentReassigned {
        /// The identifier already on the item.
        existing: String,
        /// The identifier that was rejected.
        attempted: String,
    },

    /// A job attribute that names a file or directory is not a single plain
    /// file name, so it could resolve outside the data directory.
    #[error("Job {attribute} '{value}' is not a single file name")]
    InvalidPathComponent {
        /// The offending attribute.
        attribute: &'static str,
        /// Its value.
        value: String,
    },

    /// A stage broke the stage contract.
    #[error("Stage contract violated by {stage}: {message}")]
    ContractViolation {
        /// The offending stage.
        stage: String,
        /// What went wrong.
        message: String,
    },

    /// A pipeline could not be assembled.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// Invalid worker configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveflowError {
    /// Creates a missing attribute error.
    #[must_use]
    pub fn missing(stage: impl Into<String>, attribute: &'static str) -> Self {
        Self::MissingAttribute {
            stage: stage.into(),
            attribute,
        }
    }

    /// Creates a contract violation error.
    #[must_use]
    pub fn contract_violation(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ContractViolation {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable kind, used in emitted events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Control(_) => "control",
            Self::MissingAttribute { .. } => "missing_attribute",
            Self::IdentReassigned { .. } => "ident_reassigned",
            Self::InvalidPathComponent { .. } => "invalid_path_component",
            Self::ContractViolation { .. } => "contract_violation",
            Self::Validation(_) => "validation",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }
}

/// Failures reported by a [`ControlClient`](crate::control::ControlClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// The control service could not be reached.
    #[error("Lost connection to control service: {0}")]
    ConnectionLost(String),

    /// The control service rejected the request.
    #[error("Control service rejected request: {0}")]
    Rejected(String),
}

impl ControlError {
    /// Creates a connection lost error.
    #[must_use]
    pub fn connection_lost(reason: impl Into<String>) -> Self {
        Self::ConnectionLost(reason.into())
    }

    /// Creates a rejected error.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    /// Returns true for the recoverable connection-lost kind.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-004-EMPTY").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}
