//! Worker configuration.

use crate::errors::ArchiveflowError;
use crate::observability::LogFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of every environment variable read by [`WorkerConfig::from_env`].
pub const ENV_PREFIX: &str = "ARCHIVEFLOW_";

/// Settings for one worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Queue this worker reserves jobs from.
    pub pipeline_id: String,
    /// Root of job working directories and finished artifacts.
    pub data_dir: PathBuf,
    /// Delay before a retryable stage runs again, in seconds.
    pub retry_delay_secs: u64,
    /// Interval between heartbeats, in milliseconds.
    pub heartbeat_period_ms: u64,
    /// Lifetime of a finished job's record, in seconds.
    pub job_expiry_secs: u64,
    /// Number of items processed at the same time.
    pub concurrent_items: usize,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pipeline_id: String::new(),
            data_dir: PathBuf::from("data"),
            retry_delay_secs: 5,
            heartbeat_period_ms: 1000,
            job_expiry_secs: 48 * 60 * 60,
            concurrent_items: 1,
            log_format: LogFormat::Pretty,
        }
    }
}

impl WorkerConfig {
    /// Creates a config with defaults for everything but the queue and data directory.
    #[must_use]
    pub fn new(pipeline_id: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Sets the retry delay.
    #[must_use]
    pub fn with_retry_delay_secs(mut self, secs: u64) -> Self {
        self.retry_delay_secs = secs;
        self
    }

    /// Sets the heartbeat period.
    #[must_use]
    pub fn with_heartbeat_period_ms(mut self, ms: u64) -> Self {
        self.heartbeat_period_ms = ms;
        self
    }

    /// Sets the job record expiry.
    #[must_use]
    pub fn with_job_expiry_secs(mut self, secs: u64) -> Self {
        self.job_expiry_secs = secs;
        self
    }

    /// Sets the number of concurrent items.
    #[must_use]
    pub fn with_concurrent_items(mut self, n: usize) -> Self {
        self.concurrent_items = n;
        self
    }

    /// Retry delay as a [`Duration`].
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Heartbeat period as a [`Duration`].
    #[must_use]
    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_period_ms)
    }

    /// Job record expiry as a [`Duration`].
    #[must_use]
    pub fn job_expiry(&self) -> Duration {
        Duration::from_secs(self.job_expiry_secs)
    }

    /// Loads a config from a JSON file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Builds a config from `ARCHIVEFLOW_*` environment variables over defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(id) = var("PIPELINE_ID") {
            config.pipeline_id = id;
        }
        if let Some(dir) = var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = var("RETRY_DELAY_SECS") {
            config.retry_delay_secs = v.parse().context("Invalid ARCHIVEFLOW_RETRY_DELAY_SECS")?;
        }
        if let Some(v) = var("HEARTBEAT_PERIOD_MS") {
            config.heartbeat_period_ms =
                v.parse().context("Invalid ARCHIVEFLOW_HEARTBEAT_PERIOD_MS")?;
        }
        if let Some(v) = var("JOB_EXPIRY_SECS") {
            config.job_expiry_secs = v.parse().context("Invalid ARCHIVEFLOW_JOB_EXPIRY_SECS")?;
        }
        if let Some(v) = var("CONCURRENT_ITEMS") {
            config.concurrent_items = v.parse().context("Invalid ARCHIVEFLOW_CONCURRENT_ITEMS")?;
        }
        if let Some(v) = var("LOG_FORMAT") {
            config.log_format = v.parse()?;
        }

        Ok(config)
    }

    /// Checks that the config can drive a worker.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveflowError::Config`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), ArchiveflowError> {
        if self.pipeline_id.trim().is_empty() {
            return Err(ArchiveflowError::Config("pipeline_id must not be empty".into()));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(ArchiveflowError::Config("data_dir must not be empty".into()));
        }
        if self.concurrent_items == 0 {
            return Err(ArchiveflowError::Config("concurrent_items must be at least 1".into()));
        }
        if self.heartbeat_period_ms == 0 {
            return Err(ArchiveflowError::Config("heartbeat_period_ms must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.heartbeat_period(), Duration::from_secs(1));
        assert_eq!(config.job_expiry(), Duration::from_secs(172_800));
        assert_eq!(config.concurrent_items, 1);
        assert_err!(config.validate());
    }

    #[test]
    fn test_builder() {
        let config = WorkerConfig::new("pipe-1", "/srv/data")
            .with_retry_delay_secs(2)
            .with_heartbeat_period_ms(250)
            .with_job_expiry_secs(60)
            .with_concurrent_items(4);

        assert_ok!(config.validate());
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.heartbeat_period(), Duration::from_millis(250));
        assert_eq!(config.job_expiry(), Duration::from_secs(60));
        assert_eq!(config.concurrent_items, 4);
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("ARCHIVEFLOW_PIPELINE_ID", "pipe-7"),
            ("ARCHIVEFLOW_DATA_DIR", "/tmp/af"),
            ("ARCHIVEFLOW_RETRY_DELAY_SECS", "9"),
            ("ARCHIVEFLOW_LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(config.pipeline_id, "pipe-7");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/af"));
        assert_eq!(config.retry_delay_secs, 9);
        assert_eq!(config.heartbeat_period_ms, 1000);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let err = WorkerConfig::from_lookup(lookup(&[("ARCHIVEFLOW_CONCURRENT_ITEMS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("ARCHIVEFLOW_CONCURRENT_ITEMS"));
    }

    #[test]
    fn test_from_json_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.json");
        std::fs::write(&path, r#"{"pipeline_id": "pipe-2", "concurrent_items": 3}"#).unwrap();

        let config = WorkerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.pipeline_id, "pipe-2");
        assert_eq!(config.concurrent_items, 3);
        assert_eq!(config.retry_delay_secs, 5);
    }

    #[test]
    fn test_from_json_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = WorkerConfig::from_json_file(dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read config file"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let base = WorkerConfig::new("pipe-1", "/srv/data");
        assert!(matches!(
            base.clone().with_concurrent_items(0).validate(),
            Err(ArchiveflowError::Config(_))
        ));
        assert!(matches!(
            base.with_heartbeat_period_ms(0).validate(),
            Err(ArchiveflowError::Config(_))
        ));
    }
}
