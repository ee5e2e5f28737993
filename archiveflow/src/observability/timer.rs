//! Stage timing.

use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Measures how long a stage invocation took.
///
/// Uses the tokio clock, so paused-time tests see virtual durations.
#[derive(Debug)]
pub struct StageTimer {
    start: Instant,
    stage: String,
}

impl StageTimer {
    /// Starts timing `stage`.
    #[must_use]
    pub fn start(stage: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            stage: stage.into(),
        }
    }

    /// Time elapsed so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// The timed stage's name.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Stops the timer and returns the elapsed time.
    #[must_use]
    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        trace!(stage = %self.stage, elapsed_ms = elapsed.as_millis() as u64, "Stage timed");
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_measures_virtual_time() {
        let timer = StageTimer::start("MoveFiles");
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(timer.stage(), "MoveFiles");
        assert!(timer.elapsed_ms() >= 250.0);
        assert!(timer.finish() >= Duration::from_millis(250));
    }
}
