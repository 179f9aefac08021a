//! Bounded exponential-backoff polling

use crate::cloud::CloudError;
use crate::core::config::PollSettings;
use crate::execution::error::WorkflowError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Bounds for a polling loop
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_attempts: u32,
    pub max_elapsed: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        (&PollSettings::default()).into()
    }
}

impl From<&PollSettings> for PollPolicy {
    fn from(settings: &PollSettings) -> Self {
        let secs = |value: f64| Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO);
        Self {
            initial_interval: secs(settings.initial_interval_secs),
            multiplier: settings.multiplier.max(1.0),
            max_interval: secs(settings.max_interval_secs),
            max_attempts: settings.max_attempts.max(1),
            max_elapsed: secs(settings.max_elapsed_secs),
        }
    }
}

impl PollPolicy {
    /// Fixed interval with an attempt cap and no elapsed-time limit
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            initial_interval: interval,
            multiplier: 1.0,
            max_interval: interval,
            max_attempts: max_attempts.max(1),
            max_elapsed: Duration::MAX,
        }
    }

    /// Sleep before query number `query + 1`, counting from zero
    pub fn interval_after(&self, query: u32) -> Duration {
        let factor = self.multiplier.powi(query.min(i32::MAX as u32) as i32);
        let scaled = self.initial_interval.as_secs_f64() * factor;
        Duration::try_from_secs_f64(scaled)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }

    /// Query until `done` accepts a result
    ///
    /// The first query is issued immediately. Transient errors count as
    /// attempts and are retried; any other error is returned at once.
    pub async fn run<T, Q, Fut, D>(
        &self,
        target: &str,
        mut query: Q,
        mut done: D,
    ) -> Result<T, WorkflowError>
    where
        Q: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CloudError>>,
        D: FnMut(&T) -> bool,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match query().await {
                Ok(value) => {
                    if done(&value) {
                        debug!("{} settled after {} queries", target, attempts);
                        return Ok(value);
                    }
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        target_name = target,
                        attempt = attempts,
                        error = %err,
                        "Transient error while polling, will retry"
                    );
                }
                Err(err) => return Err(err.into()),
            }

            let elapsed = started.elapsed();
            if attempts >= self.max_attempts || elapsed >= self.max_elapsed {
                return Err(WorkflowError::PollTimeout {
                    target: target.to_string(),
                    attempts,
                    elapsed,
                });
            }

            let delay = self
                .interval_after(attempts - 1)
                .min(self.max_elapsed.saturating_sub(elapsed));
            tokio::time::sleep(delay).await;
        }
    }
}
