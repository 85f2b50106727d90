//! Fixed-delay retry loop over classified attempts.
//!
//! One operation runs its attempt function up to `max_attempts` times,
//! sleeping `delay` between attempts and never after the last one. Every
//! failed attempt is appended to the [`AttemptHistory`]. Failures that will
//! be retried are also logged and forwarded to the [`DiagnosticSink`] as
//! they happen.

use std::future::Future;
use std::time::Duration;

use resource_reconciler_sdk::AttemptFailure;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::RetryConfig;

use super::diagnostics::{AttemptEvent, DiagnosticSink};
use super::outcome::Outcome;

/// Ordered failures of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptHistory(Vec<AttemptFailure>);

impl AttemptHistory {
    pub fn push(&mut self, failure: AttemptFailure) {
        self.0.push(failure);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&AttemptFailure> {
        self.0.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttemptFailure> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[AttemptFailure] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<AttemptFailure> {
        self.0
    }
}

/// What a finished loop produced.
#[derive(Debug)]
pub struct RetryReport<T> {
    /// Outcome of the last attempt.
    pub outcome: Outcome<T>,
    pub history: AttemptHistory,
    pub attempts: u32,
}

/// The loop was cancelled while waiting for the next attempt.
#[derive(Debug)]
pub struct RetryCancelled {
    pub history: AttemptHistory,
    pub attempts: u32,
}

/// Attempt budget and pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// A budget of zero is treated as one attempt.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Retries until [`Outcome::is_terminal`] or the budget runs out.
    ///
    /// # Errors
    ///
    /// Returns [`RetryCancelled`] if `cancel` fires during a pause.
    pub async fn run<T, F, Fut>(
        &self,
        action: &str,
        sink: &dyn DiagnosticSink,
        cancel: &CancellationToken,
        attempt: F,
    ) -> Result<RetryReport<T>, RetryCancelled>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        self.run_until(action, sink, cancel, Outcome::is_terminal, attempt)
            .await
    }

    /// Like [`Self::run`] with a caller-chosen stop condition.
    ///
    /// # Errors
    ///
    /// Returns [`RetryCancelled`] if `cancel` fires during a pause.
    pub async fn run_until<T, F, Fut, P>(
        &self,
        action: &str,
        sink: &dyn DiagnosticSink,
        cancel: &CancellationToken,
        stop: P,
        mut attempt: F,
    ) -> Result<RetryReport<T>, RetryCancelled>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome<T>>,
        P: Fn(&Outcome<T>) -> bool,
    {
        let mut history = AttemptHistory::default();
        let mut attempts = 0;

        loop {
            if attempts > 0 {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        return Err(RetryCancelled { history, attempts });
                    }
                    () = tokio::time::sleep(self.delay) => {}
                }
            }

            attempts += 1;
            let outcome = attempt().await;
            let failure = outcome.failure();

            if stop(&outcome) || attempts >= self.max_attempts {
                if let Some(failure) = failure {
                    history.push(failure);
                }
                return Ok(RetryReport {
                    outcome,
                    history,
                    attempts,
                });
            }

            if let Some(failure) = failure {
                warn!(
                    action,
                    attempt = attempts,
                    max_attempts = self.max_attempts,
                    error = %failure,
                    "Attempt failed, retrying"
                );
                sink.attempt_failed(&AttemptEvent {
                    action,
                    attempt: attempts,
                    max_attempts: self.max_attempts,
                    failure: &failure,
                });
                history.push(failure);
            }
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config.max_attempts, config.delay())
    }
}
