//! Observer for failed attempts and failed operations.
//!
//! The retry loop and the service report through [`DiagnosticSink`] and do
//! no I/O of their own. Writing a report file is one sink among others, see
//! `infra::diagnostics_file`.

use std::sync::Arc;

use resource_reconciler_sdk::AttemptFailure;

/// A non-final attempt failed and the loop is about to retry.
#[derive(Debug, Clone, Copy)]
pub struct AttemptEvent<'a> {
    pub action: &'a str,
    /// 1-based.
    pub attempt: u32,
    pub max_attempts: u32,
    pub failure: &'a AttemptFailure,
}

/// An operation ended in an error returned to the caller.
#[derive(Debug, Clone, Copy)]
pub struct FailureReport<'a> {
    /// Human readable action, e.g. `create api/v1/namespaces/a/pods/p`.
    pub action: &'a str,
    /// Request body, when the operation sent one.
    pub contents: Option<&'a [u8]>,
    pub history: &'a [AttemptFailure],
}

/// Receives diagnostics from the reconciler.
pub trait DiagnosticSink: Send + Sync {
    fn attempt_failed(&self, _event: &AttemptEvent<'_>) {}

    fn operation_failed(&self, report: &FailureReport<'_>);
}

/// Logs reports through `tracing`. Attempts are already logged by the
/// retry loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn operation_failed(&self, report: &FailureReport<'_>) {
        let last = report.history.last().map(ToString::to_string);
        tracing::error!(
            action = report.action,
            attempts = report.history.len(),
            last_error = last.as_deref().unwrap_or("none"),
            "Failed to {}",
            report.action
        );
    }
}

/// Forwards every event to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutDiagnostics {
    sinks: Vec<Arc<dyn DiagnosticSink>>,
}

impl FanoutDiagnostics {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn DiagnosticSink>>) -> Self {
        Self { sinks }
    }
}

impl DiagnosticSink for FanoutDiagnostics {
    fn attempt_failed(&self, event: &AttemptEvent<'_>) {
        for sink in &self.sinks {
            sink.attempt_failed(event);
        }
    }

    fn operation_failed(&self, report: &FailureReport<'_>) {
        for sink in &self.sinks {
            sink.operation_failed(report);
        }
    }
}
