//! Error types for the resource reconciler.

use std::fmt;

use thiserror::Error;

/// One failed attempt, as recorded in an attempt history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// HTTP status when the server answered, `None` for transport failures.
    pub status: Option<u16>,
    /// Response body or transport error text.
    pub message: String,
}

impl AttemptFailure {
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) if self.message.is_empty() => write!(f, "HTTP {status}"),
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => write!(f, "transport error: {}", self.message),
        }
    }
}

/// Errors returned by [`crate::ResourceReconcilerClient`].
#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// The remote API answered 404.
    #[error("failed to {action}: resource not found")]
    NotFound { action: String },

    /// The remote API answered 409 and no fallback applied.
    #[error("failed to {action}: conflict")]
    Conflict { action: String },

    /// The remote API rejected the request with a 4xx status.
    ///
    /// Also returned when the retry budget ran out while the server kept
    /// answering 403.
    #[error("failed to {action}: {last}")]
    Rejected {
        action: String,
        status: u16,
        last: AttemptFailure,
        history: Vec<AttemptFailure>,
    },

    /// The retry budget ran out on server errors or transport failures.
    #[error("failed to {action} after {} attempts: {last}", .history.len())]
    ServerFailure {
        action: String,
        last: AttemptFailure,
        history: Vec<AttemptFailure>,
    },

    /// A wait-for target never became observable.
    #[error("failed to {action}: dependency '{target}' did not become available")]
    DependencyNotReady {
        action: String,
        target: String,
        history: Vec<AttemptFailure>,
    },

    #[error("invalid encoding: {0}; expected \"json\" or \"yaml\"")]
    InvalidEncoding(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("invalid resource path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The HTTP transport could not be constructed.
    #[error("transport setup failed: {0}")]
    Transport(String),

    /// Cancelled while waiting between attempts.
    #[error("{action} was cancelled")]
    Cancelled {
        action: String,
        history: Vec<AttemptFailure>,
    },

    #[error("no client registered for connection '{0}'")]
    ClientNotFound(String),
}

impl ReconcilerError {
    /// Attempt history attached to the error, empty when none was recorded.
    #[must_use]
    pub fn history(&self) -> &[AttemptFailure] {
        match self {
            Self::Rejected { history, .. }
            | Self::ServerFailure { history, .. }
            | Self::DependencyNotReady { history, .. }
            | Self::Cancelled { history, .. } => history,
            _ => &[],
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
