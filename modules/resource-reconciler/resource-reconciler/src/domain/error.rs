use resource_reconciler_sdk::{AttemptFailure, ReconcilerError};

use super::retry::AttemptHistory;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{action}: resource not found")]
    NotFound { action: String },

    #[error("{action}: conflict")]
    Conflict { action: String },

    #[error("{action}: rejected: {last}")]
    Rejected {
        action: String,
        status: u16,
        last: AttemptFailure,
        history: AttemptHistory,
    },

    #[error("{action}: gave up after {} failed attempts: {last}", .history.len())]
    Exhausted {
        action: String,
        last: AttemptFailure,
        history: AttemptHistory,
    },

    #[error("{action}: '{target}' did not become available")]
    DependencyNotReady {
        action: String,
        target: String,
        history: AttemptHistory,
    },

    #[error("{action}: cancelled")]
    Cancelled {
        action: String,
        history: AttemptHistory,
    },

    #[error(transparent)]
    Invalid(#[from] ReconcilerError),
}

impl DomainError {
    /// Failures recorded before the error surfaced.
    #[must_use]
    pub fn history(&self) -> &[AttemptFailure] {
        match self {
            Self::Rejected { history, .. }
            | Self::Exhausted { history, .. }
            | Self::DependencyNotReady { history, .. }
            | Self::Cancelled { history, .. } => history.as_slice(),
            Self::Invalid(e) => e.history(),
            Self::NotFound { .. } | Self::Conflict { .. } => &[],
        }
    }
}

impl From<DomainError> for ReconcilerError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound { action } => Self::NotFound { action },
            DomainError::Conflict { action } => Self::Conflict { action },
            DomainError::Rejected {
                action,
                status,
                last,
                history,
            } => Self::Rejected {
                action,
                status,
                last,
                history: history.into_vec(),
            },
            DomainError::Exhausted {
                action,
                last,
                history,
            } => Self::ServerFailure {
                action,
                last,
                history: history.into_vec(),
            },
            DomainError::DependencyNotReady {
                action,
                target,
                history,
            } => Self::DependencyNotReady {
                action,
                target,
                history: history.into_vec(),
            },
            DomainError::Cancelled { action, history } => Self::Cancelled {
                action,
                history: history.into_vec(),
            },
            DomainError::Invalid(e) => e,
        }
    }
}
