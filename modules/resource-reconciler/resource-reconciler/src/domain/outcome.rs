//! Classification of raw transport results.
//!
//! | Result                 | Outcome                | Retried |
//! |------------------------|------------------------|---------|
//! | 2xx                    | `Success`              | no      |
//! | 404                    | `NotFound`             | no      |
//! | 409                    | `Conflict`             | no      |
//! | 403                    | `RetryableServerState` | yes     |
//! | other 4xx              | `ClientError`          | no      |
//! | 5xx, other, transport  | `ServerFailure`        | yes     |
//!
//! 403 is retried because control planes answer it while a prerequisite
//! such as a namespace or service account is still propagating.

use http::StatusCode;
use resource_reconciler_sdk::AttemptFailure;

use super::transport::{ApiResponse, TransportError};

/// Classified result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Success(T),
    NotFound,
    Conflict,
    RetryableServerState(AttemptFailure),
    ClientError(AttemptFailure),
    ServerFailure(AttemptFailure),
}

impl<T> Outcome<T> {
    /// Whether the retry loop stops on this outcome.
    ///
    /// Terminal means "stop retrying", not "succeeded".
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Success(_) | Self::NotFound | Self::Conflict | Self::ClientError(_) => true,
            Self::RetryableServerState(_) | Self::ServerFailure(_) => false,
        }
    }

    /// Failure record for the attempt history, `None` on success.
    #[must_use]
    pub fn failure(&self) -> Option<AttemptFailure> {
        match self {
            Self::Success(_) => None,
            Self::NotFound => Some(AttemptFailure::http(StatusCode::NOT_FOUND.as_u16(), "not found")),
            Self::Conflict => Some(AttemptFailure::http(StatusCode::CONFLICT.as_u16(), "conflict")),
            Self::RetryableServerState(f) | Self::ClientError(f) | Self::ServerFailure(f) => {
                Some(f.clone())
            }
        }
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(v) => Outcome::Success(f(v)),
            Self::NotFound => Outcome::NotFound,
            Self::Conflict => Outcome::Conflict,
            Self::RetryableServerState(e) => Outcome::RetryableServerState(e),
            Self::ClientError(e) => Outcome::ClientError(e),
            Self::ServerFailure(e) => Outcome::ServerFailure(e),
        }
    }
}

/// Labels a transport result.
#[must_use]
pub fn classify(result: Result<ApiResponse, TransportError>) -> Outcome<ApiResponse> {
    let response = match result {
        Ok(response) => response,
        Err(e) => return Outcome::ServerFailure(AttemptFailure::transport(e.to_string())),
    };

    let status = response.status;
    if status.is_success() {
        return Outcome::Success(response);
    }

    let failure = || AttemptFailure::http(status.as_u16(), response.body_text());
    match status {
        StatusCode::NOT_FOUND => Outcome::NotFound,
        StatusCode::CONFLICT => Outcome::Conflict,
        StatusCode::FORBIDDEN => Outcome::RetryableServerState(failure()),
        s if s.is_client_error() => Outcome::ClientError(failure()),
        _ => Outcome::ServerFailure(failure()),
    }
}
