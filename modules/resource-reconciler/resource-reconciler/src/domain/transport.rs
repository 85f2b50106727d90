//! Transport seam between the reconciler and the HTTP stack.

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use resource_reconciler_sdk::Encoding;
use thiserror::Error;

/// One request against the API server, relative to its base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub encoding: Encoding,
    pub body: Option<Bytes>,
}

impl ApiRequest {
    #[must_use]
    pub fn get(path: impl Into<String>, encoding: Encoding) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            encoding,
            body: None,
        }
    }

    #[must_use]
    pub fn delete(path: impl Into<String>, encoding: Encoding) -> Self {
        Self {
            method: Method::DELETE,
            ..Self::get(path, encoding)
        }
    }

    #[must_use]
    pub fn post(path: impl Into<String>, encoding: Encoding, body: Bytes) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get(path, encoding)
        }
    }

    #[must_use]
    pub fn put(path: impl Into<String>, encoding: Encoding, body: Bytes) -> Self {
        Self {
            method: Method::PUT,
            body: Some(body),
            ..Self::get(path, encoding)
        }
    }
}

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Body as lossy UTF-8, for diagnostics.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failures below the HTTP layer.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("malformed request: {0}")]
    InvalidRequest(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Sends requests to one API server.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs a single exchange. Non-2xx statuses are returned as
    /// responses, not errors.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}
