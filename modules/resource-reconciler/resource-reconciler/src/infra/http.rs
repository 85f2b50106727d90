//! HTTP transport on hyper.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use http::{HeaderValue, Request};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use resource_reconciler_sdk::ReconcilerError;
use tracing::debug;

use crate::config::{ConnectionConfig, ReconcilerConfig};
use crate::domain::transport::{ApiRequest, ApiResponse, HttpTransport, TransportError};

use super::tls;

/// Transport for one API server.
///
/// Idle connections are not pooled: every exchange opens and closes its own
/// connection.
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    base_url: String,
    timeout: Duration,
    user_agent: HeaderValue,
}

impl HyperTransport {
    /// # Errors
    ///
    /// Returns [`ReconcilerError::Transport`] if TLS setup fails or the user
    /// agent is not a valid header value.
    pub fn new(
        connection: &ConnectionConfig,
        config: &ReconcilerConfig,
    ) -> Result<Self, ReconcilerError> {
        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls::client_config(connection)?)
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(https);

        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ReconcilerError::Transport(format!("invalid user agent: {e}")))?;

        Ok(Self {
            client,
            base_url: connection.api_server.trim_end_matches('/').to_owned(),
            timeout: config.request_timeout(),
            user_agent,
        })
    }

    async fn exchange(&self, request: Request<Full<Bytes>>) -> Result<ApiResponse, TransportError> {
        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| TransportError::Connection(error_chain(&e)))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::Body(error_chain(&e)))?
            .to_bytes();

        Ok(ApiResponse::new(status, body))
    }
}

#[async_trait]
impl HttpTransport for HyperTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let content_type = HeaderValue::from_static(request.encoding.content_type());

        debug!(method = %request.method, %url, "Sending request");
        let http_request = Request::builder()
            .method(request.method)
            .uri(&url)
            .header(CONTENT_TYPE, content_type.clone())
            .header(ACCEPT, content_type)
            .header(USER_AGENT, self.user_agent.clone())
            .body(Full::new(request.body.unwrap_or_default()))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        tokio::time::timeout(self.timeout, self.exchange(http_request))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
    }
}

/// `error` followed by each of its sources.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
