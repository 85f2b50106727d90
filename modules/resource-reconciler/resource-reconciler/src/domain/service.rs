use std::sync::Arc;

use bytes::Bytes;
use resource_reconciler_sdk::{
    AttemptFailure, Encoding, ResourceAddress, ResourceDocument, WaitTarget,
};
use serde::Deserialize;
use serde::de::IgnoredAny;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::ReconcilerConfig;

use super::diagnostics::{DiagnosticSink, FailureReport};
use super::error::DomainError;
use super::outcome::{Outcome, classify};
use super::retry::{AttemptHistory, RetryCancelled, RetryPolicy, RetryReport};
use super::transport::{ApiRequest, ApiResponse, HttpTransport};

/// Reconciles documents against one API server.
///
/// Every operation runs its own retry loop and keeps nothing between calls,
/// so a single service may be shared by concurrent callers.
#[derive(Clone)]
pub struct Service {
    transport: Arc<dyn HttpTransport>,
    long_retry: RetryPolicy,
    short_retry: RetryPolicy,
    probe_path: String,
    sink: Arc<dyn DiagnosticSink>,
    cancel: CancellationToken,
}

impl Service {
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: &ReconcilerConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            transport,
            long_retry: config.long_retry.into(),
            short_retry: config.short_retry.into(),
            probe_path: config.probe_path.trim_matches('/').to_owned(),
            sink,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops retry loops at their next pause once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Retries `GET <probe_path>` on the long budget until it succeeds.
    ///
    /// # Errors
    ///
    /// The last failure once the budget is spent, or a terminal rejection.
    #[instrument(skip_all, fields(path = %self.probe_path))]
    pub async fn probe_server(&self) -> Result<(), DomainError> {
        let action = format!("reach API server at {}", self.probe_path);
        let request = ApiRequest::get(self.probe_path.clone(), Encoding::default());

        let report = self.retry(&self.long_retry, &action, &request).await?;
        match report.outcome {
            Outcome::Success(_) => {
                debug!(attempts = report.attempts, "API server is reachable");
                Ok(())
            }
            outcome => Err(self.reject(&action, None, outcome, report.history)),
        }
    }

    /// Sends a `POST` to the document's collection. A 409 falls back to
    /// [`Self::update`]. Wait-for targets are resolved after either path
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Invalid content, a terminal failure of the create or the fallback
    /// update, or a wait-for target that never became available.
    #[instrument(skip_all, fields(resource = %document.address()))]
    pub async fn create(&self, document: &ResourceDocument) -> Result<(), DomainError> {
        let address = document.address();
        let body = document.prepare_content()?;
        let action = format!("create {address}");
        let request = ApiRequest::post(address.collection_path(), document.encoding(), body.clone());

        info!("Creating resource");
        let report = self.retry(&self.long_retry, &action, &request).await?;
        match report.outcome {
            Outcome::Success(_) => {}
            Outcome::Conflict => {
                info!("Resource already exists, updating it instead");
                self.put(document, body).await?;
            }
            outcome => return Err(self.reject(&action, Some(&body), outcome, report.history)),
        }

        self.wait_for(document).await
    }

    /// Sends a `PUT` with the document to its resource path.
    ///
    /// # Errors
    ///
    /// Invalid content or any terminal failure, including `NotFound`.
    #[instrument(skip_all, fields(resource = %document.address()))]
    pub async fn update(&self, document: &ResourceDocument) -> Result<(), DomainError> {
        let body = document.prepare_content()?;
        info!("Updating resource");
        self.put(document, body).await
    }

    /// `GET` on the short budget. A 404 is `false`.
    ///
    /// # Errors
    ///
    /// Any terminal failure other than `NotFound`.
    #[instrument(skip_all, fields(resource = %address))]
    pub async fn exists(&self, address: &ResourceAddress) -> Result<bool, DomainError> {
        let action = format!("read {address}");
        let request = ApiRequest::get(address.resource_path(), Encoding::default());

        let report = self.retry(&self.short_retry, &action, &request).await?;
        match report.outcome {
            Outcome::Success(_) => Ok(true),
            Outcome::NotFound => {
                debug!("Resource does not exist");
                Ok(false)
            }
            outcome => Err(self.reject(&action, None, outcome, report.history)),
        }
    }

    /// `DELETE` on the short budget. Protected namespaces are left alone and
    /// a 404 counts as deleted.
    ///
    /// # Errors
    ///
    /// Any terminal failure other than `NotFound`.
    #[instrument(skip_all, fields(resource = %address))]
    pub async fn delete(&self, address: &ResourceAddress) -> Result<(), DomainError> {
        if !address.can_be_deleted() {
            info!("Namespace is protected, skipping delete");
            return Ok(());
        }

        let action = format!("delete {address}");
        let request = ApiRequest::delete(address.resource_path(), Encoding::default());

        info!("Deleting resource");
        let report = self.retry(&self.short_retry, &action, &request).await?;
        match report.outcome {
            Outcome::Success(_) => Ok(()),
            Outcome::NotFound => {
                debug!("Resource was already gone");
                Ok(())
            }
            outcome => Err(self.reject(&action, None, outcome, report.history)),
        }
    }

    /// Converges the document from wherever it lived before.
    ///
    /// A changed resource path means the old resource is deleted and the new
    /// one created, since paths cannot be renamed in place.
    ///
    /// # Errors
    ///
    /// Errors of the underlying create, update or delete.
    #[instrument(skip_all, fields(resource = %document.address()))]
    pub async fn apply(
        &self,
        previous: Option<&ResourceAddress>,
        document: &ResourceDocument,
    ) -> Result<ResourceAddress, DomainError> {
        match previous {
            None => self.create(document).await?,
            Some(previous) if previous.resource_path() == document.address().resource_path() => {
                self.update(document).await?;
            }
            Some(previous) => {
                info!(previous = %previous, "Resource path changed, replacing resource");
                self.delete(previous).await?;
                self.create(document).await?;
            }
        }
        Ok(document.address().clone())
    }

    /// Polls every wait-for target of `document` in declaration order.
    ///
    /// # Errors
    ///
    /// `InvalidPath` for a malformed target, `DependencyNotReady` when the
    /// long budget runs out before a target appears.
    pub async fn wait_for(&self, document: &ResourceDocument) -> Result<(), DomainError> {
        for raw in document.wait_for() {
            let target = WaitTarget::parse(raw, document.address())?;
            self.wait_for_target(document.address(), &target, document.encoding())
                .await?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(target = %target))]
    async fn wait_for_target(
        &self,
        created: &ResourceAddress,
        target: &WaitTarget,
        encoding: Encoding,
    ) -> Result<(), DomainError> {
        let action = format!("wait for {target} after creating {created}");
        let request = ApiRequest::get(target.path(), encoding);
        let collection = target.is_collection();

        debug!(path = %request.path, "Waiting for dependency");
        let request_ref = &request;
        let report = self
            .long_retry
            .run_until(
                &action,
                self.sink.as_ref(),
                &self.cancel,
                |outcome| outcome.is_terminal() && !matches!(outcome, Outcome::NotFound),
                move || {
                    let request = request_ref.clone();
                    async move {
                        let outcome = self.attempt(request).await;
                        if collection {
                            require_items(outcome, encoding)
                        } else {
                            outcome
                        }
                    }
                },
            )
            .await
            .map_err(|c| self.cancelled(&action, c))?;

        match report.outcome {
            Outcome::Success(_) => {
                debug!(attempts = report.attempts, "Dependency is available");
                Ok(())
            }
            Outcome::NotFound => Err(self.fail(
                &action,
                None,
                DomainError::DependencyNotReady {
                    action: action.clone(),
                    target: target.raw().to_owned(),
                    history: report.history,
                },
            )),
            outcome => Err(self.reject(&action, None, outcome, report.history)),
        }
    }

    async fn put(&self, document: &ResourceDocument, body: Bytes) -> Result<(), DomainError> {
        let address = document.address();
        let action = format!("update {address}");
        let request = ApiRequest::put(address.resource_path(), document.encoding(), body.clone());

        let report = self.retry(&self.long_retry, &action, &request).await?;
        match report.outcome {
            Outcome::Success(_) => Ok(()),
            outcome => Err(self.reject(&action, Some(&body), outcome, report.history)),
        }
    }

    async fn attempt(&self, request: ApiRequest) -> Outcome<ApiResponse> {
        classify(self.transport.send(request).await)
    }

    async fn retry(
        &self,
        policy: &RetryPolicy,
        action: &str,
        request: &ApiRequest,
    ) -> Result<RetryReport<ApiResponse>, DomainError> {
        policy
            .run(action, self.sink.as_ref(), &self.cancel, move || {
                self.attempt(request.clone())
            })
            .await
            .map_err(|c| self.cancelled(action, c))
    }

    /// Hands the error to the diagnostic sink and returns it.
    fn fail(&self, action: &str, contents: Option<&[u8]>, error: DomainError) -> DomainError {
        self.sink.operation_failed(&FailureReport {
            action,
            contents,
            history: error.history(),
        });
        error
    }

    fn cancelled(&self, action: &str, c: RetryCancelled) -> DomainError {
        info!(action, attempts = c.attempts, "Operation cancelled");
        self.fail(
            action,
            None,
            DomainError::Cancelled {
                action: action.to_owned(),
                history: c.history,
            },
        )
    }

    fn reject(
        &self,
        action: &str,
        contents: Option<&[u8]>,
        outcome: Outcome<ApiResponse>,
        history: AttemptHistory,
    ) -> DomainError {
        self.fail(action, contents, terminal_error(action, outcome, history))
    }
}

/// Error for an outcome the caller does not treat as success.
fn terminal_error(action: &str, outcome: Outcome<ApiResponse>, history: AttemptHistory) -> DomainError {
    let action = action.to_owned();
    match outcome {
        Outcome::NotFound => DomainError::NotFound { action },
        Outcome::Conflict => DomainError::Conflict { action },
        Outcome::ClientError(last) | Outcome::RetryableServerState(last) => DomainError::Rejected {
            action,
            status: last.status.unwrap_or_default(),
            last,
            history,
        },
        Outcome::ServerFailure(last) => DomainError::Exhausted {
            action,
            last,
            history,
        },
        // Callers handle success before getting here.
        Outcome::Success(response) => DomainError::Exhausted {
            action,
            last: AttemptFailure::http(response.status.as_u16(), "unexpected success"),
            history,
        },
    }
}

#[derive(Deserialize)]
struct Listing {
    #[serde(default)]
    items: Option<Vec<IgnoredAny>>,
}

/// An empty collection counts as not there yet.
fn require_items(outcome: Outcome<ApiResponse>, encoding: Encoding) -> Outcome<ApiResponse> {
    let Outcome::Success(response) = outcome else {
        return outcome;
    };

    match listed_items(&response.body, encoding) {
        Ok(0) => Outcome::NotFound,
        Ok(_) => Outcome::Success(response),
        Err(e) => Outcome::ServerFailure(AttemptFailure::http(
            response.status.as_u16(),
            format!("unreadable collection listing: {e}"),
        )),
    }
}

fn listed_items(body: &[u8], encoding: Encoding) -> Result<usize, String> {
    let listing: Listing = match encoding {
        Encoding::Json => serde_json::from_slice(body).map_err(|e| e.to_string())?,
        Encoding::Yaml => {
            let text = std::str::from_utf8(body).map_err(|e| e.to_string())?;
            serde_saphyr::from_str(text).map_err(|e| e.to_string())?
        }
    };
    Ok(listing.items.as_ref().map_or(0, Vec::len))
}
