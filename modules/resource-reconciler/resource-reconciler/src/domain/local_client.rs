//! In-process client for the resource reconciler.

use std::sync::Arc;

use async_trait::async_trait;
use resource_reconciler_sdk::{
    ReconcilerError, ResourceAddress, ResourceDocument, ResourceReconcilerClient,
};

use super::{DomainError, Service};

/// Local client wrapping the service.
pub struct ResourceReconcilerLocalClient {
    svc: Arc<Service>,
}

impl ResourceReconcilerLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

/// Operation failures were already reported to the diagnostic sink; only
/// rejected input surfaces here above `debug`.
fn log_and_convert(op: &str, e: DomainError) -> ReconcilerError {
    if matches!(e, DomainError::Invalid(_)) {
        tracing::warn!(operation = op, error = %e, "resource_reconciler call failed");
    } else {
        tracing::debug!(operation = op, error = %e, "resource_reconciler call failed");
    }
    e.into()
}

#[async_trait]
impl ResourceReconcilerClient for ResourceReconcilerLocalClient {
    async fn probe_server(&self) -> Result<(), ReconcilerError> {
        self.svc
            .probe_server()
            .await
            .map_err(|e| log_and_convert("probe_server", e))
    }

    async fn create(&self, document: &ResourceDocument) -> Result<(), ReconcilerError> {
        self.svc
            .create(document)
            .await
            .map_err(|e| log_and_convert("create", e))
    }

    async fn update(&self, document: &ResourceDocument) -> Result<(), ReconcilerError> {
        self.svc
            .update(document)
            .await
            .map_err(|e| log_and_convert("update", e))
    }

    async fn exists(&self, address: &ResourceAddress) -> Result<bool, ReconcilerError> {
        self.svc
            .exists(address)
            .await
            .map_err(|e| log_and_convert("exists", e))
    }

    async fn delete(&self, address: &ResourceAddress) -> Result<(), ReconcilerError> {
        self.svc
            .delete(address)
            .await
            .map_err(|e| log_and_convert("delete", e))
    }

    async fn apply(
        &self,
        previous: Option<&ResourceAddress>,
        document: &ResourceDocument,
    ) -> Result<ResourceAddress, ReconcilerError> {
        self.svc
            .apply(previous, document)
            .await
            .map_err(|e| log_and_convert("apply", e))
    }
}
