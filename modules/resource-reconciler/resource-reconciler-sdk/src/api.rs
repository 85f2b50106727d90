//! Public API trait for the resource reconciler.
//!
//! Callers hold one client per connection and invoke it once per desired
//! state change. Each call runs to completion on its own retry budget and
//! keeps no state between calls.

use async_trait::async_trait;

use crate::address::ResourceAddress;
use crate::error::ReconcilerError;
use crate::models::ResourceDocument;

/// Converges remote resources towards desired documents.
///
/// ```ignore
/// let doc = ResourceDocument::new(address, Encoding::Yaml, "data:\n  k: v\n");
/// client.create(&doc).await?;
/// assert!(client.exists(doc.address()).await?);
/// ```
#[async_trait]
pub trait ResourceReconcilerClient: Send + Sync {
    /// Waits until the API server answers.
    ///
    /// # Errors
    ///
    /// Returns the last failure once the long retry budget is exhausted.
    async fn probe_server(&self) -> Result<(), ReconcilerError>;

    /// Creates the resource, or replaces it if it already exists, then waits
    /// for the document's wait-for targets.
    ///
    /// # Errors
    ///
    /// - `Rejected` for terminal client errors
    /// - `ServerFailure` when the retry budget ran out
    /// - `DependencyNotReady` when a wait-for target never appeared
    async fn create(&self, document: &ResourceDocument) -> Result<(), ReconcilerError>;

    /// Replaces the resource with the document's content.
    ///
    /// # Errors
    ///
    /// Any terminal failure, including `NotFound`.
    async fn update(&self, document: &ResourceDocument) -> Result<(), ReconcilerError>;

    /// Reports whether the resource exists. A 404 is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Any other terminal failure.
    async fn exists(&self, address: &ResourceAddress) -> Result<bool, ReconcilerError>;

    /// Deletes the resource. Missing resources and protected namespaces are
    /// treated as success.
    ///
    /// # Errors
    ///
    /// Any terminal failure other than `NotFound`.
    async fn delete(&self, address: &ResourceAddress) -> Result<(), ReconcilerError>;

    /// Converges a resource whose previous address may differ from the
    /// document's, returning the address to remember.
    ///
    /// Without a previous address this is `create`. With the same address it
    /// is `update`. Otherwise the old resource is deleted and the new one
    /// created.
    ///
    /// # Errors
    ///
    /// Errors of the underlying `create`, `update` or `delete`.
    async fn apply(
        &self,
        previous: Option<&ResourceAddress>,
        document: &ResourceDocument,
    ) -> Result<ResourceAddress, ReconcilerError>;
}
