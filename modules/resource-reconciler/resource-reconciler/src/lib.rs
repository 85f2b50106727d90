//! Resource Reconciler
//!
//! Converges resources on a control-plane API server towards desired
//! documents over HTTP(S), retrying through transient server states.
//!
//! - [`connect`] builds a client for one API server
//! - [`ClientRegistry`] shares clients between callers, one per connection
//! - [`ReconcilerConfig`] holds retry budgets, timeouts and diagnostics
//!
//! ## Usage
//!
//! ```ignore
//! use resource_reconciler::{ClientRegistry, ConnectionConfig, ReconcilerConfig};
//! use resource_reconciler_sdk::{Encoding, ResourceAddress, ResourceDocument};
//!
//! let config = ReconcilerConfig::load(None)?;
//! let registry = ClientRegistry::new();
//! let client = registry.get_or_connect(&ConnectionConfig::new("https://10.0.0.1:6443"), &config)?;
//!
//! let doc = ResourceDocument::new(
//!     ResourceAddress::new("api/v1", "team-a", "configmaps", "settings"),
//!     Encoding::Yaml,
//!     "data:\n  mode: fast\n",
//! );
//! client.create(&doc).await?;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::sync::Arc;

use resource_reconciler_sdk::{ReconcilerError, ResourceReconcilerClient};

pub mod config;
pub mod domain;
pub mod infra;
pub mod registry;

pub use config::{ConnectionConfig, DiagnosticsConfig, ReconcilerConfig, RetryConfig};
pub use domain::diagnostics::{DiagnosticSink, FanoutDiagnostics, TracingDiagnostics};
pub use domain::{ResourceReconcilerLocalClient, Service};
pub use infra::diagnostics_file::FileDiagnostics;
pub use infra::http::HyperTransport;
pub use registry::ClientRegistry;

/// Diagnostic sink described by `config`: the log, plus the report file
/// when enabled.
#[must_use]
pub fn diagnostics_for(config: &ReconcilerConfig) -> Arc<dyn DiagnosticSink> {
    if config.diagnostics.enabled {
        Arc::new(FanoutDiagnostics::new(vec![
            Arc::new(TracingDiagnostics),
            Arc::new(FileDiagnostics::new(config.diagnostics.path.clone())),
        ]))
    } else {
        Arc::new(TracingDiagnostics)
    }
}

/// Builds a client for the API server described by `connection`.
///
/// # Errors
///
/// Returns [`ReconcilerError::Transport`] if TLS material is invalid.
pub fn connect(
    connection: &ConnectionConfig,
    config: &ReconcilerConfig,
) -> Result<Arc<dyn ResourceReconcilerClient>, ReconcilerError> {
    let transport = Arc::new(HyperTransport::new(connection, config)?);
    let service = Service::new(transport, config, diagnostics_for(config));
    Ok(Arc::new(ResourceReconcilerLocalClient::new(Arc::new(service))))
}
