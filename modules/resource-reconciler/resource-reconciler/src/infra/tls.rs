//! rustls client configuration for API server connections.

use std::sync::Arc;

use resource_reconciler_sdk::ReconcilerError;
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tracing::{debug, warn};

use crate::config::ConnectionConfig;

/// Builds the TLS config for `connection`.
///
/// With a CA, client certificate and client key the CA is the only trust
/// root and the client authenticates with its certificate. Otherwise the
/// platform roots are trusted and no client certificate is sent.
///
/// # Errors
///
/// Returns [`ReconcilerError::Transport`] if PEM material cannot be parsed
/// or rustls rejects it.
pub fn client_config(connection: &ConnectionConfig) -> Result<ClientConfig, ReconcilerError> {
    let builder =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| tls_error("protocol versions", e))?;

    let Some((ca_cert, client_cert, client_key)) = connection.mutual_tls() else {
        return Ok(builder
            .with_root_certificates(native_roots())
            .with_no_client_auth());
    };

    let mut roots = RootCertStore::empty();
    for cert in CertificateDer::pem_slice_iter(ca_cert.as_bytes()) {
        let cert = cert.map_err(|e| tls_error("CA certificate", e))?;
        roots.add(cert).map_err(|e| tls_error("CA certificate", e))?;
    }
    if roots.is_empty() {
        return Err(ReconcilerError::Transport(
            "no CA certificate found".to_owned(),
        ));
    }

    let chain = CertificateDer::pem_slice_iter(client_cert.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_error("client certificate", e))?;
    let key = PrivateKeyDer::from_pem_slice(client_key.as_bytes())
        .map_err(|e| tls_error("client key", e))?;

    debug!(chain_len = chain.len(), "Using mutual TLS");
    builder
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)
        .map_err(|e| tls_error("client identity", e))
}

fn native_roots() -> RootCertStore {
    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        warn!(%error, "Failed to load a platform certificate");
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    debug!(added, ignored, "Loaded platform root certificates");
    roots
}

fn tls_error(what: &str, e: impl std::fmt::Display) -> ReconcilerError {
    ReconcilerError::Transport(format!("invalid {what}: {e}"))
}
