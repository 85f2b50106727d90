//! Configuration for the resource reconciler.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix of environment variable overrides.
///
/// Nested keys use double underscores: `RECONCILER_LONG_RETRY__MAX_ATTEMPTS`
/// sets `long_retry.max_attempts`.
pub const ENV_PREFIX: &str = "RECONCILER_";

const ENV_SEPARATOR: &str = "__";

/// Reconciler behaviour shared by every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcilerConfig {
    /// Budget for create, update and the server probe.
    pub long_retry: RetryConfig,
    /// Budget for existence checks and delete.
    pub short_retry: RetryConfig,
    /// Upper bound for a single HTTP exchange.
    pub request_timeout_ms: u64,
    /// Path requested by `probe_server`.
    pub probe_path: String,
    pub user_agent: String,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            long_retry: RetryConfig::long(),
            short_retry: RetryConfig::short(),
            request_timeout_ms: 10_000,
            probe_path: resource_reconciler_sdk::DEFAULT_API_PATH.to_owned(),
            user_agent: concat!("resource-reconciler/", env!("CARGO_PKG_VERSION")).to_owned(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl ReconcilerConfig {
    /// Loads configuration from defaults, an optional YAML file and
    /// `RECONCILER_*` environment variables, later sources winning.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if a source cannot be read or a value
    /// does not match the expected type.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR))
            .extract()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Attempt budget and the fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl RetryConfig {
    /// 200 attempts, 3 seconds apart: roughly ten minutes.
    #[must_use]
    pub const fn long() -> Self {
        Self {
            max_attempts: 200,
            delay_ms: 3_000,
        }
    }

    #[must_use]
    pub const fn short() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 3_000,
        }
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Where failure reports are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagnosticsConfig {
    /// When `false` reports only go to the log.
    pub enabled: bool,
    /// Overwritten on every report.
    pub path: PathBuf,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("resource-error.log"),
        }
    }
}

/// How to reach one API server.
///
/// Mutual TLS is used only when all three of `ca_cert`, `client_cert` and
/// `client_key` are set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub api_server: String,
    #[serde(default)]
    pub ca_cert: Option<String>,
    #[serde(default)]
    pub client_cert: Option<String>,
    #[serde(default)]
    pub client_key: Option<SecretString>,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(api_server: impl Into<String>) -> Self {
        Self {
            api_server: api_server.into(),
            ca_cert: None,
            client_cert: None,
            client_key: None,
        }
    }

    #[must_use]
    pub fn with_mutual_tls(
        mut self,
        ca_cert: impl Into<String>,
        client_cert: impl Into<String>,
        client_key: impl Into<String>,
    ) -> Self {
        self.ca_cert = Some(ca_cert.into());
        self.client_cert = Some(client_cert.into());
        self.client_key = Some(SecretString::from(client_key.into()));
        self
    }

    /// Certificate material when mutual TLS is fully configured.
    #[must_use]
    pub fn mutual_tls(&self) -> Option<(&str, &str, &str)> {
        let ca = self.ca_cert.as_deref().filter(|s| !s.is_empty())?;
        let cert = self.client_cert.as_deref().filter(|s| !s.is_empty())?;
        let key = self
            .client_key
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .filter(|s| !s.is_empty())?;
        Some((ca, cert, key))
    }

    /// Registry key for this connection: hex SHA-256 over every field.
    ///
    /// Equal connections map to the same key without the key revealing the
    /// private key material.
    #[must_use]
    pub fn connection_key(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            Some(self.api_server.trim_end_matches('/')),
            self.ca_cert.as_deref(),
            self.client_cert.as_deref(),
            self.client_key.as_ref().map(ExposeSecret::expose_secret),
        ] {
            let part = part.unwrap_or_default();
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
