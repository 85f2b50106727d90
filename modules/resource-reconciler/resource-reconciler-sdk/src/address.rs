//! Resource addressing.
//!
//! A [`ResourceAddress`] names one document inside the control-plane API:
//! an API group/version path, an optional namespace, a collection and a
//! name. Two derived strings are used both for dispatch and in diagnostics:
//!
//! - collection path: `<api>/<collection>` or
//!   `<api>/namespaces/<namespace>/<collection>`
//! - resource path: `<collection path>/<name>`
//!
//! [`ResourceAddress::parse`] is the inverse of [`ResourceAddress::resource_path`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReconcilerError;

/// API path used when the caller does not specify one.
pub const DEFAULT_API_PATH: &str = "api/v1";

/// Namespace assigned to namespaced resources that do not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Literal collection token for namespaces themselves.
pub const NAMESPACES_COLLECTION: &str = "namespaces";

/// Namespaces that are never removed by `delete`.
const PROTECTED_NAMESPACES: &[&str] = &[DEFAULT_NAMESPACE, "kube-system", "kube-public"];

/// Location of a resource in the remote API.
///
/// An empty `namespace` means the resource is global. Addresses in the
/// `namespaces` collection are always global regardless of `namespace`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceAddress {
    api_path: String,
    namespace: String,
    collection: String,
    name: String,
}

impl ResourceAddress {
    /// Builds an address, normalizing surrounding slashes.
    ///
    /// An empty `api_path` falls back to [`DEFAULT_API_PATH`].
    #[must_use]
    pub fn new(
        api_path: impl AsRef<str>,
        namespace: impl Into<String>,
        collection: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let api_path = api_path.as_ref().trim_matches('/');
        let api_path = if api_path.is_empty() {
            DEFAULT_API_PATH.to_owned()
        } else {
            api_path.to_owned()
        };

        Self {
            api_path,
            namespace: namespace.into(),
            collection: collection.into(),
            name: name.into(),
        }
    }

    /// Shorthand for a global resource.
    #[must_use]
    pub fn global(
        api_path: impl AsRef<str>,
        collection: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(api_path, String::new(), collection, name)
    }

    /// Address of the namespace object `name`.
    #[must_use]
    pub fn namespace_object(api_path: impl AsRef<str>, name: impl Into<String>) -> Self {
        Self::global(api_path, NAMESPACES_COLLECTION, name)
    }

    #[must_use]
    pub fn api_path(&self) -> &str {
        &self.api_path
    }

    /// Namespace as stored. See [`Self::effective_namespace`] for the value
    /// used in paths.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this address is a namespace object.
    #[must_use]
    pub fn is_namespace(&self) -> bool {
        self.collection == NAMESPACES_COLLECTION
    }

    /// Whether the address lives outside any namespace.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.is_namespace() || self.namespace.is_empty()
    }

    /// Namespace segment used in paths, `None` for global addresses.
    #[must_use]
    pub fn effective_namespace(&self) -> Option<&str> {
        if self.is_global() {
            None
        } else {
            Some(&self.namespace)
        }
    }

    /// `false` for the default and system-reserved namespaces.
    #[must_use]
    pub fn can_be_deleted(&self) -> bool {
        !(self.is_namespace() && PROTECTED_NAMESPACES.contains(&self.name.as_str()))
    }

    #[must_use]
    pub fn collection_path(&self) -> String {
        match self.effective_namespace() {
            None => format!("{}/{}", self.api_path, self.collection),
            Some(namespace) => format!(
                "{}/{NAMESPACES_COLLECTION}/{namespace}/{}",
                self.api_path, self.collection
            ),
        }
    }

    #[must_use]
    pub fn resource_path(&self) -> String {
        format!("{}/{}", self.collection_path(), self.name)
    }

    /// Parses a resource path produced by [`Self::resource_path`].
    ///
    /// Three shapes are recognized, checked in this order:
    ///
    /// 1. `<api>/namespaces/<name>`: a namespace object
    /// 2. `<api>/namespaces/<namespace>/<collection>/<name>`: a namespaced resource
    /// 3. `<api>/<collection>/<name>`: anything else is global
    ///
    /// # Errors
    ///
    /// Returns [`ReconcilerError::InvalidPath`] if the path has fewer than
    /// two segments or contains an empty segment.
    pub fn parse(path: &str) -> Result<Self, ReconcilerError> {
        let trimmed = path.trim_matches('/');
        let segments: Vec<&str> = trimmed.split('/').collect();

        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(ReconcilerError::InvalidPath {
                path: path.to_owned(),
                reason: "expected at least '<collection>/<name>'".to_owned(),
            });
        }

        let n = segments.len();
        let name = segments[n - 1];

        if segments[n - 2] == NAMESPACES_COLLECTION {
            return Ok(Self::namespace_object(segments[..n - 2].join("/"), name));
        }

        if n >= 4 && segments[n - 4] == NAMESPACES_COLLECTION {
            return Ok(Self::new(
                segments[..n - 4].join("/"),
                segments[n - 3],
                segments[n - 2],
                name,
            ));
        }

        Ok(Self::global(
            segments[..n - 2].join("/"),
            segments[n - 2],
            name,
        ))
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_path())
    }
}
