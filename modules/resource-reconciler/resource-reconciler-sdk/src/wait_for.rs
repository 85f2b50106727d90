//! Wait-for targets declared on a document.
//!
//! A target is a path relative to the created resource:
//!
//! - `<collection>`: wait until the collection lists at least one item
//! - `<collection>/<name>`: wait until that resource can be read
//! - `namespaces/<namespace>/<collection>[/<name>]`: same, in an explicit namespace
//!
//! Without an explicit namespace the target lives in the created resource's
//! namespace, or inside the created namespace when the resource is one.
//!
//! Targets are polled under the core API (`api/v1`) regardless of the created
//! resource's group. Another group is selected with a leading `api/<version>`
//! or `apis/<group>/<version>` prefix, e.g. `apis/apps/v1/deployments/web`.

use std::fmt;

use crate::address::{DEFAULT_API_PATH, NAMESPACES_COLLECTION, ResourceAddress};
use crate::error::ReconcilerError;

/// A dependency that must become observable before a create completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitTarget {
    raw: String,
    address: ResourceAddress,
    whole_collection: bool,
}

impl WaitTarget {
    /// Resolves `target` against the address of the resource being created.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcilerError::InvalidPath`] for empty targets, empty
    /// segments or more than two segments after the namespace prefix.
    pub fn parse(target: &str, created: &ResourceAddress) -> Result<Self, ReconcilerError> {
        let invalid = |reason: &str| ReconcilerError::InvalidPath {
            path: target.to_owned(),
            reason: reason.to_owned(),
        };

        let trimmed = target.trim_matches('/');
        if trimmed.is_empty() {
            return Err(invalid("empty wait-for target"));
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment"));
        }

        let (api_path, segments) = split_api_path(&segments);

        let (namespace, rest) = if segments.len() >= 3 && segments[0] == NAMESPACES_COLLECTION {
            (segments[1].to_owned(), &segments[2..])
        } else {
            (context_namespace(created).to_owned(), segments)
        };

        let (collection, name, whole_collection) = match rest {
            [collection] => (*collection, "", true),
            [collection, name] => (*collection, *name, false),
            _ => return Err(invalid("expected '<collection>' or '<collection>/<name>'")),
        };

        Ok(Self {
            raw: target.to_owned(),
            address: ResourceAddress::new(api_path, namespace, collection, name),
            whole_collection,
        })
    }

    /// The target as declared.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `true` when the target names a collection rather than one resource.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.whole_collection
    }

    /// Path polled while waiting.
    #[must_use]
    pub fn path(&self) -> String {
        if self.whole_collection {
            self.address.collection_path()
        } else {
            self.address.resource_path()
        }
    }
}

impl fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Splits an explicit `api/<version>` or `apis/<group>/<version>` prefix off
/// the target, leaving at least one segment behind.
fn split_api_path<'a, 'b>(segments: &'b [&'a str]) -> (String, &'b [&'a str]) {
    let prefix = match segments.first() {
        Some(&"api") if segments.len() > 2 => 2,
        Some(&"apis") if segments.len() > 3 => 3,
        _ => 0,
    };
    if prefix == 0 {
        (DEFAULT_API_PATH.to_owned(), segments)
    } else {
        (segments[..prefix].join("/"), &segments[prefix..])
    }
}

fn context_namespace(created: &ResourceAddress) -> &str {
    if created.is_namespace() {
        created.name()
    } else {
        created.namespace()
    }
}
