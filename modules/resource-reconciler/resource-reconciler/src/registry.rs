//! Registry of constructed clients, keyed by connection.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use resource_reconciler_sdk::{ReconcilerError, ResourceReconcilerClient};
use tracing::info;

use crate::config::{ConnectionConfig, ReconcilerConfig};

/// Shared clients, built at most once per key.
///
/// The registry is an ordinary value: the owner decides how long clients
/// live and tears them down with [`Self::remove`] or [`Self::clear`].
pub struct ClientRegistry<T: ?Sized> {
    clients: DashMap<String, Arc<T>>,
}

impl<T: ?Sized> Default for ClientRegistry<T> {
    fn default() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }
}

impl<T: ?Sized> ClientRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the client for `key`, building it with `factory` on first use.
    ///
    /// The key's entry stays locked while `factory` runs, so concurrent first
    /// uses of one key build one client. A failed build leaves the key empty.
    ///
    /// # Errors
    ///
    /// Whatever `factory` returns.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &str,
        factory: impl FnOnce() -> Result<Arc<T>, E>,
    ) -> Result<Arc<T>, E> {
        if let Some(client) = self.clients.get(key) {
            return Ok(Arc::clone(client.value()));
        }

        match self.clients.entry(key.to_owned()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let client = factory()?;
                entry.insert(Arc::clone(&client));
                Ok(client)
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`ReconcilerError::ClientNotFound`] if nothing is registered
    /// under `key`.
    pub fn get(&self, key: &str) -> Result<Arc<T>, ReconcilerError> {
        self.clients
            .get(key)
            .map(|client| Arc::clone(client.value()))
            .ok_or_else(|| ReconcilerError::ClientNotFound(key.to_owned()))
    }

    pub fn remove(&self, key: &str) -> Option<Arc<T>> {
        self.clients.remove(key).map(|(_, client)| client)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn clear(&self) {
        self.clients.clear();
    }
}

impl ClientRegistry<dyn ResourceReconcilerClient> {
    /// Client for `connection`, connecting on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcilerError::Transport`] if the transport cannot be built.
    pub fn get_or_connect(
        &self,
        connection: &ConnectionConfig,
        config: &ReconcilerConfig,
    ) -> Result<Arc<dyn ResourceReconcilerClient>, ReconcilerError> {
        self.get_or_try_insert_with(&connection.connection_key(), || {
            info!(api_server = %connection.api_server, "Connecting to API server");
            crate::connect(connection, config)
        })
    }
}
