//! Process-wide reader lookup.
//!
//! Logical reader ids are case-insensitive: every id is normalized once at
//! the boundary by [`normalize_id`] on both insert and lookup. A secondary
//! index maps (address, port) to the owning id so that a socket opened by a
//! reader can be matched to its configuration.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::ReaderConnection;
use tagwire_core::{Error, Result};

/// Canonical form of a logical reader id.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_uppercase()
}

fn normalize_endpoint(address: &str, port: u16) -> (String, u16) {
    (address.trim().to_lowercase(), port)
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Normalized id.
    pub id: String,
    pub address: String,
    pub port: u16,
    pub connection: ReaderConnection,
}

/// Concurrent table of configured readers.
///
/// # Example
///
/// ```
/// use tagwire_network::{ReaderConnection, ReaderRegistry};
///
/// let registry = ReaderRegistry::new();
/// registry
///     .insert("ReaderA", "10.0.0.5", 5084, ReaderConnection::new("ReaderA"))
///     .unwrap();
///
/// assert!(registry.contains("readera"));
/// assert_eq!(registry.find_by_endpoint("10.0.0.5", 5084).as_deref(), Some("READERA"));
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ReaderRegistry {
    entries: DashMap<String, RegistryEntry>,
    endpoints: DashMap<(String, u16), String>,
}

static GLOBAL: OnceLock<Arc<ReaderRegistry>> = OnceLock::new();

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by the whole process.
    pub fn global() -> Arc<ReaderRegistry> {
        GLOBAL.get_or_init(|| Arc::new(ReaderRegistry::new())).clone()
    }

    /// Add or replace the entry for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEndpoint`] if (address, port) already belongs
    /// to a different reader. The registry is left unchanged.
    pub fn insert(
        &self,
        id: &str,
        address: &str,
        port: u16,
        connection: ReaderConnection,
    ) -> Result<()> {
        let key = normalize_id(id);
        let endpoint = normalize_endpoint(address, port);

        match self.endpoints.entry(endpoint.clone()) {
            Entry::Occupied(owner) if owner.get() != &key => {
                return Err(Error::DuplicateEndpoint {
                    address: endpoint.0,
                    port,
                    owner: owner.get().clone(),
                });
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(key.clone());
            }
        }

        let entry = RegistryEntry {
            id: key.clone(),
            address: address.trim().to_string(),
            port,
            connection,
        };

        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            let old = normalize_endpoint(&previous.address, previous.port);
            if old != endpoint {
                self.endpoints.remove_if(&old, |_, owner| owner == &key);
                debug!(reader = %key, "Moved reader to {}:{}", endpoint.0, port);
            }
        } else {
            info!(reader = %key, "Registered reader at {}:{}", endpoint.0, port);
        }

        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<RegistryEntry> {
        self.entries.get(&normalize_id(id)).map(|e| e.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(&normalize_id(id))
    }

    pub fn remove(&self, id: &str) -> Option<RegistryEntry> {
        let key = normalize_id(id);
        let (_, entry) = self.entries.remove(&key)?;
        let endpoint = normalize_endpoint(&entry.address, entry.port);
        self.endpoints.remove_if(&endpoint, |_, owner| owner == &key);
        debug!(reader = %key, "Removed reader");
        Some(entry)
    }

    /// Normalized ids of all registered readers, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id of the reader configured at (address, port).
    pub fn find_by_endpoint(&self, address: &str, port: u16) -> Option<String> {
        self.endpoints
            .get(&normalize_endpoint(address, port))
            .map(|owner| owner.value().clone())
    }

    pub fn connection_by_endpoint(&self, address: &str, port: u16) -> Option<ReaderConnection> {
        let id = self.find_by_endpoint(address, port)?;
        self.entries.get(&id).map(|e| e.connection.clone())
    }
}
