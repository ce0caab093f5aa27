//! Adapter endpoint registry.
//!
//! Adapters are named URLs the backup controller uses to reach per-database
//! backup workers. They live together in a single registry document that is
//! created on the first write and afterwards always fetched, modified, and
//! rewritten as a whole.
//!
//! There is no version check on the registry: two concurrent writers can
//! lose one update.

use oiler_store::{KeyValueRegistry, Registry};
use tracing::info;

use crate::error::AdapterError;

/// Name of the registry document holding all adapters.
pub const REGISTRY_NAME: &str = "database-config";

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    pub name: String,
    pub url: String,
}

/// Outcome of [`AdapterRegistry::add_or_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterWrite {
    /// The registry did not exist and was created with this entry.
    CreatedRegistry,
    /// The entry was added to an existing registry.
    Added,
    /// An existing entry was replaced.
    Updated { previous: String },
}

/// Outcome of [`AdapterRegistry::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterRemoval {
    Removed { url: String },
    NotFound,
}

/// Adapter operations against a key-value registry.
pub struct AdapterRegistry<R> {
    registry: R,
}

impl<R: KeyValueRegistry> AdapterRegistry<R> {
    /// Wrap a key-value registry.
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    /// Insert or replace an adapter, creating the registry if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidEntry`] for an empty name or URL and
    /// [`AdapterError::Store`] if the registry cannot be read or written.
    pub async fn add_or_update(&self, name: &str, url: &str) -> Result<AdapterWrite, AdapterError> {
        if name.is_empty() {
            return Err(AdapterError::InvalidEntry {
                reason: "adapter name is required".to_owned(),
            });
        }
        if url.is_empty() {
            return Err(AdapterError::InvalidEntry {
                reason: format!("adapter '{name}' has an empty URL"),
            });
        }

        let Some(mut data) = self.registry.get(REGISTRY_NAME).await? else {
            let data = Registry::from([(name.to_owned(), url.to_owned())]);
            self.registry.create(REGISTRY_NAME, &data).await?;
            info!(adapter = %name, registry = REGISTRY_NAME, "created adapter registry");
            return Ok(AdapterWrite::CreatedRegistry);
        };

        let outcome = match data.insert(name.to_owned(), url.to_owned()) {
            Some(previous) => AdapterWrite::Updated { previous },
            None => AdapterWrite::Added,
        };
        self.registry.update(REGISTRY_NAME, &data).await?;
        info!(adapter = %name, registry = REGISTRY_NAME, "stored adapter");
        Ok(outcome)
    }

    /// Remove an adapter by name.
    ///
    /// An unknown name (or a registry that was never created) is reported
    /// as [`AdapterRemoval::NotFound`] and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Store`] if the registry cannot be read or
    /// written.
    pub async fn delete(&self, name: &str) -> Result<AdapterRemoval, AdapterError> {
        let Some(mut data) = self.registry.get(REGISTRY_NAME).await? else {
            return Ok(AdapterRemoval::NotFound);
        };
        let Some(url) = data.remove(name) else {
            return Ok(AdapterRemoval::NotFound);
        };
        self.registry.update(REGISTRY_NAME, &data).await?;
        info!(adapter = %name, registry = REGISTRY_NAME, "removed adapter");
        Ok(AdapterRemoval::Removed { url })
    }

    /// List all adapters, sorted by name. Empty if the registry was never
    /// created.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Store`] if the registry cannot be read.
    pub async fn list(&self) -> Result<Vec<Adapter>, AdapterError> {
        let data = self.registry.get(REGISTRY_NAME).await?.unwrap_or_default();
        Ok(data
            .into_iter()
            .map(|(name, url)| Adapter { name, url })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use oiler_store::MemoryBackend;

    #[tokio::test]
    async fn first_add_creates_registry_with_one_entry() {
        let store = MemoryBackend::new();
        let adapters = AdapterRegistry::new(store.clone());

        let outcome = adapters.add_or_update("n1", "u1").await.unwrap();
        assert_eq!(outcome, AdapterWrite::CreatedRegistry);
        let data = KeyValueRegistry::get(&store, REGISTRY_NAME).await.unwrap().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.get("n1").map(String::as_str), Some("u1"));
    }

    #[tokio::test]
    async fn second_add_keeps_both_entries() {
        let adapters = AdapterRegistry::new(MemoryBackend::new());
        adapters.add_or_update("n1", "u1").await.unwrap();
        let outcome = adapters.add_or_update("n2", "u2").await.unwrap();
        assert_eq!(outcome, AdapterWrite::Added);

        let listed = adapters.list().await.unwrap();
        assert_eq!(
            listed,
            vec![
                Adapter { name: "n1".to_owned(), url: "u1".to_owned() },
                Adapter { name: "n2".to_owned(), url: "u2".to_owned() },
            ]
        );
    }

    #[tokio::test]
    async fn add_existing_name_updates_in_place() {
        let adapters = AdapterRegistry::new(MemoryBackend::new());
        adapters.add_or_update("pg", "http://old").await.unwrap();
        let outcome = adapters.add_or_update("pg", "http://new").await.unwrap();
        assert_eq!(
            outcome,
            AdapterWrite::Updated {
                previous: "http://old".to_owned()
            }
        );
        let listed = adapters.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].url, "http://new");
    }

    #[tokio::test]
    async fn add_rejects_empty_entries() {
        let adapters = AdapterRegistry::new(MemoryBackend::new());
        assert!(matches!(
            adapters.add_or_update("", "http://x").await.unwrap_err(),
            AdapterError::InvalidEntry { .. }
        ));
        assert!(matches!(
            adapters.add_or_update("pg", "").await.unwrap_err(),
            AdapterError::InvalidEntry { .. }
        ));
    }

    #[tokio::test]
    async fn delete_removes_only_named_entry() {
        let adapters = AdapterRegistry::new(MemoryBackend::new());
        adapters.add_or_update("n1", "u1").await.unwrap();
        adapters.add_or_update("n2", "u2").await.unwrap();

        let removed = adapters.delete("n1").await.unwrap();
        assert_eq!(removed, AdapterRemoval::Removed { url: "u1".to_owned() });
        let listed = adapters.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "n2");
    }

    #[tokio::test]
    async fn delete_unknown_name_does_not_mutate() {
        let store = MemoryBackend::new();
        let adapters = AdapterRegistry::new(store.clone());
        adapters.add_or_update("n1", "u1").await.unwrap();
        let before = KeyValueRegistry::get(&store, REGISTRY_NAME).await.unwrap();

        let outcome = adapters.delete("ghost").await.unwrap();
        assert_eq!(outcome, AdapterRemoval::NotFound);
        let after = KeyValueRegistry::get(&store, REGISTRY_NAME).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn missing_registry_lists_empty_and_deletes_nothing() {
        let store = MemoryBackend::new();
        let adapters = AdapterRegistry::new(store.clone());
        assert!(adapters.list().await.unwrap().is_empty());
        assert_eq!(adapters.delete("n1").await.unwrap(), AdapterRemoval::NotFound);
        assert!(KeyValueRegistry::get(&store, REGISTRY_NAME).await.unwrap().is_none());
    }
}
