//! In-memory backend for testing.
//!
//! Stores resource documents and registries in `BTreeMap`s behind a
//! `RwLock`. Nothing is persisted; all data is lost when the process exits.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    Document, KeyValueRegistry, Registry, ResourceStore, StoreError, advance_version,
    document_name,
};

#[derive(Debug, Default)]
struct Inner {
    resources: BTreeMap<String, Document>,
    registries: BTreeMap<String, Registry>,
}

/// An in-memory resource store and registry.
///
/// Thread-safe and async-compatible. Clones share state.
///
/// # Examples
///
/// ```
/// # use oiler_store::{KeyValueRegistry, MemoryBackend, Registry};
/// # #[tokio::main]
/// # async fn main() {
/// let backend = MemoryBackend::new();
/// let data = Registry::from([("pg".to_owned(), "http://pg:8080".to_owned())]);
/// backend.create("database-config", &data).await.unwrap();
/// assert_eq!(backend.get("database-config").await.unwrap(), Some(data));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ResourceStore for MemoryBackend {
    async fn get(&self, name: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.resources.get(name).cloned())
    }

    async fn create(&self, mut document: Document) -> Result<Document, StoreError> {
        let name = document_name(&document)?.to_owned();
        let mut inner = self.inner.write().await;
        if inner.resources.contains_key(&name) {
            return Err(StoreError::AlreadyExists { name });
        }
        advance_version(&name, &mut document, None)?;
        inner.resources.insert(name, document.clone());
        Ok(document)
    }

    async fn update(&self, mut document: Document) -> Result<Document, StoreError> {
        let name = document_name(&document)?.to_owned();
        let mut inner = self.inner.write().await;
        let stored = inner
            .resources
            .get(&name)
            .ok_or_else(|| StoreError::NotFound { name: name.clone() })?;
        advance_version(&name, &mut document, Some(stored))?;
        inner.resources.insert(name, document.clone());
        Ok(document)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .resources
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_owned(),
            })
    }

    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.resources.values().cloned().collect())
    }
}

#[async_trait::async_trait]
impl KeyValueRegistry for MemoryBackend {
    async fn get(&self, registry: &str) -> Result<Option<Registry>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.registries.get(registry).cloned())
    }

    async fn create(&self, registry: &str, data: &Registry) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.registries.contains_key(registry) {
            return Err(StoreError::AlreadyExists {
                name: registry.to_owned(),
            });
        }
        inner.registries.insert(registry.to_owned(), data.clone());
        Ok(())
    }

    async fn update(&self, registry: &str, data: &Registry) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .registries
            .get_mut(registry)
            .ok_or_else(|| StoreError::NotFound {
                name: registry.to_owned(),
            })?;
        slot.clone_from(data);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resource_version;
    use serde_json::json;

    fn named(name: &str) -> Document {
        match json!({ "metadata": { "name": name }, "spec": { "schedule": "* * * * *" } }) {
            serde_json::Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let backend = MemoryBackend::new();
        let result = ResourceStore::get(&backend, "nope").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let backend = MemoryBackend::new();
        let created = ResourceStore::create(&backend, named("a")).await.unwrap();
        assert_eq!(resource_version(&created), Some("1"));
        let fetched = ResourceStore::get(&backend, "a").await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn create_duplicate_fails() {
        let backend = MemoryBackend::new();
        ResourceStore::create(&backend, named("a")).await.unwrap();
        let err = ResourceStore::create(&backend, named("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn create_without_name_fails() {
        let backend = MemoryBackend::new();
        let err = ResourceStore::create(&backend, Document::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument { .. }));
    }

    #[tokio::test]
    async fn update_missing_fails() {
        let backend = MemoryBackend::new();
        let err = ResourceStore::update(&backend, named("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_with_stale_version_conflicts() {
        let backend = MemoryBackend::new();
        let first = ResourceStore::create(&backend, named("a")).await.unwrap();
        let second = first.clone();
        ResourceStore::update(&backend, first).await.unwrap();
        let err = ResourceStore::update(&backend, second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn delete_removes_and_reports_missing() {
        let backend = MemoryBackend::new();
        ResourceStore::create(&backend, named("a")).await.unwrap();
        ResourceStore::delete(&backend, "a").await.unwrap();
        let err = ResourceStore::delete(&backend, "a").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_is_ordered_by_name() {
        let backend = MemoryBackend::new();
        ResourceStore::create(&backend, named("b")).await.unwrap();
        ResourceStore::create(&backend, named("a")).await.unwrap();
        let names: Vec<String> = ResourceStore::list(&backend)
            .await
            .unwrap()
            .iter()
            .map(|d| document_name(d).unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn registry_create_update_get() {
        let backend = MemoryBackend::new();
        let mut data = Registry::from([("n1".to_owned(), "u1".to_owned())]);
        KeyValueRegistry::create(&backend, "reg", &data).await.unwrap();
        data.insert("n2".to_owned(), "u2".to_owned());
        KeyValueRegistry::update(&backend, "reg", &data).await.unwrap();
        let fetched = KeyValueRegistry::get(&backend, "reg").await.unwrap();
        assert_eq!(fetched, Some(data));
    }

    #[tokio::test]
    async fn registry_update_missing_fails() {
        let backend = MemoryBackend::new();
        let err = KeyValueRegistry::update(&backend, "reg", &Registry::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();
        ResourceStore::create(&backend, named("a")).await.unwrap();
        assert!(ResourceStore::get(&clone, "a").await.unwrap().is_some());
    }
}
