//! Storage abstraction for Oiler.
//!
//! This crate defines the two collaborators the control-plane client talks
//! to, and knows nothing about backups, databases, or adapters:
//!
//! - [`ResourceStore`] — named structured documents (create/get/list/update/delete),
//!   keyed by `metadata.name`.
//! - [`KeyValueRegistry`] — flat string-to-string mappings addressed by a
//!   registry name.
//!
//! Two implementations are provided:
//!
//! - [`FileBackend`] — JSON files under a root directory, atomic writes
//! - [`MemoryBackend`] — in-memory, for testing only

mod error;
mod file;
mod memory;

use std::collections::BTreeMap;

pub use error::StoreError;
pub use file::FileBackend;
pub use memory::MemoryBackend;

/// An arbitrary structured resource document.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A flat registry mapping. Ordered by key so listings are deterministic.
pub type Registry = BTreeMap<String, String>;

/// A pluggable store of named resource documents.
///
/// Documents are addressed by `metadata.name`. Every successful create or
/// update stamps `metadata.resourceVersion`; an update whose version does
/// not match the stored one is rejected with [`StoreError::Conflict`], so a
/// get-modify-update cycle never silently overwrites a concurrent writer.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync + 'static {
    /// Fetch a document by name.
    ///
    /// Returns `Ok(None)` if no document has that name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the underlying backend fails.
    async fn get(&self, name: &str) -> Result<Option<Document>, StoreError>;

    /// Create a new document and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the name is taken and
    /// [`StoreError::InvalidDocument`] if `metadata.name` is missing.
    async fn create(&self, document: Document) -> Result<Document, StoreError>;

    /// Replace an existing document as a whole and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the name is absent and
    /// [`StoreError::Conflict`] if the submitted version is stale.
    async fn update(&self, document: Document) -> Result<Document, StoreError>;

    /// Delete a document by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the name is absent.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Return every stored document, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::List`] if the underlying backend fails.
    async fn list(&self) -> Result<Vec<Document>, StoreError>;
}

/// A pluggable store of flat string registries.
///
/// Registries are always fetched, modified, and fully rewritten; there is
/// no per-entry API and no version check on update.
#[async_trait::async_trait]
pub trait KeyValueRegistry: Send + Sync + 'static {
    /// Fetch a registry by name. Returns `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the underlying backend fails.
    async fn get(&self, registry: &str) -> Result<Option<Registry>, StoreError>;

    /// Create a registry with initial contents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the registry exists.
    async fn create(&self, registry: &str, data: &Registry) -> Result<(), StoreError>;

    /// Replace a registry's contents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the registry does not exist.
    async fn update(&self, registry: &str, data: &Registry) -> Result<(), StoreError>;
}

/// Extract `metadata.name` from a document.
///
/// # Errors
///
/// Returns [`StoreError::InvalidDocument`] if the field is missing, not a
/// string, or empty.
pub fn document_name(document: &Document) -> Result<&str, StoreError> {
    document
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(serde_json::Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| StoreError::InvalidDocument {
            reason: "metadata.name is missing or empty".to_owned(),
        })
}

/// Read `metadata.resourceVersion`, if present.
pub fn resource_version(document: &Document) -> Option<&str> {
    document
        .get("metadata")
        .and_then(|m| m.get("resourceVersion"))
        .and_then(serde_json::Value::as_str)
}

/// Check a submitted document against the stored one and stamp the next
/// version onto the submitted document.
///
/// A submitted document without a version is treated as a blind write.
pub(crate) fn advance_version(
    name: &str,
    submitted: &mut Document,
    stored: Option<&Document>,
) -> Result<(), StoreError> {
    let current = stored.and_then(resource_version).unwrap_or("0").to_owned();
    if let Some(version) = resource_version(submitted) {
        if version != current {
            return Err(StoreError::Conflict {
                name: name.to_owned(),
                submitted: version.to_owned(),
                stored: current,
            });
        }
    }
    let next = current.parse::<u64>().unwrap_or(0).saturating_add(1);
    if let Some(serde_json::Value::Object(metadata)) = submitted.get_mut("metadata") {
        metadata.insert(
            "resourceVersion".to_owned(),
            serde_json::Value::String(next.to_string()),
        );
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    #[test]
    fn document_name_reads_metadata() {
        let d = doc(json!({ "metadata": { "name": "nightly" } }));
        assert_eq!(document_name(&d).unwrap(), "nightly");
    }

    #[test]
    fn document_name_rejects_missing_and_empty() {
        assert!(document_name(&doc(json!({}))).is_err());
        assert!(document_name(&doc(json!({ "metadata": { "name": "" } }))).is_err());
        assert!(document_name(&doc(json!({ "metadata": { "name": 7 } }))).is_err());
    }

    #[test]
    fn advance_version_stamps_first_version() {
        let mut d = doc(json!({ "metadata": { "name": "a" } }));
        advance_version("a", &mut d, None).unwrap();
        assert_eq!(resource_version(&d), Some("1"));
    }

    #[test]
    fn advance_version_rejects_stale_submission() {
        let stored = doc(json!({ "metadata": { "name": "a", "resourceVersion": "3" } }));
        let mut d = doc(json!({ "metadata": { "name": "a", "resourceVersion": "2" } }));
        let err = advance_version("a", &mut d, Some(&stored)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn advance_version_increments_matching_submission() {
        let stored = doc(json!({ "metadata": { "name": "a", "resourceVersion": "3" } }));
        let mut d = doc(json!({ "metadata": { "name": "a", "resourceVersion": "3" } }));
        advance_version("a", &mut d, Some(&stored)).unwrap();
        assert_eq!(resource_version(&d), Some("4"));
    }
}
