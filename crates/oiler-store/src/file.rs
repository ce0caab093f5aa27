//! JSON-file backend.
//!
//! Each resource document lives in `<root>/resources/<name>.json` and each
//! registry in `<root>/registries/<registry>.json`. Writes go to a sibling
//! temporary file that is then renamed over the target, so a reader never
//! observes a half-written document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    Document, KeyValueRegistry, Registry, ResourceStore, StoreError, advance_version,
    document_name,
};

const RESOURCES_DIR: &str = "resources";
const REGISTRIES_DIR: &str = "registries";

/// A resource store and registry persisted as JSON files.
///
/// Mutations are serialized through an in-process lock; separate processes
/// writing the same root rely on the resource version check.
///
/// # Examples
///
/// ```no_run
/// # use oiler_store::FileBackend;
/// let backend = FileBackend::new("/home/me/.oiler/store/default");
/// ```
#[derive(Clone)]
pub struct FileBackend {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FileBackend {
    /// Create a backend rooted at `root`. Directories are created lazily on
    /// the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Return the root directory of this backend.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resource_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_key(name)?;
        Ok(self.root.join(RESOURCES_DIR).join(format!("{name}.json")))
    }

    fn registry_path(&self, registry: &str) -> Result<PathBuf, StoreError> {
        validate_key(registry)?;
        Ok(self.root.join(REGISTRIES_DIR).join(format!("{registry}.json")))
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let reason = if key.is_empty() {
        Some("name is empty")
    } else if key.contains(['/', '\\']) {
        Some("name contains a path separator")
    } else if key.starts_with('.') {
        Some("name starts with '.'")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StoreError::InvalidKey {
            key: key.to_owned(),
            reason: reason.to_owned(),
        }),
        None => Ok(()),
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::Read {
                key: path.display().to_string(),
                reason: e.to_string(),
            });
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::Read {
            key: path.display().to_string(),
            reason: format!("malformed JSON: {e}"),
        })
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let write_err = |reason: String| StoreError::Write {
        key: path.display().to_string(),
        reason,
    };
    let data = serde_json::to_vec_pretty(value).map_err(|e| write_err(e.to_string()))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| write_err(e.to_string()))?;
    }
    let tmp = path.with_extension(format!("json.tmp-{}", std::process::id()));
    tokio::fs::write(&tmp, &data)
        .await
        .map_err(|e| write_err(e.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| write_err(e.to_string()))
}

#[async_trait::async_trait]
impl ResourceStore for FileBackend {
    async fn get(&self, name: &str) -> Result<Option<Document>, StoreError> {
        let path = self.resource_path(name)?;
        debug!(path = %path.display(), "reading resource");
        read_json(&path).await
    }

    async fn create(&self, mut document: Document) -> Result<Document, StoreError> {
        let name = document_name(&document)?.to_owned();
        let path = self.resource_path(&name)?;
        let _guard = self.write_lock.lock().await;
        if read_json::<Document>(&path).await?.is_some() {
            return Err(StoreError::AlreadyExists { name });
        }
        advance_version(&name, &mut document, None)?;
        write_json(&path, &document).await?;
        debug!(path = %path.display(), "created resource");
        Ok(document)
    }

    async fn update(&self, mut document: Document) -> Result<Document, StoreError> {
        let name = document_name(&document)?.to_owned();
        let path = self.resource_path(&name)?;
        let _guard = self.write_lock.lock().await;
        let stored = read_json::<Document>(&path)
            .await?
            .ok_or_else(|| StoreError::NotFound { name: name.clone() })?;
        advance_version(&name, &mut document, Some(&stored))?;
        write_json(&path, &document).await?;
        debug!(path = %path.display(), "replaced resource");
        Ok(document)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.resource_path(name)?;
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                name: name.to_owned(),
            }),
            Err(e) => Err(StoreError::Delete {
                key: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        let dir = self.root.join(RESOURCES_DIR);
        let list_err = |e: std::io::Error| StoreError::List {
            prefix: dir.display().to_string(),
            reason: e.to_string(),
        };
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(list_err(e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            // A file removed between read_dir and read is simply skipped.
            if let Some(document) = read_json::<Document>(&path).await? {
                documents.push(document);
            }
        }
        Ok(documents)
    }
}

#[async_trait::async_trait]
impl KeyValueRegistry for FileBackend {
    async fn get(&self, registry: &str) -> Result<Option<Registry>, StoreError> {
        let path = self.registry_path(registry)?;
        debug!(path = %path.display(), "reading registry");
        read_json(&path).await
    }

    async fn create(&self, registry: &str, data: &Registry) -> Result<(), StoreError> {
        let path = self.registry_path(registry)?;
        let _guard = self.write_lock.lock().await;
        if read_json::<Registry>(&path).await?.is_some() {
            return Err(StoreError::AlreadyExists {
                name: registry.to_owned(),
            });
        }
        write_json(&path, data).await
    }

    async fn update(&self, registry: &str, data: &Registry) -> Result<(), StoreError> {
        let path = self.registry_path(registry)?;
        let _guard = self.write_lock.lock().await;
        if read_json::<Registry>(&path).await?.is_none() {
            return Err(StoreError::NotFound {
                name: registry.to_owned(),
            });
        }
        write_json(&path, data).await
    }
}
