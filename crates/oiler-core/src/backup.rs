//! Backup request declarations.
//!
//! A backup request is a cluster-style resource document describing which
//! database to back up, where to put the dumps, how often, and how many to
//! keep. This module owns its shape ([`BackupRequest`]) and the operations
//! an operator performs on it through a [`ResourceStore`]:
//!
//! - create from compact spec strings ([`BackupRequests::create`])
//! - whole-document replace after a dotted-path edit ([`BackupRequests::update`])
//! - get, list, and delete by name
//!
//! Nothing here schedules or runs a backup; an external controller
//! reconciles the stored declarations and reports back through `status`.

use std::fmt;

use oiler_store::{Document, ResourceStore, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::BackupError;
use crate::field_path::{FieldPath, set_by_path};
use crate::spec::{
    SecretPrompt, SecretSource, parse_database_spec, parse_object_store_spec, split_assignment,
};

/// API version stamped on every backup request document.
pub const API_VERSION: &str = "backup.oiler.backup/v1";
/// Resource kind stamped on every backup request document.
pub const KIND: &str = "BackupRequest";
/// Schedule used when none is given: every minute.
pub const DEFAULT_SCHEDULE: &str = "*/1 * * * *";
/// Number of backups retained when none is given.
pub const DEFAULT_MAX_BACKUP_COUNT: u64 = 2;

const MAX_NAME_LEN: usize = 253;

/// Fields `update` refuses to touch. The version is owned by the store.
const IMMUTABLE_PATHS: &[&[&str]] = &[
    &["metadata"],
    &["metadata", "name"],
    &["metadata", "resourceVersion"],
];

/// A stored backup request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequest {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: BackupRequestSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BackupRequestStatus>,
}

/// Identity of a stored resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// What to back up, where to, and how often.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequestSpec {
    pub db_spec: DatabaseSpec,
    pub s3_spec: S3Spec,
    pub schedule: String,
    /// Number of historical backups to keep. `0` is passed through to the
    /// controller, which treats it as unbounded.
    pub max_backup_count: u64,
}

/// Database connection, including credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    pub db_type: String,
    pub uri: String,
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    pub db_name: String,
}

/// Object storage destination, including credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Spec {
    pub endpoint: String,
    pub bucket_name: String,
    #[serde(default)]
    pub auth: S3Auth,
}

/// Object storage credentials.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Auth {
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
}

/// State reported by the backup controller. Read-only from here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackupRequestStatus {
    #[serde(default)]
    pub status: String,
}

impl fmt::Debug for DatabaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSpec")
            .field("db_type", &self.db_type)
            .field("uri", &self.uri)
            .field("port", &self.port)
            .field("user", &"<redacted>")
            .field("pass", &"<redacted>")
            .field("db_name", &self.db_name)
            .finish()
    }
}

impl fmt::Debug for S3Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Auth")
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl BackupRequest {
    /// The resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// The controller-reported status, or an empty string.
    #[must_use]
    pub fn status_text(&self) -> &str {
        self.status.as_ref().map_or("", |s| s.status.as_str())
    }

    /// Serialize into a store document.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Malformed`] if serialization fails.
    pub fn to_document(&self) -> Result<Document, BackupError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(self.malformed("did not serialize to an object".to_owned())),
            Err(e) => Err(self.malformed(e.to_string())),
        }
    }

    /// Decode a store document.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Malformed`] if the document does not have the
    /// backup request shape.
    pub fn from_document(document: Document) -> Result<Self, BackupError> {
        let name = oiler_store::document_name(&document)
            .unwrap_or("<unnamed>")
            .to_owned();
        serde_json::from_value(Value::Object(document)).map_err(|e| BackupError::Malformed {
            name,
            reason: e.to_string(),
        })
    }

    fn malformed(&self, reason: String) -> BackupError {
        BackupError::Malformed {
            name: self.metadata.name.clone(),
            reason,
        }
    }
}

/// Everything needed to declare a new backup request.
///
/// Built once per invocation by the caller; nothing is shared between
/// invocations.
#[derive(Debug, Clone)]
pub struct NewBackupRequest {
    pub name: String,
    /// `<type>@<host>:<port>/<name>`
    pub database: String,
    /// `[<scheme>://]<address>/<bucket>`
    pub object_store: String,
    pub db_user: SecretSource,
    pub db_password: SecretSource,
    pub s3_access_key: SecretSource,
    pub s3_secret_key: SecretSource,
    pub schedule: String,
    pub max_backup_count: u64,
}

impl NewBackupRequest {
    /// A request with default schedule and retention and no credentials.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        database: impl Into<String>,
        object_store: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
            object_store: object_store.into(),
            db_user: SecretSource::Absent,
            db_password: SecretSource::Absent,
            s3_access_key: SecretSource::Absent,
            s3_secret_key: SecretSource::Absent,
            schedule: DEFAULT_SCHEDULE.to_owned(),
            max_backup_count: DEFAULT_MAX_BACKUP_COUNT,
        }
    }
}

/// Backup request operations against a resource store.
pub struct BackupRequests<S> {
    store: S,
}

impl<S: ResourceStore> BackupRequests<S> {
    /// Wrap a resource store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Parse the spec strings, capture credentials, and create the request.
    ///
    /// Both spec strings are parsed before any credential prompt, and
    /// nothing is submitted unless every step succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::InvalidName`], [`BackupError::Parse`], or
    /// [`BackupError::SecretInput`] before touching the store, and
    /// [`BackupError::AlreadyExists`] or [`BackupError::Store`] from the
    /// create itself.
    pub async fn create(
        &self,
        request: NewBackupRequest,
        prompt: &dyn SecretPrompt,
    ) -> Result<BackupRequest, BackupError> {
        validate_name(&request.name)?;
        let database = parse_database_spec(&request.database)?;
        let object_store = parse_object_store_spec(&request.object_store)?;

        let user = request
            .db_user
            .resolve("DB user", "Enter DB User: ", prompt)?;
        let pass = request
            .db_password
            .resolve("DB password", "Enter DB Password: ", prompt)?;
        let access_key = request
            .s3_access_key
            .resolve("S3 access key", "Enter S3 Access Key: ", prompt)?;
        let secret_key = request
            .s3_secret_key
            .resolve("S3 secret key", "Enter S3 Secret Key: ", prompt)?;

        let backup = BackupRequest {
            api_version: API_VERSION.to_owned(),
            kind: KIND.to_owned(),
            metadata: ObjectMeta {
                name: request.name,
                resource_version: None,
            },
            spec: BackupRequestSpec {
                db_spec: DatabaseSpec {
                    db_type: database.db_type,
                    uri: database.host,
                    port: database.port,
                    user,
                    pass,
                    db_name: database.db_name,
                },
                s3_spec: S3Spec {
                    endpoint: object_store.endpoint(),
                    bucket_name: object_store.bucket,
                    auth: S3Auth {
                        access_key,
                        secret_key,
                    },
                },
                schedule: request.schedule,
                max_backup_count: request.max_backup_count,
            },
            status: None,
        };

        let name = backup.metadata.name.clone();
        let stored = self
            .store
            .create(backup.to_document()?)
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists { .. } => BackupError::AlreadyExists { name: name.clone() },
                other => BackupError::Store(other),
            })?;
        info!(name = %name, "backup request created");
        BackupRequest::from_document(stored)
    }

    /// Fetch a backup request by name.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NotFound`] if it does not exist.
    pub async fn get(&self, name: &str) -> Result<BackupRequest, BackupError> {
        let document = self.fetch(name).await?;
        BackupRequest::from_document(document)
    }

    /// List every backup request in the store.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Store`] if listing fails and
    /// [`BackupError::Malformed`] if a stored document has the wrong shape.
    pub async fn list(&self) -> Result<Vec<BackupRequest>, BackupError> {
        let documents = self.store.list().await?;
        debug!(count = documents.len(), "listed backup requests");
        documents
            .into_iter()
            .map(BackupRequest::from_document)
            .collect()
    }

    /// Apply a `<field>=<value>` assignment and replace the whole document.
    ///
    /// The field is a dotted path with an optional type hint
    /// (`spec.maxBackupCount:int=5`). Without a hint the value takes the
    /// type of the field it replaces. Returns the stored document.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NotFound`] if the request does not exist,
    /// [`BackupError::FieldPath`] if the path does not resolve,
    /// [`BackupError::ImmutableField`] for `metadata.name`, and
    /// [`BackupError::Store`] (including version conflicts) from the update.
    pub async fn update(&self, name: &str, assignment: &str) -> Result<Document, BackupError> {
        let (field, raw) = split_assignment(assignment, "<field>=<value>")?;
        self.update_field(name, field, raw).await
    }

    /// Set one dotted field on a stored request and replace the whole
    /// document.
    ///
    /// # Errors
    ///
    /// See [`BackupRequests::update`].
    pub async fn update_field(
        &self,
        name: &str,
        field: &str,
        raw: &str,
    ) -> Result<Document, BackupError> {
        let path: FieldPath = field.parse()?;
        if IMMUTABLE_PATHS.iter().any(|fixed| path.is(fixed)) {
            return Err(BackupError::ImmutableField {
                path: path.to_string(),
            });
        }

        let mut document = self.fetch(name).await?;
        let value = path.coerce(raw, path.lookup(&document))?;
        set_by_path(&mut document, path.segments(), value)?;
        check_shape(name, &path, &document)?;

        let stored = self.store.update(document).await.map_err(|e| match e {
            StoreError::NotFound { .. } => BackupError::NotFound {
                name: name.to_owned(),
            },
            other => BackupError::Store(other),
        })?;
        info!(name = %name, field = %path, "backup request updated");
        Ok(stored)
    }

    /// Delete a backup request by name.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NotFound`] if it does not exist.
    pub async fn delete(&self, name: &str) -> Result<(), BackupError> {
        self.store.delete(name).await.map_err(|e| match e {
            StoreError::NotFound { .. } => BackupError::NotFound {
                name: name.to_owned(),
            },
            other => BackupError::Store(other),
        })?;
        info!(name = %name, "backup request deleted");
        Ok(())
    }

    async fn fetch(&self, name: &str) -> Result<Document, BackupError> {
        self.store
            .get(name)
            .await?
            .ok_or_else(|| BackupError::NotFound {
                name: name.to_owned(),
            })
    }
}

/// Re-decode an edited document. An update must never store something
/// `list` and `get` would reject.
fn check_shape(name: &str, path: &FieldPath, document: &Document) -> Result<(), BackupError> {
    let invalid = |reason: String| BackupError::InvalidUpdate {
        name: name.to_owned(),
        path: path.to_string(),
        reason,
    };
    let decoded = match BackupRequest::from_document(document.clone()) {
        Ok(decoded) => decoded,
        Err(BackupError::Malformed { reason, .. }) => return Err(invalid(reason)),
        Err(other) => return Err(other),
    };
    if decoded.spec.db_spec.port == 0 {
        return Err(invalid("port must be between 1 and 65535".to_owned()));
    }
    Ok(())
}

/// Check a name against the resource naming rules: lowercase alphanumerics,
/// `-` and `.`, starting and ending with an alphanumeric.
fn validate_name(name: &str) -> Result<(), BackupError> {
    let invalid = |reason: &str| BackupError::InvalidName {
        name: name.to_owned(),
        reason: reason.to_owned(),
    };
    if name.is_empty() {
        return Err(invalid("name is required"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name is longer than 253 characters"));
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.';
    if !name.chars().all(allowed) {
        return Err(invalid(
            "only lowercase letters, digits, '-' and '.' are allowed",
        ));
    }
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !name.starts_with(alnum) || !name.ends_with(alnum) {
        return Err(invalid("name must start and end with a letter or digit"));
    }
    Ok(())
}
