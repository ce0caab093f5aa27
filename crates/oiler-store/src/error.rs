//! Storage error types.
//!
//! Every error variant carries enough context to diagnose the problem
//! without a debugger. Document contents never appear in messages, only
//! names and keys.

/// Errors that can occur during resource store or registry operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The named document or registry does not exist.
    #[error("'{name}' not found")]
    NotFound { name: String },

    /// A document or registry with this name already exists.
    #[error("'{name}' already exists")]
    AlreadyExists { name: String },

    /// The submitted document was based on a stale version.
    #[error("conflict on '{name}': submitted version {submitted}, stored version {stored}")]
    Conflict {
        name: String,
        submitted: String,
        stored: String,
    },

    /// The document is structurally unusable (missing `metadata.name`, etc.).
    #[error("invalid document: {reason}")]
    InvalidDocument { reason: String },

    /// A name cannot be used as a storage key.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Failed to read a value from storage.
    #[error("failed to read '{key}': {reason}")]
    Read { key: String, reason: String },

    /// Failed to write a value to storage.
    #[error("failed to write '{key}': {reason}")]
    Write { key: String, reason: String },

    /// Failed to delete a value from storage.
    #[error("failed to delete '{key}': {reason}")]
    Delete { key: String, reason: String },

    /// Failed to enumerate stored documents.
    #[error("failed to list '{prefix}': {reason}")]
    List { prefix: String, reason: String },
}
