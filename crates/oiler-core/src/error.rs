//! Error types for `oiler-core`.
//!
//! Each error variant carries enough context to diagnose the problem without
//! a debugger. Credential values never appear in messages, only the name of
//! the field they belong to.

use oiler_store::StoreError;

/// Errors from decoding compact spec strings.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    /// The string does not match the expected grammar.
    #[error("invalid {flag} format '{input}', use {expected}")]
    InvalidSpecFormat {
        flag: &'static str,
        input: String,
        expected: &'static str,
    },

    /// The port component is not a valid port number.
    #[error("port '{value}' is not a valid port number (1-65535)")]
    InvalidPort { value: String },

    /// A `<key>=<value>` argument had no `=` or an empty key.
    #[error("invalid argument '{input}', use {expected}")]
    InvalidAssignment {
        input: String,
        expected: &'static str,
    },
}

/// Errors from dotted field-path parsing, coercion, and mutation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FieldPathError {
    /// The path has no segments.
    #[error("field path is empty")]
    Empty,

    /// The path contains an empty segment (`a..b`, leading or trailing `.`).
    #[error("field path '{path}' contains an empty segment")]
    EmptySegment { path: String },

    /// The type hint after `:` is not recognised.
    #[error("unknown type hint '{hint}' (expected str, int, float, bool, or json)")]
    UnknownHint { hint: String },

    /// An intermediate segment is absent or not a nested mapping.
    #[error("field path does not exist: {path}")]
    Unresolved { path: String },

    /// The raw value cannot be converted to the requested type.
    #[error("value for '{path}' is not a valid {expected}")]
    InvalidValue { path: String, expected: &'static str },
}

/// Errors from backup request operations.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// The backup request name is unusable.
    #[error("invalid backup request name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// A spec string could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A dotted field update could not be applied.
    #[error(transparent)]
    FieldPath(#[from] FieldPathError),

    /// No backup request with this name exists.
    #[error("backup request '{name}' not found")]
    NotFound { name: String },

    /// A backup request with this name already exists.
    #[error("backup request '{name}' already exists")]
    AlreadyExists { name: String },

    /// The field is fixed after creation.
    #[error("field '{path}' cannot be changed after creation")]
    ImmutableField { path: String },

    /// A field update would leave the document outside the backup request
    /// shape. Nothing is written.
    #[error("cannot set '{path}' on backup request '{name}': {reason}")]
    InvalidUpdate {
        name: String,
        path: String,
        reason: String,
    },

    /// Interactive credential capture failed.
    #[error("failed to read {field}: {reason}")]
    SecretInput { field: &'static str, reason: String },

    /// A stored document does not have the backup request shape.
    #[error("backup request '{name}' is malformed: {reason}")]
    Malformed { name: String, reason: String },

    /// The resource store returned an error.
    #[error("backup store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from adapter registry operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The adapter name or URL is empty.
    #[error("invalid adapter entry: {reason}")]
    InvalidEntry { reason: String },

    /// The registry store returned an error.
    #[error("adapter registry error: {0}")]
    Store(#[from] StoreError),
}
