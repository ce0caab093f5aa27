//! Core library for Oiler.
//!
//! Turns compact operator input into backup request documents and adapter
//! registry entries, and applies dotted-path edits to stored documents.
//! This crate depends on `oiler-store` for the resource store and registry
//! traits and knows nothing about terminals, flags, or config files.

pub mod adapter;
pub mod backup;
pub mod error;
pub mod field_path;
pub mod spec;
