//! Error types for ShardMeta
//!
//! This module defines the common error type used throughout the system.
//! Every failure is scoped to the administrative operation that triggered
//! it; nothing here is fatal to the process.

use thiserror::Error;

/// Common result type for ShardMeta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for ShardMeta
#[derive(Debug, Error)]
pub enum Error {
    // Repository errors
    #[error("repository error: {0}")]
    Repository(String),

    #[error("invalid version '{value}' under {path}")]
    InvalidVersion { path: String, value: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    // Metadata errors
    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("schema not found: {database}.{schema}")]
    SchemaNotFound { database: String, schema: String },

    #[error("rule '{rule}' not found in database {database}")]
    RuleNotFound { database: String, rule: String },

    // Resource errors
    #[error("failed to open storage unit {storage_unit}: {reason}")]
    ResourceOpen {
        storage_unit: String,
        reason: String,
    },

    #[error("failed to close data source: {0}")]
    ResourceClose(String),

    #[error("storage units already registered: {}", .0.join(", "))]
    DuplicateStorageUnit(Vec<String>),

    // Cluster errors
    #[error("database {database} was not reloaded within {waited_ms} ms")]
    ReloadTimeout { database: String, waited_ms: u64 },

    // Internal errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a repository error
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a resource open error
    pub fn resource_open(storage_unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceOpen {
            storage_unit: storage_unit.into(),
            reason: reason.into(),
        }
    }

    /// Check if the failed operation can be repeated as-is.
    ///
    /// Persisting the same properties twice converges to the same final
    /// state and version switches are idempotent, so repository failures
    /// and reload timeouts are safe to retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Repository(_) | Self::ReloadTimeout { .. })
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DatabaseNotFound(_) | Self::SchemaNotFound { .. } | Self::RuleNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
