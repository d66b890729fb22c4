//! Error types for custom field cache operations
//!
//! Fetch failures keep the collaborator's original error as their source so
//! callers can still downcast to it.

use crate::cache::types::CacheCategory;
use thiserror::Error;

/// Main error type for cache and orchestrator operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Unknown category name or discriminant
    #[error("Invalid custom field category: {0}")]
    InvalidCategory(String),

    /// Empty or malformed tenant identifier
    #[error("Invalid tenant key: {0}")]
    InvalidTenant(String),

    /// The tenant context provider could not resolve a tenant
    #[error("Tenant context unavailable: {0}")]
    TenantUnavailable(String),

    /// The backing data source failed; nothing was cached
    #[error("Failed to fetch {category} custom fields for tenant {tenant}")]
    FetchFailure {
        category: CacheCategory,
        tenant: String,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CacheError {
    /// Returns true if the error came from the backing data source
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, CacheError::FetchFailure { .. })
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
