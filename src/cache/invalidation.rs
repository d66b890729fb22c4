//! Reasons and events for entry removal

use crate::cache::types::{CacheCategory, TenantKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an entry left the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Idle for the whole sliding window
    Expired,

    /// Removed for one category
    Manual,

    /// Removed from every category for the tenant
    TenantWide,

    /// Whole cache cleared
    Cleared,
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::Expired => write!(f, "sliding expiration elapsed"),
            InvalidationReason::Manual => write!(f, "manual invalidation"),
            InvalidationReason::TenantWide => write!(f, "tenant-wide invalidation"),
            InvalidationReason::Cleared => write!(f, "cache cleared"),
        }
    }
}

/// Record of entries removed from one category cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Category the entries belonged to
    pub category: CacheCategory,

    /// Reason for invalidation
    pub reason: InvalidationReason,

    /// When the invalidation occurred
    pub timestamp: DateTime<Utc>,

    /// Tenants whose entries were removed
    pub tenants: Vec<TenantKey>,

    /// Additional context
    pub context: Option<String>,
}

impl InvalidationEvent {
    pub fn new(category: CacheCategory, reason: InvalidationReason, tenants: Vec<TenantKey>) -> Self {
        Self {
            category,
            reason,
            timestamp: Utc::now(),
            tenants,
            context: None,
        }
    }

    /// Add context to the event
    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}
