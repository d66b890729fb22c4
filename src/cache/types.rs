//! Core type definitions for the cache system

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Custom field grouping. The set is closed; every per-category structure is
/// an array indexed by [`CacheCategory::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheCategory {
    Project,
    Task,
    Resource,
    Client,
}

impl CacheCategory {
    /// Number of categories
    pub const COUNT: usize = 4;

    /// All categories, ordered by index
    pub const ALL: [CacheCategory; Self::COUNT] = [
        CacheCategory::Project,
        CacheCategory::Task,
        CacheCategory::Resource,
        CacheCategory::Client,
    ];

    /// Position of this category in per-category arrays
    pub const fn index(self) -> usize {
        match self {
            CacheCategory::Project => 0,
            CacheCategory::Task => 1,
            CacheCategory::Resource => 2,
            CacheCategory::Client => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Project => "project",
            CacheCategory::Task => "task",
            CacheCategory::Resource => "resource",
            CacheCategory::Client => "client",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheCategory {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        CacheCategory::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CacheError::InvalidCategory(s.to_string()))
    }
}

/// Legacy integer discriminants (Project = 0 .. Client = 3)
impl TryFrom<i32> for CacheCategory {
    type Error = CacheError;

    fn try_from(value: i32) -> Result<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|index| CacheCategory::ALL.get(index).copied())
            .ok_or_else(|| CacheError::InvalidCategory(value.to_string()))
    }
}

/// Identifier of the tenant (company) whose entries are cached.
///
/// Always non-empty: the only constructors validate their input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantKey(Arc<str>);

impl TenantKey {
    /// Create a tenant key, rejecting empty or blank identifiers
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref();
        if id.trim().is_empty() {
            return Err(CacheError::InvalidTenant(
                "tenant identifier must not be empty".to_string(),
            ));
        }
        Ok(Self(Arc::from(id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantKey {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self> {
        TenantKey::new(value)
    }
}

impl From<TenantKey> for String {
    fn from(key: TenantKey) -> Self {
        key.0.to_string()
    }
}

/// A single custom field descriptor.
///
/// Besides `id` and `name` the cache treats the payload as opaque; any other
/// attributes travel in `attributes` and are flattened in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: u64,

    pub name: String,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl CustomField {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            attributes: Map::new(),
        }
    }

    /// Attach an extra attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Cached field list. Shared on hits, replaced wholesale on refresh.
pub type FieldRecord = Arc<Vec<CustomField>>;

/// Statistics for one category cache
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,

    /// Lookups that found no live entry
    pub misses: u64,

    /// Number of entries currently in cache
    pub entries: usize,

    /// Sum of entry sizes currently in cache
    pub total_size: usize,

    /// Backing fetches started
    pub fetches: u64,

    /// Backing fetches that failed
    pub fetch_failures: u64,

    /// Fetched values not stored because the tenant was invalidated meanwhile
    pub discarded_fills: u64,

    /// Number of evictions due to the size limit
    pub evictions_capacity: u64,

    /// Number of evictions due to sliding expiration
    pub evictions_expired: u64,

    /// Number of explicit invalidations that removed an entry
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    /// Calculate total evictions
    pub fn total_evictions(&self) -> u64 {
        self.evictions_capacity + self.evictions_expired
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, size: {}, fetches: {}, evictions: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.total_size,
            self.fetches,
            self.total_evictions()
        )
    }
}
