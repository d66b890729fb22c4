//! Cache entry management with sliding expiration

use crate::cache::types::FieldRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// A cached field list with its sliding expiration timer.
///
/// Expiration runs on tokio's monotonic clock so it follows a paused test
/// clock; wall-clock timestamps in [`CacheMetadata`] are informational only.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached value
    pub value: FieldRecord,

    /// Entry metadata
    pub metadata: CacheMetadata,

    /// Idle window
    sliding_expiration: Duration,

    /// Last read or write
    last_accessed: Instant,

    /// Position marker in the owning cache's LRU queue
    pub(crate) lru_stamp: u64,
}

impl CacheEntry {
    /// Create a new entry whose idle timer starts now
    pub fn new(value: FieldRecord, size: usize, sliding_expiration: Duration) -> Self {
        let now = Utc::now();

        Self {
            value,
            metadata: CacheMetadata {
                created_at: now,
                accessed_at: now,
                access_count: 0,
                size,
            },
            sliding_expiration,
            last_accessed: Instant::now(),
            lru_stamp: 0,
        }
    }

    /// Check if the entry has been idle for the whole window
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_accessed) >= self.sliding_expiration
    }

    /// Time left before the entry expires, if it is still live
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let idle = self.idle_time();
        if idle >= self.sliding_expiration {
            None
        } else {
            Some(self.sliding_expiration - idle)
        }
    }

    /// Mark the entry as accessed, restarting its idle timer
    pub fn mark_accessed(&mut self) {
        self.last_accessed = Instant::now();
        self.metadata.accessed_at = Utc::now();
        self.metadata.access_count += 1;
    }

    /// Time since the last read or write
    pub fn idle_time(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_accessed)
    }

    pub fn sliding_expiration(&self) -> Duration {
        self.sliding_expiration
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// Last access time
    pub accessed_at: DateTime<Utc>,

    /// Number of cache hits served by this entry
    pub access_count: u64,

    /// Size charged against the category's limit
    pub size: usize,
}

impl CacheMetadata {
    /// Age of the entry by wall clock
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }
}
