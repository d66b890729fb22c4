//! Configuration for the cache system

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by the four category caches.
///
/// Each category gets its own size budget of `size_limit`; categories never
/// borrow capacity from each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum total size of one category cache.
    /// With the default entry size of 1 this is the entry count per category.
    pub size_limit: usize,

    /// Size charged for each cached field list
    pub entry_size: usize,

    /// Idle window after which an entry expires. Reset on every read.
    pub sliding_expiration: Duration,

    /// Collapse concurrent misses for the same tenant and category into one fetch
    pub single_flight: bool,

    /// Enable the periodic sweep of expired entries
    pub enable_auto_cleanup: bool,

    /// Interval for the expired entry sweep
    pub cleanup_interval: Duration,

    /// Enable hit/miss/fetch counters
    pub enable_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_limit: 1024,
            entry_size: 1,
            sliding_expiration: Duration::from_secs(60),
            single_flight: true,
            enable_auto_cleanup: false,
            // Sweep every 5 minutes
            cleanup_interval: Duration::from_secs(300),
            enable_metrics: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.size_limit == 0 {
            return Err("size_limit must be greater than 0".to_string());
        }

        if self.entry_size == 0 {
            return Err("entry_size must be greater than 0".to_string());
        }

        if self.entry_size > self.size_limit {
            return Err(format!(
                "entry_size ({}) must not exceed size_limit ({})",
                self.entry_size, self.size_limit
            ));
        }

        if self.sliding_expiration.is_zero() {
            return Err("sliding_expiration must be greater than 0".to_string());
        }

        if self.cleanup_interval.is_zero() {
            return Err("cleanup_interval must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Number of entries a single category can hold
    pub fn max_entries(&self) -> usize {
        self.size_limit / self.entry_size.max(1)
    }

    /// Small, fast-expiring configuration for development and tests
    pub fn short_lived() -> Self {
        Self {
            size_limit: 64,
            sliding_expiration: Duration::from_secs(5),
            enable_auto_cleanup: true,
            cleanup_interval: Duration::from_secs(10),
            ..Default::default()
        }
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    size_limit: Option<usize>,
    entry_size: Option<usize>,
    sliding_expiration: Option<Duration>,
    single_flight: Option<bool>,
    enable_auto_cleanup: Option<bool>,
    cleanup_interval: Option<Duration>,
    enable_metrics: Option<bool>,
}

impl CacheConfigBuilder {
    /// Set the per-category size limit
    pub fn size_limit(mut self, limit: usize) -> Self {
        self.size_limit = Some(limit);
        self
    }

    /// Set the size charged per entry
    pub fn entry_size(mut self, size: usize) -> Self {
        self.entry_size = Some(size);
        self
    }

    /// Set the sliding expiration window
    pub fn sliding_expiration(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }

    /// Enable or disable single-flight fetches
    pub fn single_flight(mut self, enable: bool) -> Self {
        self.single_flight = Some(enable);
        self
    }

    /// Enable or disable automatic cleanup
    pub fn enable_auto_cleanup(mut self, enable: bool) -> Self {
        self.enable_auto_cleanup = Some(enable);
        self
    }

    /// Set cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Enable or disable metrics collection
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            size_limit: self.size_limit.unwrap_or(defaults.size_limit),
            entry_size: self.entry_size.unwrap_or(defaults.entry_size),
            sliding_expiration: self
                .sliding_expiration
                .unwrap_or(defaults.sliding_expiration),
            single_flight: self.single_flight.unwrap_or(defaults.single_flight),
            enable_auto_cleanup: self
                .enable_auto_cleanup
                .unwrap_or(defaults.enable_auto_cleanup),
            cleanup_interval: self.cleanup_interval.unwrap_or(defaults.cleanup_interval),
            enable_metrics: self.enable_metrics.unwrap_or(defaults.enable_metrics),
        }
    }
}
