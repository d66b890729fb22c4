//! Per-category cache store
//!
//! Owns one [`TenantCache`] per [`CacheCategory`], held in an array indexed by
//! the category. Capacity, expiration and statistics are tracked separately
//! for each category.

use crate::cache::{
    config::CacheConfig,
    invalidation::{InvalidationEvent, InvalidationReason},
    store::TenantCache,
    types::{CacheCategory, CacheStats, CustomField, FieldRecord, TenantKey},
};
use crate::error::{CacheError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type FlightKey = (CacheCategory, TenantKey);

/// Shared turn for concurrent misses on one key
struct Flight {
    turn: Arc<AsyncMutex<()>>,
    participants: usize,
}

/// Process-wide cache of custom field lists, one cache per category.
///
/// `get_or_populate` serves live entries directly and runs the supplied
/// fetch on a miss. Failures are never cached and never retried here.
pub struct CategoryCacheStore {
    config: CacheConfig,

    caches: [TenantCache; CacheCategory::COUNT],

    /// Misses currently fetching, when single-flight is enabled
    in_flight: Mutex<HashMap<FlightKey, Flight>>,
}

impl CategoryCacheStore {
    /// Create a store after validating the configuration
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate().map_err(CacheError::ConfigError)?;

        info!("Initializing custom field cache with config: {:?}", config);
        Ok(Self::build(config))
    }

    /// Create a store with the default configuration
    pub fn with_defaults() -> Self {
        Self::build(CacheConfig::default())
    }

    fn build(config: CacheConfig) -> Self {
        let caches = CacheCategory::ALL.map(|category| TenantCache::new(category, config.clone()));

        Self {
            config,
            caches,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The cache backing one category
    pub fn cache(&self, category: CacheCategory) -> &TenantCache {
        &self.caches[category.index()]
    }

    /// Return the cached fields for `tenant` in `category`, or fetch and cache them.
    ///
    /// A hit restarts the entry's sliding window. On a miss `fetch` is invoked
    /// once; its error is returned as [`CacheError::FetchFailure`] and nothing
    /// is stored.
    pub async fn get_or_populate<F, Fut, E>(
        &self,
        tenant: &TenantKey,
        category: CacheCategory,
        fetch: F,
    ) -> Result<FieldRecord>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<CustomField>, E>>,
        E: Into<anyhow::Error>,
    {
        let cache = self.cache(category);

        if let Some(value) = cache.get(tenant).await {
            return Ok(value);
        }

        if !self.config.single_flight {
            return self.populate(cache, tenant, fetch).await;
        }

        let slot = self.join_flight(category, tenant);
        let _turn = slot.turn.lock().await;

        // A caller ahead of us may have stored the value while we waited.
        // This request was already counted as a miss.
        if let Some(value) = cache.lookup(tenant, false).await {
            debug!("Served {}/{} from a concurrent fetch", category, tenant);
            return Ok(value);
        }

        self.populate(cache, tenant, fetch).await
    }

    async fn populate<F, Fut, E>(
        &self,
        cache: &TenantCache,
        tenant: &TenantKey,
        fetch: F,
    ) -> Result<FieldRecord>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<CustomField>, E>>,
        E: Into<anyhow::Error>,
    {
        let category = cache.category();
        let ticket = cache.begin_fill(tenant).await;

        match fetch().await {
            Ok(fields) => {
                let record: FieldRecord = Arc::new(fields);
                cache.fill(ticket, record.clone()).await;
                Ok(record)
            }
            Err(err) => {
                let source = err.into();
                cache.record_fetch_failure().await;
                warn!(
                    "Failed to fetch {} custom fields for tenant {}: {:#}",
                    category, tenant, source
                );
                Err(CacheError::FetchFailure {
                    category,
                    tenant: tenant.to_string(),
                    source,
                })
            }
        }
    }

    fn join_flight(&self, category: CacheCategory, tenant: &TenantKey) -> FlightSlot<'_> {
        let key = (category, tenant.clone());
        let mut in_flight = self.in_flight.lock();

        let flight = in_flight.entry(key.clone()).or_insert_with(|| Flight {
            turn: Arc::new(AsyncMutex::new(())),
            participants: 0,
        });
        flight.participants += 1;

        FlightSlot {
            store: self,
            turn: flight.turn.clone(),
            key,
        }
    }

    /// Remove the tenant's entry for one category. Returns whether one was present.
    pub async fn invalidate_category(&self, category: CacheCategory, tenant: &TenantKey) -> bool {
        self.cache(category)
            .remove(tenant, InvalidationReason::Manual)
            .await
    }

    /// Remove the tenant's entry from every category. Returns how many were present.
    pub async fn invalidate_all_categories(&self, tenant: &TenantKey) -> usize {
        let mut removed = 0;
        for cache in &self.caches {
            if cache.remove(tenant, InvalidationReason::TenantWide).await {
                removed += 1;
            }
        }

        debug!("Invalidated {} categories for tenant {}", removed, tenant);
        removed
    }

    /// Drop every entry of every category
    pub async fn clear(&self) -> Vec<InvalidationEvent> {
        let mut events = Vec::new();
        for cache in &self.caches {
            if let Some(event) = cache.clear().await {
                events.push(event);
            }
        }

        let removed: usize = events.iter().map(InvalidationEvent::len).sum();
        info!("Cleared {} entries from custom field cache", removed);
        events
    }

    /// Remove expired entries from all categories
    pub async fn cleanup_expired(&self) -> Vec<InvalidationEvent> {
        let mut events = Vec::new();
        for cache in &self.caches {
            if let Some(event) = cache.cleanup_expired().await {
                events.push(event);
            }
        }

        if !events.is_empty() {
            let removed: usize = events.iter().map(InvalidationEvent::len).sum();
            info!("Expired entry sweep removed {} entries", removed);
        }
        events
    }

    /// Whether a live entry exists, without restarting its sliding window
    pub async fn contains(&self, category: CacheCategory, tenant: &TenantKey) -> bool {
        self.cache(category).contains_key(tenant).await
    }

    pub async fn len(&self, category: CacheCategory) -> usize {
        self.cache(category).len().await
    }

    pub async fn stats(&self, category: CacheCategory) -> CacheStats {
        self.cache(category).stats().await
    }

    /// Statistics for every category, in index order
    pub async fn all_stats(&self) -> Vec<(CacheCategory, CacheStats)> {
        let mut all = Vec::with_capacity(CacheCategory::COUNT);
        for cache in &self.caches {
            all.push((cache.category(), cache.stats().await));
        }
        all
    }
}

/// Membership in a flight; leaving removes the flight once nobody is left
struct FlightSlot<'a> {
    store: &'a CategoryCacheStore,
    turn: Arc<AsyncMutex<()>>,
    key: FlightKey,
}

impl Drop for FlightSlot<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.store.in_flight.lock();
        if let Some(flight) = in_flight.get_mut(&self.key) {
            flight.participants = flight.participants.saturating_sub(1);
            if flight.participants == 0 {
                in_flight.remove(&self.key);
            }
        }
    }
}

/// Background task for periodic removal of expired entries
pub async fn start_auto_cleanup(store: Arc<CategoryCacheStore>) {
    let interval = store.config.cleanup_interval;

    info!("Starting automatic cache cleanup task (interval: {:?})", interval);

    loop {
        tokio::time::sleep(interval).await;

        let events = store.cleanup_expired().await;
        if !events.is_empty() {
            debug!("Auto cleanup: {} events", events.len());
        }
    }
}

/// Spawn [`start_auto_cleanup`] if the configuration enables it
pub fn spawn_auto_cleanup(store: &Arc<CategoryCacheStore>) -> Option<JoinHandle<()>> {
    if !store.config.enable_auto_cleanup {
        return None;
    }
    Some(tokio::spawn(start_auto_cleanup(Arc::clone(store))))
}
