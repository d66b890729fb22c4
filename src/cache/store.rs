//! Single-category cache with sliding expiration and LRU eviction

use crate::cache::{
    config::CacheConfig,
    entry::CacheEntry,
    invalidation::{InvalidationEvent, InvalidationReason},
    types::{CacheCategory, CacheStats, FieldRecord, TenantKey},
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Superseded LRU slots tolerated before the queue is compacted
const LRU_SLACK: usize = 32;

type PendingFills = Arc<Mutex<HashMap<TenantKey, PendingFill>>>;

/// Cache of field lists for one category, keyed by tenant.
///
/// This implementation provides:
/// - Thread-safe async access via RwLock
/// - Sliding expiration, checked lazily on lookup and by [`cleanup_expired`](Self::cleanup_expired)
/// - LRU eviction when the size limit is reached
/// - Fill tickets so a fetch that raced an invalidation is not stored
#[derive(Debug)]
pub struct TenantCache {
    category: CacheCategory,

    config: CacheConfig,

    state: RwLock<CacheState>,

    /// Tenants with fetches in progress
    pending: PendingFills,
}

/// Fetches in progress for one tenant
#[derive(Debug, Default)]
struct PendingFill {
    tickets: usize,

    /// Clock value of the latest invalidation seen while fetches were running
    invalidated_at: u64,
}

/// Claim on storing one fetched value, taken when the fetch starts.
///
/// The fill is refused if the tenant was invalidated (or the cache cleared)
/// after the ticket was issued. Dropping an unused ticket releases the claim.
#[derive(Debug)]
pub struct FillTicket {
    issued_at: u64,
    tenant: TenantKey,
    pending: PendingFills,
}

impl FillTicket {
    pub fn tenant(&self) -> &TenantKey {
        &self.tenant
    }
}

impl Drop for FillTicket {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        if let Some(fill) = pending.get_mut(&self.tenant) {
            fill.tickets = fill.tickets.saturating_sub(1);
            if fill.tickets == 0 {
                pending.remove(&self.tenant);
            }
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    /// Main storage: tenant -> entry
    entries: HashMap<TenantKey, CacheEntry>,

    /// LRU tracking: front is least recently used. A slot is current only
    /// while its stamp matches the entry's `lru_stamp`.
    lru_queue: VecDeque<(TenantKey, u64)>,

    lru_clock: u64,

    stats: CacheStats,

    /// Sum of entry sizes
    current_size: usize,

    /// Advanced by every invalidation and clear
    clock: u64,

    /// Clock value of the latest clear
    cleared_at: u64,
}

impl CacheState {
    fn remove_entry(&mut self, tenant: &TenantKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(tenant)?;
        self.current_size = self.current_size.saturating_sub(entry.metadata.size);
        self.compact_lru();
        Some(entry)
    }

    /// Mark the tenant's entry as most recently used
    fn touch(&mut self, tenant: &TenantKey) {
        self.lru_clock += 1;
        let stamp = self.lru_clock;

        if let Some(entry) = self.entries.get_mut(tenant) {
            entry.lru_stamp = stamp;
            self.lru_queue.push_back((tenant.clone(), stamp));
        }
        self.compact_lru();
    }

    /// Take the least recently used tenant off the queue
    fn pop_lru(&mut self) -> Option<TenantKey> {
        while let Some((tenant, stamp)) = self.lru_queue.pop_front() {
            if self.is_current(&tenant, stamp) {
                return Some(tenant);
            }
        }
        None
    }

    fn is_current(&self, tenant: &TenantKey, stamp: u64) -> bool {
        self.entries
            .get(tenant)
            .is_some_and(|entry| entry.lru_stamp == stamp)
    }

    fn compact_lru(&mut self) {
        if self.lru_queue.len() <= 2 * self.entries.len() + LRU_SLACK {
            return;
        }

        let entries = &self.entries;
        self.lru_queue.retain(|(tenant, stamp)| {
            entries
                .get(tenant)
                .is_some_and(|entry| entry.lru_stamp == *stamp)
        });
    }
}

impl TenantCache {
    pub fn new(category: CacheCategory, config: CacheConfig) -> Self {
        Self {
            category,
            config,
            state: RwLock::new(CacheState::default()),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn category(&self) -> CacheCategory {
        self.category
    }

    /// Get the live entry for a tenant, restarting its sliding window
    pub async fn get(&self, tenant: &TenantKey) -> Option<FieldRecord> {
        self.lookup(tenant, true).await
    }

    /// Lookup shared by [`get`](Self::get) and the single-flight re-check.
    ///
    /// With `count_access` false neither a hit nor a miss is recorded, since
    /// the request was already counted as a miss.
    pub(crate) async fn lookup(&self, tenant: &TenantKey, count_access: bool) -> Option<FieldRecord> {
        let mut state = self.state.write().await;
        let metrics = self.config.enable_metrics;

        let Some(expired) = state.entries.get(tenant).map(CacheEntry::is_expired) else {
            if metrics && count_access {
                state.stats.misses += 1;
            }
            debug!("Cache miss: {}/{}", self.category, tenant);
            return None;
        };

        if expired {
            debug!("Cache entry expired: {}/{}", self.category, tenant);
            state.remove_entry(tenant);
            if metrics {
                state.stats.evictions_expired += 1;
                if count_access {
                    state.stats.misses += 1;
                }
            }
            return None;
        }

        let value = state.entries.get_mut(tenant).map(|entry| {
            entry.mark_accessed();
            entry.value.clone()
        })?;
        state.touch(tenant);
        if metrics && count_access {
            state.stats.hits += 1;
        }

        debug!("Cache hit: {}/{}", self.category, tenant);
        Some(value)
    }

    /// Check for a live entry without restarting its sliding window
    pub async fn contains_key(&self, tenant: &TenantKey) -> bool {
        let state = self.state.read().await;
        state
            .entries
            .get(tenant)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Start a fetch for `tenant`
    pub async fn begin_fill(&self, tenant: &TenantKey) -> FillTicket {
        let mut state = self.state.write().await;
        if self.config.enable_metrics {
            state.stats.fetches += 1;
        }

        self.pending
            .lock()
            .entry(tenant.clone())
            .or_default()
            .tickets += 1;

        FillTicket {
            issued_at: state.clock,
            tenant: tenant.clone(),
            pending: Arc::clone(&self.pending),
        }
    }

    pub async fn record_fetch_failure(&self) {
        if self.config.enable_metrics {
            self.state.write().await.stats.fetch_failures += 1;
        }
    }

    /// Store a fetched value.
    ///
    /// Returns false when the tenant was invalidated after `ticket` was issued
    /// or the value cannot fit; the value is then dropped.
    pub async fn fill(&self, ticket: FillTicket, value: FieldRecord) -> bool {
        let mut state = self.state.write().await;
        let tenant = ticket.tenant.clone();

        let invalidated = self
            .pending
            .lock()
            .get(&tenant)
            .is_some_and(|fill| fill.invalidated_at > ticket.issued_at);
        if invalidated || state.cleared_at > ticket.issued_at {
            warn!(
                "Discarding {} fields for tenant {}: invalidated during fetch",
                self.category, tenant
            );
            if self.config.enable_metrics {
                state.stats.discarded_fills += 1;
            }
            return false;
        }

        let size = self.config.entry_size;
        if state.remove_entry(&tenant).is_some() {
            debug!("Replacing cache entry: {}/{}", self.category, tenant);
        }

        if !self.make_room(&mut state, size) {
            warn!(
                "Cannot store {} fields for tenant {}: entry size {} exceeds limit {}",
                self.category, tenant, size, self.config.size_limit
            );
            return false;
        }

        debug!("Inserting cache entry: {}/{}", self.category, tenant);
        let entry = CacheEntry::new(value, size, self.config.sliding_expiration);
        state.entries.insert(tenant.clone(), entry);
        state.touch(&tenant);
        state.current_size += size;

        true
    }

    /// Remove a tenant's entry. Also blocks any fill for it started before this call.
    pub async fn remove(&self, tenant: &TenantKey, reason: InvalidationReason) -> bool {
        let mut state = self.state.write().await;

        state.clock += 1;
        if let Some(fill) = self.pending.lock().get_mut(tenant) {
            fill.invalidated_at = state.clock;
        }

        if state.remove_entry(tenant).is_some() {
            if self.config.enable_metrics {
                state.stats.invalidations += 1;
            }
            debug!("Removed cache entry ({}): {}/{}", reason, self.category, tenant);
            true
        } else {
            false
        }
    }

    /// Clear all entries. Fills started before the clear are refused.
    pub async fn clear(&self) -> Option<InvalidationEvent> {
        let mut state = self.state.write().await;

        state.clock += 1;
        state.cleared_at = state.clock;

        let tenants: Vec<TenantKey> = state.entries.drain().map(|(tenant, _)| tenant).collect();
        state.lru_queue.clear();
        state.current_size = 0;

        if tenants.is_empty() {
            return None;
        }
        if self.config.enable_metrics {
            state.stats.invalidations += tenants.len() as u64;
        }

        debug!("Cleared {} entries from {} cache", tenants.len(), self.category);
        Some(InvalidationEvent::new(
            self.category,
            InvalidationReason::Cleared,
            tenants,
        ))
    }

    /// Remove all expired entries
    pub async fn cleanup_expired(&self) -> Option<InvalidationEvent> {
        let mut state = self.state.write().await;
        let now = Instant::now();

        let expired: Vec<TenantKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(tenant, _)| tenant.clone())
            .collect();

        if expired.is_empty() {
            return None;
        }

        for tenant in &expired {
            state.remove_entry(tenant);
        }
        if self.config.enable_metrics {
            state.stats.evictions_expired += expired.len() as u64;
        }

        debug!(
            "Cleaned up {} expired entries from {} cache",
            expired.len(),
            self.category
        );
        let context = format!("Cleaned up {} expired entries", expired.len());
        Some(
            InvalidationEvent::new(self.category, InvalidationReason::Expired, expired)
                .with_context(context),
        )
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            entries: state.entries.len(),
            total_size: state.current_size,
            ..state.stats.clone()
        }
    }

    /// Number of stored entries, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Current total size of stored entries
    pub async fn total_size(&self) -> usize {
        self.state.read().await.current_size
    }

    /// Evict until `needed` fits under the size limit: expired entries first,
    /// then least recently used.
    fn make_room(&self, state: &mut CacheState, needed: usize) -> bool {
        let limit = self.config.size_limit;
        if state.current_size + needed <= limit {
            return true;
        }

        let now = Instant::now();
        let expired: Vec<TenantKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(tenant, _)| tenant.clone())
            .collect();
        for tenant in expired {
            debug!("Evicting expired entry: {}/{}", self.category, tenant);
            state.remove_entry(&tenant);
            if self.config.enable_metrics {
                state.stats.evictions_expired += 1;
            }
        }

        while state.current_size + needed > limit {
            let Some(tenant) = state.pop_lru() else {
                return false;
            };
            debug!("Evicting entry due to size limit: {}/{}", self.category, tenant);
            state.remove_entry(&tenant);
            if self.config.enable_metrics {
                state.stats.evictions_capacity += 1;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::CustomField;
    use std::sync::Arc;
    use std::time::Duration;

    fn tenant(id: &str) -> TenantKey {
        TenantKey::new(id).unwrap()
    }

    fn record(id: u64) -> FieldRecord {
        Arc::new(vec![CustomField::new(id, format!("field-{id}"))])
    }

    async fn put(cache: &TenantCache, id: &str, value: u64) -> bool {
        let ticket = cache.begin_fill(&tenant(id)).await;
        cache.fill(ticket, record(value)).await
    }

    fn pending_fills(cache: &TenantCache) -> usize {
        cache.pending.lock().len()
    }

    fn cache_with(config: CacheConfig) -> TenantCache {
        TenantCache::new(CacheCategory::Project, config)
    }

    #[tokio::test]
    async fn test_fill_and_get() {
        let cache = cache_with(CacheConfig::default());

        assert!(put(&cache, "co-1", 1).await);
        let value = cache.get(&tenant("co-1")).await.unwrap();
        assert_eq!(value[0].id, 1);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_size, 1);
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache = cache_with(CacheConfig::default());

        assert!(cache.get(&tenant("nobody")).await.is_none());
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sliding_expiration() {
        let config = CacheConfig::builder()
            .sliding_expiration(Duration::from_secs(60))
            .build();
        let cache = cache_with(config);
        put(&cache, "co-1", 1).await;

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(cache.get(&tenant("co-1")).await.is_some());

        // 80s after insert, 40s idle
        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(cache.get(&tenant("co-1")).await.is_some());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.get(&tenant("co-1")).await.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.evictions_expired, 1);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let config = CacheConfig::builder().size_limit(3).build();
        let cache = cache_with(config);

        put(&cache, "a", 1).await;
        put(&cache, "b", 2).await;
        put(&cache, "c", 3).await;

        // Reading a makes b the least recently used
        cache.get(&tenant("a")).await;
        put(&cache, "d", 4).await;

        assert!(!cache.contains_key(&tenant("b")).await);
        assert!(cache.contains_key(&tenant("a")).await);
        assert!(cache.contains_key(&tenant("c")).await);
        assert!(cache.contains_key(&tenant("d")).await);

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.evictions_capacity, 1);
    }

    #[tokio::test]
    async fn test_entry_size_counts_against_limit() {
        let config = CacheConfig::builder().size_limit(10).entry_size(4).build();
        let cache = cache_with(config);

        put(&cache, "a", 1).await;
        put(&cache, "b", 2).await;
        assert_eq!(cache.total_size().await, 8);

        put(&cache, "c", 3).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.total_size().await, 8);
        assert!(!cache.contains_key(&tenant("a")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_evicted_before_live_ones() {
        let config = CacheConfig::builder()
            .size_limit(2)
            .sliding_expiration(Duration::from_secs(10))
            .build();
        let cache = cache_with(config);

        put(&cache, "old", 1).await;
        tokio::time::advance(Duration::from_secs(8)).await;
        put(&cache, "fresh", 2).await;
        tokio::time::advance(Duration::from_secs(3)).await;

        // "old" is expired and also least recently used; "fresh" must survive
        put(&cache, "new", 3).await;
        assert!(cache.contains_key(&tenant("fresh")).await);
        assert!(cache.contains_key(&tenant("new")).await);

        let stats = cache.stats().await;
        assert_eq!(stats.evictions_expired, 1);
        assert_eq!(stats.evictions_capacity, 0);
    }

    #[tokio::test]
    async fn test_refill_replaces_entry() {
        let cache = cache_with(CacheConfig::default());

        put(&cache, "co-1", 1).await;
        put(&cache, "co-1", 2).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.total_size().await, 1);
        assert_eq!(cache.get(&tenant("co-1")).await.unwrap()[0].id, 2);
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = cache_with(CacheConfig::default());
        put(&cache, "co-1", 1).await;

        assert!(cache.remove(&tenant("co-1"), InvalidationReason::Manual).await);
        assert!(!cache.remove(&tenant("co-1"), InvalidationReason::Manual).await);
        assert!(cache.get(&tenant("co-1")).await.is_none());
        assert_eq!(cache.stats().await.invalidations, 1);
    }

    #[tokio::test]
    async fn test_fill_after_invalidation_is_discarded() {
        let cache = cache_with(CacheConfig::default());

        let ticket = cache.begin_fill(&tenant("co-1")).await;
        let other = cache.begin_fill(&tenant("co-2")).await;
        cache.remove(&tenant("co-1"), InvalidationReason::Manual).await;
        assert!(!cache.fill(ticket, record(1)).await);
        assert!(cache.is_empty().await);

        // Other tenants are unaffected by that invalidation
        assert!(cache.fill(other, record(2)).await);

        // A fetch started after the invalidation is stored
        let ticket = cache.begin_fill(&tenant("co-1")).await;
        assert!(cache.fill(ticket, record(3)).await);

        assert_eq!(cache.stats().await.discarded_fills, 1);
        assert_eq!(pending_fills(&cache), 0);
    }

    #[tokio::test]
    async fn test_overlapping_fills_for_one_tenant() {
        let cache = cache_with(CacheConfig::default());

        let early = cache.begin_fill(&tenant("co-1")).await;
        cache.remove(&tenant("co-1"), InvalidationReason::Manual).await;
        let late = cache.begin_fill(&tenant("co-1")).await;

        assert!(!cache.fill(early, record(1)).await);
        assert!(cache.fill(late, record(2)).await);
        assert_eq!(cache.get(&tenant("co-1")).await.unwrap()[0].id, 2);
    }

    #[tokio::test]
    async fn test_invalidation_marks_stay_bounded() {
        let cache = cache_with(CacheConfig::default());

        for i in 0..50_000 {
            cache
                .remove(&tenant(&format!("absent-{i}")), InvalidationReason::Manual)
                .await;
        }
        assert_eq!(pending_fills(&cache), 0);

        // Only tenants with a fetch in progress are tracked
        let ticket = cache.begin_fill(&tenant("co-1")).await;
        for i in 0..1_000 {
            cache
                .remove(&tenant(&format!("absent-{i}")), InvalidationReason::Manual)
                .await;
        }
        cache.remove(&tenant("co-1"), InvalidationReason::Manual).await;
        assert_eq!(pending_fills(&cache), 1);

        assert!(!cache.fill(ticket, record(1)).await);
        assert_eq!(pending_fills(&cache), 0);
    }

    #[tokio::test]
    async fn test_dropped_ticket_releases_claim() {
        let cache = cache_with(CacheConfig::default());

        let ticket = cache.begin_fill(&tenant("co-1")).await;
        assert_eq!(ticket.tenant().as_str(), "co-1");
        assert_eq!(pending_fills(&cache), 1);

        drop(ticket);
        assert_eq!(pending_fills(&cache), 0);
        assert_eq!(cache.stats().await.fetches, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = cache_with(CacheConfig::default());
        put(&cache, "a", 1).await;
        put(&cache, "b", 2).await;

        let ticket = cache.begin_fill(&tenant("c")).await;
        let event = cache.clear().await.unwrap();
        assert_eq!(event.reason, InvalidationReason::Cleared);
        assert_eq!(event.category, CacheCategory::Project);
        assert_eq!(event.len(), 2);
        assert!(event.tenants.contains(&tenant("a")));

        assert!(cache.is_empty().await);
        assert_eq!(cache.total_size().await, 0);
        assert!(!cache.fill(ticket, record(3)).await);
        assert_eq!(cache.stats().await.invalidations, 2);

        assert!(cache.clear().await.is_none());
    }

    #[tokio::test]
    async fn test_recheck_lookup_records_nothing() {
        let cache = cache_with(CacheConfig::default());

        assert!(cache.lookup(&tenant("co-1"), false).await.is_none());
        put(&cache, "co-1", 1).await;
        assert!(cache.lookup(&tenant("co-1"), false).await.is_some());

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn test_lru_queue_is_compacted() {
        let config = CacheConfig::builder().size_limit(2).build();
        let cache = cache_with(config);
        put(&cache, "a", 1).await;
        put(&cache, "b", 2).await;

        for _ in 0..1_000 {
            cache.get(&tenant("a")).await;
        }
        assert!(cache.state.read().await.lru_queue.len() <= 2 * 2 + LRU_SLACK);

        // b is still the least recently used
        put(&cache, "c", 3).await;
        assert!(cache.contains_key(&tenant("a")).await);
        assert!(!cache.contains_key(&tenant("b")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_expired() {
        let config = CacheConfig::builder()
            .sliding_expiration(Duration::from_secs(5))
            .build();
        let cache = cache_with(config);

        put(&cache, "a", 1).await;
        put(&cache, "b", 2).await;
        tokio::time::advance(Duration::from_secs(3)).await;
        put(&cache, "c", 3).await;
        tokio::time::advance(Duration::from_secs(3)).await;

        let event = cache.cleanup_expired().await.unwrap();
        assert_eq!(event.reason, InvalidationReason::Expired);
        assert_eq!(event.len(), 2);
        assert_eq!(cache.len().await, 1);
        assert!(cache.contains_key(&tenant("c")).await);

        assert!(cache.cleanup_expired().await.is_none());
    }

    #[tokio::test]
    async fn test_metrics_disabled() {
        let config = CacheConfig::builder().enable_metrics(false).build();
        let cache = cache_with(config);

        put(&cache, "a", 1).await;
        cache.get(&tenant("a")).await;
        cache.get(&tenant("b")).await;

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.fetches, 0);
        // Occupancy is always tracked
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_size, 1);
    }
}
