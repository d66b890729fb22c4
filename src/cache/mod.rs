//! # Custom Field Cache
//!
//! In-memory memoization of custom field lists per tenant, split into one
//! independent cache per [`CacheCategory`].
//!
//! ## Features
//!
//! - **Sliding Expiration**: entries expire after a configurable idle window, reset on every read
//! - **Per-Category Capacity**: each category has its own size limit with LRU eviction
//! - **Get-or-Populate**: misses run the caller's fetch once; failures are never cached
//! - **Single-Flight**: concurrent misses for one key share a single fetch
//! - **Invalidation**: per category, per tenant across all categories, or everything
//!
//! ## Example
//!
//! ```rust
//! use custom_fields_cache::cache::{CacheCategory, CacheConfig, CategoryCacheStore, CustomField, TenantKey};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CacheConfig::builder()
//!     .size_limit(1024)
//!     .sliding_expiration(Duration::from_secs(60))
//!     .build();
//!
//! let store = CategoryCacheStore::new(config)?;
//! let tenant = TenantKey::new("co-1")?;
//!
//! let fields = store
//!     .get_or_populate(&tenant, CacheCategory::Project, || async {
//!         Ok::<_, anyhow::Error>(vec![CustomField::new(1, "Budget")])
//!     })
//!     .await?;
//! assert_eq!(fields[0].name, "Budget");
//!
//! store.invalidate_category(CacheCategory::Project, &tenant).await;
//! # Ok(())
//! # }
//! ```

pub mod category;
pub mod config;
pub mod entry;
pub mod invalidation;
pub mod store;
pub mod types;

pub use category::{spawn_auto_cleanup, start_auto_cleanup, CategoryCacheStore};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{CacheEntry, CacheMetadata};
pub use invalidation::{InvalidationEvent, InvalidationReason};
pub use store::{FillTicket, TenantCache};
pub use types::{CacheCategory, CacheStats, CustomField, FieldRecord, TenantKey};
