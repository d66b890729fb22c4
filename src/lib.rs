//! # custom-fields-cache
//!
//! A per-tenant cache for custom field metadata, placed in front of an
//! expensive backing data source.
//!
//! ## Features
//!
//! - One independent cache per category (Project, Task, Resource, Client)
//! - Sliding expiration (default 1 minute) and a per-category size limit (default 1024)
//! - Fetch-if-absent with no negative caching and single-flight misses
//! - Invalidation per category or for a whole tenant
//! - Async-first design using tokio
//!
//! ## Orchestrator
//!
//! [`CustomFieldsOrchestrator`] resolves the current tenant through a
//! [`TenantContext`] and fetches through a [`FieldDataSource`] on cache misses:
//!
//! ```no_run
//! use async_trait::async_trait;
//! use custom_fields_cache::{
//!     CacheCategory, CategoryCacheStore, CustomField, CustomFieldsOrchestrator,
//!     FieldDataSource, StaticTenantContext, TenantKey,
//! };
//! use std::sync::Arc;
//!
//! struct Database;
//!
//! #[async_trait]
//! impl FieldDataSource for Database {
//!     async fn fields_for_clients(&self, _: &TenantKey) -> anyhow::Result<Vec<CustomField>> {
//!         Ok(vec![])
//!     }
//!     async fn fields_for_resources(&self, _: &TenantKey) -> anyhow::Result<Vec<CustomField>> {
//!         Ok(vec![])
//!     }
//!     async fn fields_for_tasks(&self, _: &TenantKey) -> anyhow::Result<Vec<CustomField>> {
//!         Ok(vec![])
//!     }
//!     async fn fields_for_projects(&self, _: &TenantKey) -> anyhow::Result<Vec<CustomField>> {
//!         Ok(vec![CustomField::new(1, "Budget")])
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = CustomFieldsOrchestrator::new(
//!         Arc::new(StaticTenantContext::new("co-1")?),
//!         Arc::new(Database),
//!         Arc::new(CategoryCacheStore::with_defaults()),
//!     );
//!
//!     // First call fetches, the second is served from the cache
//!     let fields = orchestrator.get_custom_fields_for(CacheCategory::Project).await?;
//!     let again = orchestrator.get_custom_fields_for(CacheCategory::Project).await?;
//!     assert_eq!(fields, again);
//!
//!     // After the project fields change
//!     orchestrator.invalidate(CacheCategory::Project).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod orchestrator;

// Re-export main types for convenience
pub use cache::{
    CacheCategory, CacheConfig, CacheConfigBuilder, CacheStats, CategoryCacheStore, CustomField,
    FieldRecord, InvalidationEvent, InvalidationReason, TenantCache, TenantKey,
};
pub use error::{CacheError, Result};
pub use orchestrator::{
    CustomFieldsOrchestrator, FieldDataSource, FieldFuture, StaticTenantContext, TenantContext,
};
