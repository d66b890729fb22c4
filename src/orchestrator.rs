//! Custom fields orchestration
//!
//! Bridges "give me the custom fields for this category" to the cache:
//! resolves the current tenant, picks the data source operation for the
//! category from a dispatch table, and lets [`CategoryCacheStore`] decide
//! whether the fetch runs.

use crate::cache::{CacheCategory, CategoryCacheStore, CustomField, FieldRecord, TenantKey};
use crate::error::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

/// Resolves the tenant of the current request or session
pub trait TenantContext: Send + Sync {
    fn current_tenant(&self) -> Result<TenantKey>;
}

/// Tenant context for single-tenant deployments and tools
#[derive(Debug, Clone)]
pub struct StaticTenantContext {
    tenant: TenantKey,
}

impl StaticTenantContext {
    pub fn new(tenant: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            tenant: TenantKey::new(tenant)?,
        })
    }
}

impl TenantContext for StaticTenantContext {
    fn current_tenant(&self) -> Result<TenantKey> {
        Ok(self.tenant.clone())
    }
}

/// Backing source of custom field definitions, one operation per category.
///
/// Implementations own retries and timeouts; the cache calls at most one of
/// these per miss and never caches an error.
#[async_trait]
pub trait FieldDataSource: Send + Sync {
    async fn fields_for_clients(&self, tenant: &TenantKey) -> anyhow::Result<Vec<CustomField>>;

    async fn fields_for_resources(&self, tenant: &TenantKey) -> anyhow::Result<Vec<CustomField>>;

    async fn fields_for_tasks(&self, tenant: &TenantKey) -> anyhow::Result<Vec<CustomField>>;

    async fn fields_for_projects(&self, tenant: &TenantKey) -> anyhow::Result<Vec<CustomField>>;
}

/// Pending result of a data source operation
pub type FieldFuture<'a> = BoxFuture<'a, anyhow::Result<Vec<CustomField>>>;

type Fetcher<D> = for<'a> fn(&'a D, &'a TenantKey) -> FieldFuture<'a>;

fn fetch_projects<'a, D: FieldDataSource + ?Sized>(source: &'a D, tenant: &'a TenantKey) -> FieldFuture<'a> {
    source.fields_for_projects(tenant)
}

fn fetch_tasks<'a, D: FieldDataSource + ?Sized>(source: &'a D, tenant: &'a TenantKey) -> FieldFuture<'a> {
    source.fields_for_tasks(tenant)
}

fn fetch_resources<'a, D: FieldDataSource + ?Sized>(source: &'a D, tenant: &'a TenantKey) -> FieldFuture<'a> {
    source.fields_for_resources(tenant)
}

fn fetch_clients<'a, D: FieldDataSource + ?Sized>(source: &'a D, tenant: &'a TenantKey) -> FieldFuture<'a> {
    source.fields_for_clients(tenant)
}

/// Data source operation per category, indexed by [`CacheCategory::index`]
fn dispatch_table<D: FieldDataSource + ?Sized>() -> [Fetcher<D>; CacheCategory::COUNT] {
    // Same order as CacheCategory::ALL
    [
        fetch_projects::<D>,
        fetch_tasks::<D>,
        fetch_resources::<D>,
        fetch_clients::<D>,
    ]
}

/// Entry point for reading custom fields through the cache
pub struct CustomFieldsOrchestrator<T: ?Sized, D: ?Sized> {
    tenant_context: Arc<T>,

    data_source: Arc<D>,

    cache: Arc<CategoryCacheStore>,

    fetchers: [Fetcher<D>; CacheCategory::COUNT],
}

impl<T, D> CustomFieldsOrchestrator<T, D>
where
    T: TenantContext + ?Sized,
    D: FieldDataSource + ?Sized,
{
    pub fn new(tenant_context: Arc<T>, data_source: Arc<D>, cache: Arc<CategoryCacheStore>) -> Self {
        Self {
            tenant_context,
            data_source,
            cache,
            fetchers: dispatch_table::<D>(),
        }
    }

    /// Get the underlying cache store
    pub fn cache(&self) -> &Arc<CategoryCacheStore> {
        &self.cache
    }

    /// Custom fields of the current tenant for `category`, cached or freshly fetched
    pub async fn get_custom_fields_for(&self, category: CacheCategory) -> Result<FieldRecord> {
        let tenant = self.tenant_context.current_tenant()?;
        let fetch = self.fetchers[category.index()];
        let source = &*self.data_source;

        debug!("Resolving {} custom fields for tenant {}", category, tenant);
        self.cache
            .get_or_populate(&tenant, category, || fetch(source, &tenant))
            .await
    }

    /// Like [`get_custom_fields_for`](Self::get_custom_fields_for) with a
    /// category name. Unknown names fail before any tenant or data source call.
    pub async fn get_custom_fields_for_name(&self, category: &str) -> Result<FieldRecord> {
        let category: CacheCategory = category.parse()?;
        self.get_custom_fields_for(category).await
    }

    /// Drop the current tenant's cached fields for one category
    pub async fn invalidate(&self, category: CacheCategory) -> Result<bool> {
        let tenant = self.tenant_context.current_tenant()?;
        Ok(self.cache.invalidate_category(category, &tenant).await)
    }

    /// Drop the current tenant's cached fields for every category
    pub async fn invalidate_all(&self) -> Result<usize> {
        let tenant = self.tenant_context.current_tenant()?;
        Ok(self.cache.invalidate_all_categories(&tenant).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records which operation ran
    #[derive(Default)]
    struct RecordingSource {
        calls: Mutex<Vec<&'static str>>,
    }

    impl RecordingSource {
        fn record(&self, op: &'static str) -> anyhow::Result<Vec<CustomField>> {
            self.calls.lock().push(op);
            Ok(vec![CustomField::new(1, op)])
        }
    }

    #[async_trait]
    impl FieldDataSource for RecordingSource {
        async fn fields_for_clients(&self, _: &TenantKey) -> anyhow::Result<Vec<CustomField>> {
            self.record("clients")
        }

        async fn fields_for_resources(&self, _: &TenantKey) -> anyhow::Result<Vec<CustomField>> {
            self.record("resources")
        }

        async fn fields_for_tasks(&self, _: &TenantKey) -> anyhow::Result<Vec<CustomField>> {
            self.record("tasks")
        }

        async fn fields_for_projects(&self, _: &TenantKey) -> anyhow::Result<Vec<CustomField>> {
            self.record("projects")
        }
    }

    #[tokio::test]
    async fn test_dispatch_table_matches_categories() {
        let source = RecordingSource::default();
        let tenant = TenantKey::new("co-1").unwrap();
        let table = dispatch_table::<RecordingSource>();

        for category in CacheCategory::ALL {
            let fields = table[category.index()](&source, &tenant).await.unwrap();
            assert_eq!(fields[0].name, format!("{}s", category));
        }

        assert_eq!(
            *source.calls.lock(),
            vec!["projects", "tasks", "resources", "clients"]
        );
    }

    #[tokio::test]
    async fn test_works_with_trait_objects() {
        let context: Arc<dyn TenantContext> = Arc::new(StaticTenantContext::new("co-1").unwrap());
        let source: Arc<dyn FieldDataSource> = Arc::new(RecordingSource::default());
        let orchestrator = CustomFieldsOrchestrator::new(
            context,
            source,
            Arc::new(CategoryCacheStore::with_defaults()),
        );

        let fields = orchestrator
            .get_custom_fields_for(CacheCategory::Client)
            .await
            .unwrap();
        assert_eq!(fields[0].name, "clients");
    }

    #[test]
    fn test_static_tenant_context() {
        let context = StaticTenantContext::new("co-7").unwrap();
        assert_eq!(context.current_tenant().unwrap().as_str(), "co-7");
        assert!(StaticTenantContext::new("").is_err());
    }
}
