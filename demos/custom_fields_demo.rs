//! Custom Fields Cache Demo
//!
//! Serves custom fields through the cache from a simulated slow data source
//! and shows hits, misses, invalidation and per-category statistics.
//!
//! Usage:
//!   cargo run --example custom_fields_demo
//!
//! Environment variables:
//!   RUST_LOG - log filter (default: info,custom_fields_cache=debug)

use async_trait::async_trait;
use custom_fields_cache::{
    cache::spawn_auto_cleanup, CacheCategory, CacheConfig, CategoryCacheStore, CustomField,
    CustomFieldsOrchestrator, FieldDataSource, StaticTenantContext, TenantKey,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Pretends to be a database round-trip
struct SlowDataSource {
    latency: Duration,
}

impl SlowDataSource {
    async fn load(&self, tenant: &TenantKey, names: &[&str]) -> anyhow::Result<Vec<CustomField>> {
        tokio::time::sleep(self.latency).await;
        Ok(names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                CustomField::new(i as u64 + 1, *name).with_attribute("tenant", tenant.as_str())
            })
            .collect())
    }
}

#[async_trait]
impl FieldDataSource for SlowDataSource {
    async fn fields_for_clients(&self, tenant: &TenantKey) -> anyhow::Result<Vec<CustomField>> {
        self.load(tenant, &["Segment", "Account Manager"]).await
    }

    async fn fields_for_resources(&self, tenant: &TenantKey) -> anyhow::Result<Vec<CustomField>> {
        self.load(tenant, &["Seniority", "Location"]).await
    }

    async fn fields_for_tasks(&self, tenant: &TenantKey) -> anyhow::Result<Vec<CustomField>> {
        self.load(tenant, &["Phase"]).await
    }

    async fn fields_for_projects(&self, tenant: &TenantKey) -> anyhow::Result<Vec<CustomField>> {
        self.load(tenant, &["Budget", "Sponsor", "Risk Level"]).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,custom_fields_cache=debug")),
        )
        .init();

    info!("=== Custom Fields Cache Demo ===");

    let config = CacheConfig::builder()
        .sliding_expiration(Duration::from_secs(2))
        .enable_auto_cleanup(true)
        .cleanup_interval(Duration::from_secs(1))
        .build();
    let store = Arc::new(CategoryCacheStore::new(config)?);
    let cleanup = spawn_auto_cleanup(&store);

    let orchestrator = CustomFieldsOrchestrator::new(
        Arc::new(StaticTenantContext::new("co-1")?),
        Arc::new(SlowDataSource {
            latency: Duration::from_millis(250),
        }),
        store.clone(),
    );

    info!("\n--- First request (miss) ---");
    let start = Instant::now();
    let fields = orchestrator.get_custom_fields_for(CacheCategory::Project).await?;
    info!("Fetched {} project fields in {:?}", fields.len(), start.elapsed());

    info!("\n--- Second request (hit) ---");
    let start = Instant::now();
    let fields = orchestrator.get_custom_fields_for(CacheCategory::Project).await?;
    info!("Served {} project fields in {:?}", fields.len(), start.elapsed());
    info!("{}", serde_json::to_string_pretty(&*fields)?);

    info!("\n--- Invalidate projects, then request again ---");
    orchestrator.invalidate(CacheCategory::Project).await?;
    let start = Instant::now();
    orchestrator.get_custom_fields_for(CacheCategory::Project).await?;
    info!("Refetched in {:?}", start.elapsed());

    info!("\n--- Unknown category ---");
    if let Err(e) = orchestrator.get_custom_fields_for_name("invoice").await {
        info!("Rejected: {}", e);
    }

    info!("\n--- Idle past the sliding window ---");
    orchestrator.get_custom_fields_for(CacheCategory::Client).await?;
    tokio::time::sleep(Duration::from_secs(3)).await;
    info!(
        "Client entries after sweep: {}",
        store.len(CacheCategory::Client).await
    );

    info!("\n--- Statistics ---");
    for (category, stats) in store.all_stats().await {
        info!("{:>8}: {}", category, stats);
    }

    if let Some(handle) = cleanup {
        handle.abort();
    }
    Ok(())
}
