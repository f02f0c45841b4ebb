//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires a registry, circuit breaker and
//! orchestrator over an in-memory SQLite config store, and
//! [`ScriptedProvider`], a provider whose failures are switched on and off by
//! the test.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sw_core::{HealthStatus, ProviderId};
use sw_db::pool::{init_memory_pool, DbPool};
use sw_db::SqliteConfigStore;
use sw_metadata::{
    BookMetadata, BreakerPolicy, Capabilities, CircuitBreaker, MetadataFetchProvider,
    MetadataProvider, ProviderDescriptor, ProviderOrchestrator, ProviderRegistry,
    RegistrationOptions, SearchProvider, SearchResult, SyncProvider, SyncResult,
};
use tokio::sync::Barrier;

/// Orchestrator and collaborators backed by an in-memory database.
pub struct TestHarness {
    pub registry: Arc<ProviderRegistry>,
    pub breaker: Arc<CircuitBreaker>,
    pub store: Arc<SqliteConfigStore>,
    pub orchestrator: ProviderOrchestrator,
    pub db: DbPool,
}

impl TestHarness {
    /// Create a harness with default breaker thresholds.
    pub fn new() -> Self {
        Self::with_breaker(CircuitBreaker::default())
    }

    pub fn with_breaker(breaker: CircuitBreaker) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let registry = Arc::new(ProviderRegistry::new());
        let breaker = Arc::new(breaker);
        let store = Arc::new(SqliteConfigStore::new(db.clone()));
        let orchestrator =
            ProviderOrchestrator::new(registry.clone(), breaker.clone(), store.clone());

        Self {
            registry,
            breaker,
            store,
            orchestrator,
            db,
        }
    }

    /// Register `provider` at `priority`, enabled.
    pub fn register(&self, provider: Arc<ScriptedProvider>, priority: i32) {
        self.register_with(
            provider,
            RegistrationOptions {
                enabled: true,
                priority,
            },
        );
    }

    pub fn register_with(&self, provider: Arc<ScriptedProvider>, options: RegistrationOptions) {
        self.registry
            .register(provider, options)
            .expect("registration failed");
    }

    /// Override one provider's breaker thresholds.
    pub fn set_threshold(&self, id: &str, failure_threshold: u32, reset_timeout: Duration) {
        self.breaker.set_policy(
            &ProviderId::new(id),
            BreakerPolicy::new(failure_threshold, reset_timeout),
        );
    }
}

/// Provider with switchable failures and a call counter.
pub struct ScriptedProvider {
    descriptor: ProviderDescriptor,
    failing: AtomicBool,
    health_fails: AtomicBool,
    calls: AtomicUsize,
    delay_ms: AtomicU64,
    health_barrier: Option<Arc<Barrier>>,
}

impl ScriptedProvider {
    pub fn new(id: &str, capabilities: Capabilities) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(id, format!("Scripted {id}"), capabilities),
            failing: AtomicBool::new(false),
            health_fails: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
            health_barrier: None,
        }
    }

    /// Search, fetch and sync.
    pub fn full(id: &str) -> Self {
        Self::new(
            id,
            Capabilities::none()
                .with_search()
                .with_metadata_fetch()
                .with_sync(),
        )
    }

    /// Health checks wait on `barrier` before answering.
    pub fn with_health_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.health_barrier = Some(barrier);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_health_fails(&self, fails: bool) {
        self.health_fails.store(fails, Ordering::SeqCst);
    }

    /// Every capability call sleeps for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn call(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("{} backend unreachable", self.descriptor.id);
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataProvider for ScriptedProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn health_check(&self) -> anyhow::Result<HealthStatus> {
        if let Some(barrier) = &self.health_barrier {
            barrier.wait().await;
        }
        if self.health_fails.load(Ordering::SeqCst) {
            anyhow::bail!("health probe crashed");
        }
        Ok(HealthStatus::Healthy)
    }

    fn as_search(&self) -> Option<&dyn SearchProvider> {
        self.descriptor
            .capabilities
            .has_search
            .then_some(self as &dyn SearchProvider)
    }

    fn as_metadata_fetch(&self) -> Option<&dyn MetadataFetchProvider> {
        self.descriptor
            .capabilities
            .has_metadata_fetch
            .then_some(self as &dyn MetadataFetchProvider)
    }

    fn as_sync(&self) -> Option<&dyn SyncProvider> {
        self.descriptor
            .capabilities
            .has_sync
            .then_some(self as &dyn SyncProvider)
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<SearchResult>> {
        self.call().await?;
        Ok(vec![SearchResult {
            external_id: format!("{}-1", self.descriptor.id),
            title: query.to_string(),
            authors: vec!["Anonymous".into()],
            published_year: Some(2001),
            isbn: None,
            cover_url: None,
            provider: self.descriptor.id.clone(),
        }])
    }
}

#[async_trait]
impl MetadataFetchProvider for ScriptedProvider {
    async fn fetch_metadata(&self, external_id: &str) -> anyhow::Result<BookMetadata> {
        self.call().await?;
        Ok(BookMetadata {
            external_id: external_id.to_string(),
            title: format!("Book {external_id}"),
            ..Default::default()
        })
    }
}

#[async_trait]
impl SyncProvider for ScriptedProvider {
    async fn sync(&self) -> anyhow::Result<SyncResult> {
        self.call().await?;
        Ok(SyncResult::default())
    }
}
