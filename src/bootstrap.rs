//! Composition root: builds the store, breaker, registry and orchestrator
//! from a [`Config`] and registers the standard provider set.

use std::sync::Arc;

use anyhow::Context;
use sw_core::config::{Config, ProviderSeed};
use sw_core::{MemoryConfigStore, ProviderConfigStore};
use sw_db::pool::init_pool;
use sw_db::SqliteConfigStore;
use sw_metadata::error::Result as MetadataResult;
use sw_metadata::providers::{LocalCatalogProvider, ManualProvider};
use sw_metadata::{
    CircuitBreaker, MetadataProvider, ProviderOrchestrator, ProviderRegistry, RegistrationOptions,
};

/// Fully wired application services.
pub struct App {
    pub config: Arc<Config>,
    pub registry: Arc<ProviderRegistry>,
    pub breaker: Arc<CircuitBreaker>,
    pub store: Arc<dyn ProviderConfigStore>,
    pub orchestrator: Arc<ProviderOrchestrator>,
}

/// The providers shipped with shelfwise, in registration order.
pub fn standard_providers(config: &Config) -> Vec<Arc<dyn MetadataProvider>> {
    let mut providers: Vec<Arc<dyn MetadataProvider>> = vec![Arc::new(ManualProvider::new())];
    if let Some(path) = &config.metadata.local_catalog_path {
        providers.push(Arc::new(LocalCatalogProvider::new(path.clone())));
    }
    providers
}

/// Register `providers` once per registry.
///
/// Options come from the first seed whose id matches, defaults otherwise.
/// Returns `false` without touching the registry if it was already
/// initialized.
pub fn init_providers(
    registry: &ProviderRegistry,
    providers: Vec<Arc<dyn MetadataProvider>>,
    seeds: &[ProviderSeed],
) -> MetadataResult<bool> {
    if !registry.mark_initialized() {
        tracing::debug!("Providers already initialized; skipping registration");
        return Ok(false);
    }

    for provider in providers {
        let options = seeds
            .iter()
            .find(|seed| seed.id == provider.id().as_str())
            .map(|seed| RegistrationOptions {
                enabled: seed.enabled,
                priority: seed.priority,
            })
            .unwrap_or_default();
        registry.register(provider, options)?;
    }

    tracing::info!("Registered {} metadata providers", registry.len());
    Ok(true)
}

/// Build every service from `config` and register the standard providers.
pub fn build(config: &Config) -> anyhow::Result<App> {
    for warning in config.validate() {
        tracing::warn!("Config: {}", warning);
    }

    let store: Arc<dyn ProviderConfigStore> = if config.storage.in_memory {
        tracing::info!("Using in-memory provider config store");
        Arc::new(MemoryConfigStore::new())
    } else {
        tracing::info!(
            "Initializing database at {}",
            config.storage.db_path.display()
        );
        let pool = init_pool(&config.storage.db_path).with_context(|| {
            format!(
                "failed to open database at {}",
                config.storage.db_path.display()
            )
        })?;
        Arc::new(SqliteConfigStore::new(pool))
    };

    let registry = Arc::new(ProviderRegistry::new());
    let breaker = Arc::new(CircuitBreaker::from_config(&config.metadata));
    let orchestrator = Arc::new(
        ProviderOrchestrator::new(registry.clone(), breaker.clone(), store.clone())
            .with_call_timeout(config.metadata.call_timeout()),
    );

    init_providers(
        &registry,
        standard_providers(config),
        &config.metadata.providers,
    )
    .context("failed to register metadata providers")?;

    Ok(App {
        config: Arc::new(config.clone()),
        registry,
        breaker,
        store,
        orchestrator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sw_core::ProviderId;

    fn memory_config() -> Config {
        let mut config = Config::default();
        config.storage.in_memory = true;
        config
    }

    #[test]
    fn standard_set_includes_catalog_only_when_configured() {
        let config = memory_config();
        let ids: Vec<String> = standard_providers(&config)
            .iter()
            .map(|p| p.id().to_string())
            .collect();
        assert_eq!(ids, vec!["manual"]);

        let mut config = memory_config();
        config.metadata.local_catalog_path = Some("catalog.json".into());
        assert_eq!(standard_providers(&config).len(), 2);
    }

    #[test]
    fn init_providers_applies_seeds() {
        let registry = ProviderRegistry::new();
        let seeds = vec![ProviderSeed {
            id: "manual".into(),
            enabled: false,
            priority: 7,
        }];

        let registered =
            init_providers(&registry, standard_providers(&memory_config()), &seeds).unwrap();
        assert!(registered);

        let entry = registry.entry(&ProviderId::new("manual")).unwrap();
        assert!(!entry.enabled);
        assert_eq!(entry.priority, 7);
    }

    #[test]
    fn build_in_memory() {
        let app = build(&memory_config()).unwrap();
        assert!(app.registry.is_initialized());
        assert!(app.registry.has(&ProviderId::new("manual")));
    }
}
