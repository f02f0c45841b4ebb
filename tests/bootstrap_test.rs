//! Integration tests for the composition root.

use std::io::Write;
use std::sync::Arc;

use shelfwise::bootstrap::{build, init_providers, standard_providers};
use sw_core::config::Config;
use sw_core::{HealthStatus, ProviderId};
use sw_metadata::{Capability, MetadataError, MetadataProvider, ProviderRegistry};
use tempfile::tempdir;

const CATALOG: &str = r#"[
    {"id": "b1", "title": "Dune", "authors": ["Frank Herbert"], "isbn_13": "9780441013593"},
    {"id": "b2", "title": "Hyperion", "authors": ["Dan Simmons"]}
]"#;

fn config_with_catalog(dir: &std::path::Path) -> Config {
    let catalog = dir.join("catalog.json");
    let mut file = std::fs::File::create(&catalog).unwrap();
    file.write_all(CATALOG.as_bytes()).unwrap();

    let mut config = Config::default();
    config.storage.db_path = dir.join("shelfwise.db");
    config.metadata.local_catalog_path = Some(catalog);
    config
}

#[test]
fn init_providers_is_idempotent() {
    let registry = ProviderRegistry::new();
    let config = Config::default();

    assert!(init_providers(&registry, standard_providers(&config), &[]).unwrap());
    // A second bootstrap pass must not hit the duplicate-registration error.
    assert!(!init_providers(&registry, standard_providers(&config), &[]).unwrap());
    assert_eq!(registry.len(), 1);

    registry.clear();
    assert!(init_providers(&registry, standard_providers(&config), &[]).unwrap());
}

#[test]
fn duplicate_provider_in_list_aborts_startup() {
    let registry = ProviderRegistry::new();
    let config = Config::default();
    let mut providers = standard_providers(&config);
    providers.extend(standard_providers(&config));

    let err = init_providers(&registry, providers, &[]).unwrap_err();
    assert!(matches!(err, MetadataError::Configuration(_)));
}

#[tokio::test]
async fn built_app_serves_local_catalog() {
    let dir = tempdir().unwrap();
    let app = build(&config_with_catalog(dir.path())).unwrap();
    let catalog = ProviderId::new("local-catalog");

    let searchers = app
        .orchestrator
        .get_providers_by_capability(Capability::Search)
        .await;
    let ids: Vec<&str> = searchers.iter().map(|p| p.id().as_str()).collect();
    assert_eq!(ids, vec!["local-catalog"]);

    let results = app.orchestrator.search(&catalog, "herbert").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].external_id, "b1");

    let book = app.orchestrator.fetch_metadata(&catalog, "b2").await.unwrap();
    assert_eq!(book.title, "Hyperion");

    let synced = app.orchestrator.sync(&catalog).await.unwrap();
    assert_eq!(synced.imported(), 2);

    let statuses = app.orchestrator.health_check_all().await;
    assert_eq!(statuses.len(), 2);
    assert!(statuses.values().all(|s| *s == HealthStatus::Healthy));
}

#[tokio::test]
async fn settings_persist_across_rebuilds() {
    let dir = tempdir().unwrap();
    let config = config_with_catalog(dir.path());
    let catalog = ProviderId::new("local-catalog");

    {
        let app = build(&config).unwrap();
        app.orchestrator.set_enabled(&catalog, false).await.unwrap();
    }

    let app = build(&config).unwrap();
    let enabled: Vec<Arc<dyn MetadataProvider>> = app.orchestrator.get_enabled_providers().await;
    assert!(enabled.iter().all(|p| p.id() != &catalog));

    let record = app
        .orchestrator
        .provider_config(&catalog)
        .await
        .unwrap()
        .unwrap();
    assert!(!record.enabled);
}

#[tokio::test]
async fn manual_provider_rejects_search() {
    let mut config = Config::default();
    config.storage.in_memory = true;
    let app = build(&config).unwrap();

    let err = app
        .orchestrator
        .search(&ProviderId::new("manual"), "anything")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MetadataError::CapabilityUnsupported { capability: Capability::Search, .. }
    ));
}
