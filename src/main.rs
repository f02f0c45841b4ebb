mod cli;

use shelfwise::bootstrap;
use sw_core::config::Config;
use sw_core::ProviderId;
use sw_metadata::{Capability, MetadataError};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use serde::Serialize;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "shelfwise=trace,sw_metadata=trace,sw_db=debug,sw_core=debug".to_string()
        } else {
            "shelfwise=info,sw_metadata=info,sw_db=warn,sw_core=info".to_string()
        }
    });

    // Logs go to stderr so --json output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("shelfwise {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        command => {
            let config = Config::load_or_default(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_command(&config, command))
        }
    }
}

async fn run_command(config: &Config, command: Commands) -> Result<()> {
    let app = bootstrap::build(config)?;
    let orchestrator = &app.orchestrator;

    match command {
        Commands::Providers { capability, json } => {
            let capability = capability.map(Capability::from);
            let summaries: Vec<_> = orchestrator
                .provider_summaries()
                .await
                .into_iter()
                .filter(|s| match capability {
                    Some(cap) => s.enabled && s.capabilities.supports(cap),
                    None => true,
                })
                .collect();

            if json {
                return print_json(&summaries);
            }
            if summaries.is_empty() {
                println!("No providers");
                return Ok(());
            }
            for s in &summaries {
                let caps: Vec<&str> = s
                    .capabilities
                    .declared()
                    .into_iter()
                    .map(Capability::as_str)
                    .collect();
                println!(
                    "{:<16} {:<20} priority {:<5} {:<9} {:<12} [{}]",
                    s.id.as_str(),
                    s.name,
                    s.priority,
                    if s.enabled { "enabled" } else { "disabled" },
                    s.health_status.as_str(),
                    caps.join(", ")
                );
            }
            Ok(())
        }
        Commands::Health { json } => {
            let mut statuses: Vec<_> = orchestrator.health_check_all().await.into_iter().collect();
            statuses.sort_by(|a, b| a.0.cmp(&b.0));

            if json {
                let map: std::collections::BTreeMap<_, _> = statuses.into_iter().collect();
                return print_json(&map);
            }
            for (id, status) in &statuses {
                let mark = if status.is_healthy() { "✓" } else { "✗" };
                println!("{} {} ({})", mark, id, status);
            }
            Ok(())
        }
        Commands::Search {
            provider,
            query,
            json,
        } => {
            let results = orchestrator
                .search(&ProviderId::new(provider), &query)
                .await?;
            if json {
                return print_json(&results);
            }
            println!("{} result(s)", results.len());
            for r in &results {
                print!("  [{}] {}", r.external_id, r.title);
                if !r.authors.is_empty() {
                    print!(" - {}", r.authors.join(", "));
                }
                if let Some(year) = r.published_year {
                    print!(" ({})", year);
                }
                println!();
            }
            Ok(())
        }
        Commands::Fetch {
            provider,
            external_id,
            json,
        } => {
            let book = orchestrator
                .fetch_metadata(&ProviderId::new(provider), &external_id)
                .await?;
            if json {
                return print_json(&book);
            }
            println!("Title: {}", book.title);
            if let Some(ref subtitle) = book.subtitle {
                println!("Subtitle: {}", subtitle);
            }
            println!("Authors: {}", book.authors.join(", "));
            if let Some(ref publisher) = book.publisher {
                println!("Publisher: {}", publisher);
            }
            if let Some(ref date) = book.published_date {
                println!("Published: {}", date);
            }
            if let Some(isbn) = book.isbn_13.as_ref().or(book.isbn_10.as_ref()) {
                println!("ISBN: {}", isbn);
            }
            if let Some(pages) = book.page_count {
                println!("Pages: {}", pages);
            }
            Ok(())
        }
        Commands::Sync { provider, json } => {
            let result = orchestrator.sync(&ProviderId::new(provider)).await?;
            if json {
                return print_json(&result);
            }
            println!(
                "Imported {} book(s), skipped {}",
                result.imported(),
                result.skipped
            );
            for error in &result.errors {
                println!("  ! {}", error);
            }
            Ok(())
        }
        Commands::Enable { provider } => {
            let id = ProviderId::new(provider);
            orchestrator.set_enabled(&id, true).await?;
            println!("Enabled {}", id);
            Ok(())
        }
        Commands::Disable { provider } => {
            let id = ProviderId::new(provider);
            orchestrator.set_enabled(&id, false).await?;
            println!("Disabled {}", id);
            Ok(())
        }
        Commands::Priority { provider, value } => {
            let id = ProviderId::new(provider);
            orchestrator.set_priority(&id, value).await?;
            println!("Set priority of {} to {}", id, value);
            Ok(())
        }
        Commands::Circuit { provider, reset } => {
            let id = ProviderId::new(provider);
            if !app.registry.has(&id) {
                return Err(MetadataError::ProviderNotFound(id).into());
            }
            if reset {
                orchestrator.reset_circuit(&id);
            }
            let stats = orchestrator.circuit_stats(&id);
            println!("Provider: {}", stats.provider_id);
            println!("State: {}", stats.state);
            println!("Failures: {}", stats.failure_count);
            match stats.last_failure_time {
                Some(at) => println!("Last failure: {}", at.to_rfc3339()),
                None => println!("Last failure: never"),
            }
            Ok(())
        }
        // Handled in main without building the app.
        Commands::Validate { .. } | Commands::Version => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json_str = serde_json::to_string_pretty(value)?;
    println!("{}", json_str);
    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let metadata = &config.metadata;
    println!(
        "  Storage: {}",
        if config.storage.in_memory {
            "in-memory".to_string()
        } else {
            config.storage.db_path.display().to_string()
        }
    );
    println!(
        "  Circuit breaker: {} failures, {}s reset",
        metadata.circuit_breaker.failure_threshold, metadata.circuit_breaker.reset_timeout_secs
    );
    match metadata.call_timeout_secs {
        Some(secs) => println!("  Call timeout: {}s", secs),
        None => println!("  Call timeout: none"),
    }
    println!("  Provider seeds: {}", metadata.providers.len());
    if let Some(ref catalog) = metadata.local_catalog_path {
        println!("  Local catalog: {}", catalog.display());
    }

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  ! {}", warning);
        }
    }

    Ok(())
}
