//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! storage and metadata-provider sections. Every section defaults sensibly so
//! a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::provider_config::DEFAULT_PRIORITY;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, failing on unreadable or invalid
    /// files. Used by `validate`, where silently falling back would hide the
    /// problem being checked for.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let metadata = &self.metadata;

        if metadata.circuit_breaker.failure_threshold == 0 {
            warnings.push(
                "metadata.circuit_breaker.failure_threshold is 0; it will be treated as 1".into(),
            );
        }
        if metadata.circuit_breaker.reset_timeout_secs == 0 {
            warnings.push(
                "metadata.circuit_breaker.reset_timeout_secs is 0; open circuits will retry immediately"
                    .into(),
            );
        }
        if metadata.call_timeout_secs == Some(0) {
            warnings.push("metadata.call_timeout_secs is 0; every provider call will time out".into());
        }

        for (id, over) in &metadata.circuit_overrides {
            if over.failure_threshold.is_none() && over.reset_timeout_secs.is_none() {
                warnings.push(format!(
                    "metadata.circuit_overrides.{id} sets no fields and has no effect"
                ));
            }
            if over.failure_threshold == Some(0) {
                warnings.push(format!(
                    "metadata.circuit_overrides.{id}.failure_threshold is 0; it will be treated as 1"
                ));
            }
        }

        let mut seen = HashSet::new();
        for (i, seed) in metadata.providers.iter().enumerate() {
            if seed.id.trim().is_empty() {
                warnings.push(format!("metadata.providers[{i}].id is empty"));
                continue;
            }
            if !seen.insert(seed.id.as_str()) {
                warnings.push(format!(
                    "metadata.providers[{i}].id '{}' is listed more than once; the first entry wins",
                    seed.id
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Where provider configuration is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    /// Keep provider configuration in process memory instead of SQLite.
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/shelfwise.db"),
            in_memory: false,
        }
    }
}

/// Metadata provider orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    /// Per-provider breaker overrides keyed by provider id.
    pub circuit_overrides: HashMap<String, CircuitBreakerOverride>,
    /// Deadline applied to each provider call. `None` disables it.
    pub call_timeout_secs: Option<u64>,
    /// Registration options for providers in the standard set.
    pub providers: Vec<ProviderSeed>,
    /// JSON catalog read by the local catalog provider.
    pub local_catalog_path: Option<PathBuf>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            circuit_overrides: HashMap::new(),
            call_timeout_secs: Some(30),
            providers: Vec::new(),
            local_catalog_path: None,
        }
    }
}

impl MetadataConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }

    /// Find the seed for a provider id. The first matching entry wins.
    pub fn seed_for(&self, id: &str) -> Option<&ProviderSeed> {
        self.providers.iter().find(|seed| seed.id == id)
    }
}

/// Default circuit breaker thresholds applied to every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before admitting a trial call.
    pub reset_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_secs: 60,
        }
    }
}

/// Per-provider breaker override. Unset fields inherit the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerOverride {
    pub failure_threshold: Option<u32>,
    pub reset_timeout_secs: Option<u64>,
}

impl CircuitBreakerOverride {
    /// Resolve this override against the defaults.
    pub fn apply(&self, defaults: &CircuitBreakerConfig) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.unwrap_or(defaults.failure_threshold),
            reset_timeout_secs: self.reset_timeout_secs.unwrap_or(defaults.reset_timeout_secs),
        }
    }
}

/// Registration options for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSeed {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}
