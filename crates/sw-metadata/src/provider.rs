//! Provider contract and the types returned by provider calls.
//!
//! Every metadata source implements [`MetadataProvider`]: an immutable
//! [`ProviderDescriptor`] plus an unconditional health check. Optional
//! operations are separate traits ([`SearchProvider`],
//! [`MetadataFetchProvider`], [`SyncProvider`]) exposed through the `as_*`
//! accessors. The registry checks the declared [`Capabilities`] against those
//! accessors at registration, so a declared-but-missing operation is rejected
//! at startup rather than failing at call time.
//!
//! Providers are shared behind `Arc` across tasks and must be internally
//! thread-safe.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sw_core::{HealthStatus, ProviderId};

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Operation a provider may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Search,
    MetadataFetch,
    Sync,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Search, Capability::MetadataFetch, Capability::Sync];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Search => "search",
            Capability::MetadataFetch => "metadata-fetch",
            Capability::Sync => "sync",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability flags declared by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub has_search: bool,
    pub has_metadata_fetch: bool,
    pub has_sync: bool,
    /// Needs externally supplied credentials to work.
    pub requires_auth: bool,
}

impl Capabilities {
    /// No optional operations, no credentials.
    pub const fn none() -> Self {
        Self {
            has_search: false,
            has_metadata_fetch: false,
            has_sync: false,
            requires_auth: false,
        }
    }

    pub const fn with_search(mut self) -> Self {
        self.has_search = true;
        self
    }

    pub const fn with_metadata_fetch(mut self) -> Self {
        self.has_metadata_fetch = true;
        self
    }

    pub const fn with_sync(mut self) -> Self {
        self.has_sync = true;
        self
    }

    pub const fn with_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn supports(self, capability: Capability) -> bool {
        match capability {
            Capability::Search => self.has_search,
            Capability::MetadataFetch => self.has_metadata_fetch,
            Capability::Sync => self.has_sync,
        }
    }

    /// Declared operation capabilities, in [`Capability::ALL`] order.
    pub fn declared(self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|&c| self.supports(c))
            .collect()
    }
}

/// Identity and capability set of a provider. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub name: String,
    pub capabilities: Capabilities,
}

impl ProviderDescriptor {
    pub fn new(id: impl Into<ProviderId>, name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capabilities,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A single result returned from a metadata search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Provider-specific identifier, usable with `fetch_metadata`.
    pub external_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
    pub cover_url: Option<String>,
    /// Provider that returned this result.
    pub provider: ProviderId,
}

/// Full bibliographic metadata for one book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookMetadata {
    pub external_id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    /// ISO-8601 date or year, as precise as the source knows it.
    pub published_date: Option<String>,
    pub page_count: Option<u32>,
    pub isbn_10: Option<String>,
    pub isbn_13: Option<String>,
    pub language: Option<String>,
    pub subjects: Vec<String>,
    pub cover_url: Option<String>,
    /// External IDs keyed by source name (e.g. `{"isbn": "...", "goodreads": "..."}`).
    pub provider_ids: HashMap<String, String>,
}

/// Outcome of a whole-library sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Books the provider returned for import.
    pub books: Vec<BookMetadata>,
    /// Entries the provider could not turn into books.
    pub skipped: u32,
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn imported(&self) -> usize {
        self.books.len()
    }
}

// ---------------------------------------------------------------------------
// Provider traits
// ---------------------------------------------------------------------------

/// Base contract every metadata source satisfies.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    fn id(&self) -> &ProviderId {
        &self.descriptor().id
    }

    /// Probe the backend. An `Err` is treated as [`HealthStatus::Unavailable`].
    async fn health_check(&self) -> anyhow::Result<HealthStatus>;

    /// Search operation, if this provider implements one.
    fn as_search(&self) -> Option<&dyn SearchProvider> {
        None
    }

    /// Metadata fetch operation, if this provider implements one.
    fn as_metadata_fetch(&self) -> Option<&dyn MetadataFetchProvider> {
        None
    }

    /// Sync operation, if this provider implements one.
    fn as_sync(&self) -> Option<&dyn SyncProvider> {
        None
    }

    /// Whether an implementation is present for `capability`, regardless of
    /// what the descriptor declares.
    fn implements(&self, capability: Capability) -> bool {
        match capability {
            Capability::Search => self.as_search().is_some(),
            Capability::MetadataFetch => self.as_metadata_fetch().is_some(),
            Capability::Sync => self.as_sync().is_some(),
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Free-text search. Results are in the provider's relevance order.
    async fn search(&self, query: &str) -> anyhow::Result<Vec<SearchResult>>;
}

#[async_trait]
pub trait MetadataFetchProvider: Send + Sync {
    /// Fetch full metadata for a provider-specific identifier.
    async fn fetch_metadata(&self, external_id: &str) -> anyhow::Result<BookMetadata>;
}

#[async_trait]
pub trait SyncProvider: Send + Sync {
    /// Pull the provider's whole library.
    async fn sync(&self) -> anyhow::Result<SyncResult>;
}
