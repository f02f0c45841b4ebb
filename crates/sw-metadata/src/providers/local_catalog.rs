//! Local catalog provider.
//!
//! Reads a JSON array of catalog entries from disk (typically an export from
//! another library manager) and serves search, metadata fetch and whole
//! catalog sync from it. The file is re-read on every call so edits are
//! picked up without a restart.
//!
//! ```json
//! [
//!   {"id": "b1", "title": "Dune", "authors": ["Frank Herbert"], "isbn_13": "9780441013593"}
//! ]
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use sw_core::HealthStatus;
use tracing::{debug, warn};

use crate::provider::{
    BookMetadata, Capabilities, MetadataFetchProvider, MetadataProvider, ProviderDescriptor,
    SearchProvider, SearchResult, SyncProvider, SyncResult,
};

pub const LOCAL_CATALOG_PROVIDER_ID: &str = "local-catalog";

// ---------------------------------------------------------------------------
// File format (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct CatalogEntry {
    id: String,
    title: String,
    subtitle: Option<String>,
    authors: Vec<String>,
    description: Option<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    page_count: Option<u32>,
    isbn_10: Option<String>,
    isbn_13: Option<String>,
    language: Option<String>,
    subjects: Vec<String>,
    cover_url: Option<String>,
}

impl CatalogEntry {
    fn matches(&self, needle: &str) -> bool {
        let contains = |s: &str| s.to_lowercase().contains(needle);
        contains(self.title.as_str())
            || self.authors.iter().any(|a| contains(a.as_str()))
            || self.isbn_10.as_deref().is_some_and(contains)
            || self.isbn_13.as_deref().is_some_and(contains)
    }

    fn published_year(&self) -> Option<i32> {
        self.published_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }

    fn to_search_result(&self, provider: &ProviderDescriptor) -> SearchResult {
        SearchResult {
            external_id: self.id.clone(),
            title: self.title.clone(),
            authors: self.authors.clone(),
            published_year: self.published_year(),
            isbn: self.isbn_13.clone().or_else(|| self.isbn_10.clone()),
            cover_url: self.cover_url.clone(),
            provider: provider.id.clone(),
        }
    }

    fn into_metadata(self) -> BookMetadata {
        let mut provider_ids = HashMap::new();
        provider_ids.insert(LOCAL_CATALOG_PROVIDER_ID.to_string(), self.id.clone());
        if let Some(isbn) = self.isbn_13.as_ref().or(self.isbn_10.as_ref()) {
            provider_ids.insert("isbn".to_string(), isbn.clone());
        }

        BookMetadata {
            external_id: self.id,
            title: self.title,
            subtitle: self.subtitle,
            authors: self.authors,
            description: self.description,
            publisher: self.publisher,
            published_date: self.published_date,
            page_count: self.page_count,
            isbn_10: self.isbn_10,
            isbn_13: self.isbn_13,
            language: self.language,
            subjects: self.subjects,
            cover_url: self.cover_url,
            provider_ids,
        }
    }
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// Metadata provider backed by a JSON catalog file.
pub struct LocalCatalogProvider {
    descriptor: ProviderDescriptor,
    path: PathBuf,
}

impl LocalCatalogProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(
                LOCAL_CATALOG_PROVIDER_ID,
                "Local Catalog",
                Capabilities::none()
                    .with_search()
                    .with_metadata_fetch()
                    .with_sync(),
            ),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> anyhow::Result<Vec<CatalogEntry>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read catalog {}", self.path.display()))?;
        let entries: Vec<CatalogEntry> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse catalog {}", self.path.display()))?;
        debug!(path = %self.path.display(), entries = entries.len(), "Loaded local catalog");
        Ok(entries)
    }
}

#[async_trait]
impl MetadataProvider for LocalCatalogProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn health_check(&self) -> anyhow::Result<HealthStatus> {
        match self.load().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Local catalog unavailable");
                Ok(HealthStatus::Unavailable)
            }
        }
    }

    fn as_search(&self) -> Option<&dyn SearchProvider> {
        Some(self)
    }

    fn as_metadata_fetch(&self) -> Option<&dyn MetadataFetchProvider> {
        Some(self)
    }

    fn as_sync(&self) -> Option<&dyn SyncProvider> {
        Some(self)
    }
}

#[async_trait]
impl SearchProvider for LocalCatalogProvider {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<SearchResult>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.load().await?;
        Ok(entries
            .iter()
            .filter(|e| e.matches(&needle))
            .map(|e| e.to_search_result(&self.descriptor))
            .collect())
    }
}

#[async_trait]
impl MetadataFetchProvider for LocalCatalogProvider {
    async fn fetch_metadata(&self, external_id: &str) -> anyhow::Result<BookMetadata> {
        self.load()
            .await?
            .into_iter()
            .find(|e| e.id == external_id)
            .map(CatalogEntry::into_metadata)
            .with_context(|| format!("no catalog entry with id '{external_id}'"))
    }
}

#[async_trait]
impl SyncProvider for LocalCatalogProvider {
    async fn sync(&self) -> anyhow::Result<SyncResult> {
        let mut result = SyncResult::default();
        for (index, entry) in self.load().await?.into_iter().enumerate() {
            if entry.id.trim().is_empty() || entry.title.trim().is_empty() {
                result.skipped += 1;
                result
                    .errors
                    .push(format!("entry {index}: missing id or title"));
                continue;
            }
            result.books.push(entry.into_metadata());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CATALOG: &str = r#"[
        {"id": "b1", "title": "Dune", "authors": ["Frank Herbert"],
         "isbn_13": "9780441013593", "published_date": "1965-08-01"},
        {"id": "b2", "title": "The Left Hand of Darkness", "authors": ["Ursula K. Le Guin"],
         "isbn_10": "0441478123"},
        {"id": "", "title": "Orphan"}
    ]"#;

    fn catalog_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn search_matches_title_author_and_isbn() {
        let file = catalog_file(CATALOG);
        let provider = LocalCatalogProvider::new(file.path());

        let by_title = provider.search("dUnE").await.unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].external_id, "b1");
        assert_eq!(by_title[0].published_year, Some(1965));
        assert_eq!(by_title[0].provider.as_str(), "local-catalog");

        let by_author = provider.search("le guin").await.unwrap();
        assert_eq!(by_author[0].external_id, "b2");
        assert_eq!(by_author[0].isbn.as_deref(), Some("0441478123"));

        let by_isbn = provider.search("9780441013593").await.unwrap();
        assert_eq!(by_isbn[0].title, "Dune");

        assert!(provider.search("   ").await.unwrap().is_empty());
        assert!(provider.search("neuromancer").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_by_id() {
        let file = catalog_file(CATALOG);
        let provider = LocalCatalogProvider::new(file.path());

        let book = provider.fetch_metadata("b1").await.unwrap();
        assert_eq!(book.title, "Dune");
        assert_eq!(book.provider_ids["local-catalog"], "b1");
        assert_eq!(book.provider_ids["isbn"], "9780441013593");

        let err = provider.fetch_metadata("missing").await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn sync_skips_incomplete_entries() {
        let file = catalog_file(CATALOG);
        let provider = LocalCatalogProvider::new(file.path());

        let result = provider.sync().await.unwrap();
        assert_eq!(result.imported(), 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn health_reflects_readability() {
        let file = catalog_file(CATALOG);
        let provider = LocalCatalogProvider::new(file.path());
        assert_eq!(provider.health_check().await.unwrap(), HealthStatus::Healthy);

        let bad = catalog_file("{not json");
        let provider = LocalCatalogProvider::new(bad.path());
        assert_eq!(provider.health_check().await.unwrap(), HealthStatus::Unavailable);

        let provider = LocalCatalogProvider::new("/nonexistent/catalog.json");
        assert_eq!(provider.health_check().await.unwrap(), HealthStatus::Unavailable);
        assert!(provider.search("dune").await.is_err());
    }
}
