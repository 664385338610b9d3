// Listing sources: remote REST database, local JSON export, SQLite cache.

pub mod file;
pub mod http;
pub mod traits;

pub use file::JsonFileSource;
pub use http::HttpListingSource;
pub use traits::ListingSource;

use crate::config::SourceConfig;
use crate::model::{Listing, SourceError, StoreFilter};
use crate::storage::SqliteStorage;
use futures::future::join_all;
use std::collections::HashSet;
use tracing::warn;

pub fn build_source(config: &SourceConfig) -> Result<Box<dyn ListingSource>, SourceError> {
    let source: Box<dyn ListingSource> = match config {
        SourceConfig::Http { base_url, api_key } => {
            Box::new(HttpListingSource::new(base_url, api_key.clone())?)
        }
        SourceConfig::Sqlite { path } => Box::new(SqliteStorage::new(path)?),
        SourceConfig::File { path } => Box::new(JsonFileSource::new(path.clone())),
    };
    Ok(source)
}

/// Fetches every source concurrently. A failing source is logged and skipped;
/// listings already seen under the same id are dropped.
pub async fn fetch_all(sources: &[Box<dyn ListingSource>], filter: &StoreFilter) -> Vec<Listing> {
    let results = join_all(sources.iter().map(|s| s.fetch(filter))).await;

    let mut seen = HashSet::new();
    let mut listings = Vec::new();
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(batch) => {
                listings.extend(batch.into_iter().filter(|l| seen.insert(l.id().to_string())));
            }
            Err(e) => warn!("Source {} failed: {}", source.name(), e),
        }
    }
    listings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn failing_sources_are_skipped_and_ids_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(
            &path,
            r#"[{ "kind": "regular", "id": "1", "name": "Milk", "price": 5.5, "store": "Lulu" }]"#,
        )
        .unwrap();

        let sources: Vec<Box<dyn ListingSource>> = vec![
            build_source(&SourceConfig::File { path: path.clone() }).unwrap(),
            build_source(&SourceConfig::File { path: PathBuf::from("/nonexistent.json") }).unwrap(),
            build_source(&SourceConfig::File { path }).unwrap(),
        ];

        let listings = fetch_all(&sources, &StoreFilter::all()).await;
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].id(), "1");
    }
}
