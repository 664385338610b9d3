use crate::model::{Listing, SourceError, StoreFilter};
use crate::source::traits::ListingSource;
use std::path::PathBuf;
use tracing::info;

/// A JSON array of tagged listings exported to disk.
pub struct JsonFileSource {
    path: PathBuf,
    label: String,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        Self { path, label }
    }
}

#[async_trait::async_trait]
impl ListingSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self, filter: &StoreFilter) -> Result<Vec<Listing>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let listings: Vec<Listing> = serde_json::from_str(&content)?;
        let filtered: Vec<Listing> = listings
            .into_iter()
            .filter(|l| filter.matches(l.store()))
            .collect();

        info!("Loaded {} listings from {}", filtered.len(), self.label);
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_and_filters_tagged_listings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.json");
        std::fs::write(
            &path,
            r#"[
                { "kind": "regular", "id": "1", "name": "Milk", "price": 5.5, "store": "Lulu" },
                { "kind": "promotion", "id": "2", "name": "Milk", "new_price": 4.0,
                  "previous_price": 5.0, "store": "Carrefour" }
            ]"#,
        )
        .unwrap();

        let source = JsonFileSource::new(&path);
        let all = source.fetch(&StoreFilter::all()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[1].is_promotion());
        assert_eq!(all[1].price(), 4.0);

        let lulu = source
            .fetch(&StoreFilter { stores: vec!["lulu".into()] })
            .await
            .unwrap();
        assert_eq!(lulu.len(), 1);
        assert_eq!(lulu[0].id(), "1");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let source = JsonFileSource::new("/nonexistent/listings.json");
        let err = source.fetch(&StoreFilter::all()).await.unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }
}
