use crate::model::{Listing, SourceError, StoreFilter};

/// Supplies regular and promotional listings for a store filter.
#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, filter: &StoreFilter) -> Result<Vec<Listing>, SourceError>;
}
