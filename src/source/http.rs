use crate::model::{CatalogItem, Listing, PromotionItem, SourceError, StoreFilter};
use crate::source::traits::ListingSource;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// Reads the `listings` and `promotions` tables of a hosted REST database.
pub struct HttpListingSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpListingSource {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent("price-matcher/0.1")
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub(crate) fn build_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    /// PostgREST-style `in.(...)` filter on the store column.
    pub(crate) fn store_query(filter: &StoreFilter) -> Vec<(String, String)> {
        let mut query = vec![("select".to_string(), "*".to_string())];
        if !filter.stores.is_empty() {
            let quoted: Vec<String> = filter
                .stores
                .iter()
                .map(|s| format!("\"{}\"", s.replace('"', "")))
                .collect();
            query.push(("store".to_string(), format!("in.({})", quoted.join(","))));
        }
        query
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    async fn fetch_table<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: &StoreFilter,
    ) -> Result<Vec<T>, SourceError> {
        let url = self.build_url(table);
        debug!("GET {}", url);

        let response = self
            .authorize(self.client.get(&url).query(&Self::store_query(filter)))
            .send()
            .await
            .map_err(|e| if e.is_timeout() { SourceError::Timeout } else { SourceError::Http(e) })?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl ListingSource for HttpListingSource {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, filter: &StoreFilter) -> Result<Vec<Listing>, SourceError> {
        let (items, promotions) = futures::try_join!(
            self.fetch_table::<CatalogItem>("listings", filter),
            self.fetch_table::<PromotionItem>("promotions", filter),
        )?;

        info!(
            "Fetched {} listings and {} promotions from {}",
            items.len(),
            promotions.len(),
            self.base_url
        );

        Ok(items
            .into_iter()
            .map(Listing::Regular)
            .chain(promotions.into_iter().map(Listing::Promotion))
            .collect())
    }
}
