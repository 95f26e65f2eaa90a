use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shopscout_core::{AppConfig, NormalizedRecord};

use super::{FilteredRecords, RelevanceError, RelevanceFilter, SiteRecords};

/// [`RelevanceFilter`] backed by the relevance service's JSON API.
///
/// `POST {base}/filter` and `POST {base}/similarity`.
pub struct HttpRelevanceClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct FilterRequest<'a> {
    records: &'a [NormalizedRecord],
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a str>,
}

#[derive(Serialize)]
struct SimilarityRequest<'a> {
    query: &'a str,
    stores: &'a [SiteRecords],
}

#[derive(serde::Deserialize)]
struct SimilarityResponse {
    stores: Vec<SiteRecords>,
}

impl HttpRelevanceClient {
    /// # Errors
    ///
    /// Returns [`RelevanceError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RelevanceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Builds a client when `SHOPSCOUT_RELEVANCE_URL` is configured.
    ///
    /// # Errors
    ///
    /// Returns [`RelevanceError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, RelevanceError> {
        config
            .relevance_url
            .as_deref()
            .map(|url| Self::new(url, Duration::from_secs(config.relevance_timeout_secs)))
            .transpose()
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, RelevanceError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelevanceError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint: endpoint.to_owned(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|source| RelevanceError::Deserialize {
            endpoint: endpoint.to_owned(),
            source,
        })
    }
}

#[async_trait]
impl RelevanceFilter for HttpRelevanceClient {
    async fn filter_by_relevance(
        &self,
        records: &[NormalizedRecord],
        query: &str,
        top_n: Option<u32>,
        filter: Option<&str>,
    ) -> Result<FilteredRecords, RelevanceError> {
        let request = FilterRequest {
            records,
            query,
            top_n,
            filter,
        };
        self.post("filter", &request).await
    }

    async fn sort_by_similarity_across_sites(
        &self,
        stores: &[SiteRecords],
        query: &str,
    ) -> Result<Vec<SiteRecords>, RelevanceError> {
        let request = SimilarityRequest { query, stores };
        let response: SimilarityResponse = self.post("similarity", &request).await?;

        for site in &response.stores {
            if !stores.iter().any(|s| s.domain == site.domain) {
                return Err(RelevanceError::Contract(format!(
                    "similarity response names unknown site \"{}\"",
                    site.domain
                )));
            }
        }
        Ok(response.stores)
    }
}
