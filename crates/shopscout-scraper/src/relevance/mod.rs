//! Contract with the external relevance-filtering service.
//!
//! The fleet search never ranks records itself. When the caller asks for a
//! top-N cut or a natural-language filter, each site's records are handed to
//! a [`RelevanceFilter`] and whatever it returns replaces that site's list.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shopscout_core::NormalizedRecord;
use thiserror::Error;

pub use http::HttpRelevanceClient;

#[derive(Debug, Error)]
pub enum RelevanceError {
    #[error("relevance request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relevance service returned HTTP {status} from {endpoint}")]
    UnexpectedStatus { status: u16, endpoint: String },

    #[error("failed to parse relevance response from {endpoint}: {source}")]
    Deserialize {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("relevance response broke the contract: {0}")]
    Contract(String),
}

/// Records kept by the provider, with its optional explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredRecords {
    pub records: Vec<NormalizedRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// One site's records, keyed by domain for the cross-site reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecords {
    pub domain: String,
    pub records: Vec<NormalizedRecord>,
}

#[async_trait]
pub trait RelevanceFilter: Send + Sync {
    /// Selects the records relevant to `query`, optionally capped at `top_n`
    /// and constrained by free-text `filter`.
    ///
    /// # Errors
    ///
    /// Any [`RelevanceError`]; callers fall back to the unfiltered records.
    async fn filter_by_relevance(
        &self,
        records: &[NormalizedRecord],
        query: &str,
        top_n: Option<u32>,
        filter: Option<&str>,
    ) -> Result<FilteredRecords, RelevanceError>;

    /// Reorders each site's records by similarity to `query`, comparing
    /// across sites. Returns the same sites with reordered lists.
    ///
    /// # Errors
    ///
    /// Any [`RelevanceError`]; callers keep the existing order.
    async fn sort_by_similarity_across_sites(
        &self,
        stores: &[SiteRecords],
        query: &str,
    ) -> Result<Vec<SiteRecords>, RelevanceError>;
}
