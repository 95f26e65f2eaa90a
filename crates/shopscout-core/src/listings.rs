use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product listing scraped from a site's search results, normalized for
/// comparison across sites.
///
/// Availability is never carried at this level; stock text differs too much
/// between sites to compare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Absolute product page URL.
    pub url: String,
    /// Trimmed, non-empty product name.
    pub name: String,
    /// Price rounded to the nearest whole currency unit. Always `> 0`.
    pub price: u64,
    /// ISO 4217 code when the site or descriptor declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Absolute image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Whether a store's records went through the relevance filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStatus {
    /// The caller asked for neither a top-N cut nor a filter text.
    NotRequested,
    /// Records were replaced by the relevance provider's selection.
    Filtered,
    /// Filtering was requested but the provider failed or is not configured;
    /// the records are the unfiltered scrape.
    NotFiltered,
}

/// Result of scraping one site for one query.
///
/// When `success` is `false`, `records` is empty and `error` is set; a
/// successful outcome never carries an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreScrapeOutcome {
    /// Display name of the site (the domain when no descriptor was found).
    pub store: String,
    pub domain: String,
    pub records: Vec<NormalizedRecord>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub search_url: String,
    /// Number of listing pages fetched and extracted.
    pub pages: u32,
    pub duration_ms: u64,
    pub filter: FilterStatus,
    /// Provider summary when filtered, or the reason filtering was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_note: Option<String>,
}

impl StoreScrapeOutcome {
    /// Builds a successful outcome.
    #[must_use]
    pub fn succeeded(
        store: String,
        domain: String,
        search_url: String,
        records: Vec<NormalizedRecord>,
        pages: u32,
        duration_ms: u64,
    ) -> Self {
        Self {
            store,
            domain,
            records,
            success: true,
            error: None,
            search_url,
            pages,
            duration_ms,
            filter: FilterStatus::NotRequested,
            filter_note: None,
        }
    }

    /// Builds a failed outcome. Records are always empty.
    #[must_use]
    pub fn failed(
        store: String,
        domain: String,
        search_url: String,
        error: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            store,
            domain,
            records: Vec::new(),
            success: false,
            error: Some(error),
            search_url,
            pages: 0,
            duration_ms,
            filter: FilterStatus::NotRequested,
            filter_note: None,
        }
    }
}

/// Aggregated result of one query run against many sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSearchResult {
    pub search_id: Uuid,
    pub search: String,
    pub searched_at: DateTime<Utc>,
    pub total_stores: usize,
    pub successful_stores: usize,
    /// Sum of `records.len()` over every outcome.
    pub total_products: usize,
    pub stores: Vec<StoreScrapeOutcome>,
    pub duration_ms: u64,
}

impl FleetSearchResult {
    /// Aggregates per-store outcomes, deriving the counters from them.
    #[must_use]
    pub fn from_outcomes(
        search_id: Uuid,
        search: String,
        searched_at: DateTime<Utc>,
        stores: Vec<StoreScrapeOutcome>,
        duration_ms: u64,
    ) -> Self {
        let successful_stores = stores.iter().filter(|s| s.success).count();
        let total_products = stores.iter().map(|s| s.records.len()).sum();
        Self {
            search_id,
            search,
            searched_at,
            total_stores: stores.len(),
            successful_stores,
            total_products,
            stores,
            duration_ms,
        }
    }
}
