//! The fetch, extract, paginate loop for a single site.

use std::sync::Arc;
use std::time::{Duration, Instant};

use shopscout_core::{AppConfig, SiteDescriptor, StoreScrapeOutcome};

use crate::browser::{PageFetcher, RenderOptions};
use crate::error::ScraperError;
use crate::extract::{extract_listings, RawRecord};
use crate::normalize::normalize_records;
use crate::pagination::{PaginationWalker, WalkerState};

/// Pause between successive page fetches against one site.
pub const DEFAULT_POLITENESS_DELAY: Duration = Duration::from_millis(1_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeSettings {
    pub politeness_delay: Duration,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            politeness_delay: DEFAULT_POLITENESS_DELAY,
        }
    }
}

impl ScrapeSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            politeness_delay: Duration::from_millis(config.politeness_delay_ms),
        }
    }
}

/// Scrapes one site's search results across pages.
#[derive(Clone)]
pub struct StoreScraper {
    fetcher: Arc<dyn PageFetcher>,
    settings: ScrapeSettings,
}

impl StoreScraper {
    #[must_use]
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: ScrapeSettings) -> Self {
        Self { fetcher, settings }
    }

    /// Runs the scrape for `descriptor` starting at `search_url`.
    ///
    /// Pages are fetched until the pagination walker is exhausted, then all
    /// records are normalized together against `search_url`. A failure on
    /// any page fails the whole store: records from earlier pages are
    /// discarded and the outcome carries the error.
    pub async fn scrape_store(
        &self,
        descriptor: &SiteDescriptor,
        search_url: &str,
        max_pages_override: Option<u32>,
    ) -> StoreScrapeOutcome {
        let started = Instant::now();

        match self
            .collect_pages(descriptor, search_url, max_pages_override)
            .await
        {
            Ok((raw, pages)) => {
                let records =
                    normalize_records(raw, search_url, descriptor.currency.as_deref());
                let duration_ms = elapsed_ms(started);
                tracing::info!(
                    site = %descriptor.domain,
                    pages,
                    records = records.len(),
                    duration_ms,
                    "store scrape complete"
                );
                StoreScrapeOutcome::succeeded(
                    descriptor.name.clone(),
                    descriptor.domain.clone(),
                    search_url.to_owned(),
                    records,
                    pages,
                    duration_ms,
                )
            }
            Err(e) => {
                let duration_ms = elapsed_ms(started);
                tracing::warn!(
                    site = %descriptor.domain,
                    error = %e,
                    duration_ms,
                    "store scrape failed"
                );
                StoreScrapeOutcome::failed(
                    descriptor.name.clone(),
                    descriptor.domain.clone(),
                    search_url.to_owned(),
                    e.to_string(),
                    duration_ms,
                )
            }
        }
    }

    async fn collect_pages(
        &self,
        descriptor: &SiteDescriptor,
        search_url: &str,
        max_pages_override: Option<u32>,
    ) -> Result<(Vec<RawRecord>, u32), ScraperError> {
        let options = RenderOptions::from_rules(&descriptor.render);
        let mut walker =
            PaginationWalker::new(&descriptor.pagination, search_url, max_pages_override);
        let mut raw = Vec::new();
        let mut pages = 0u32;

        loop {
            if pages > 0 && !self.settings.politeness_delay.is_zero() {
                tokio::time::sleep(self.settings.politeness_delay).await;
            }

            let url = walker.cursor().url.clone();
            let snapshot = self.fetcher.fetch(&url, &options).await?;
            pages += 1;

            let extraction = extract_listings(&snapshot, &descriptor.listing)?;
            tracing::debug!(
                site = %descriptor.domain,
                page = walker.cursor().page_index,
                items = extraction.stats.items_seen,
                kept = extraction.stats.kept,
                missing_name = extraction.stats.missing_name,
                missing_url = extraction.stats.missing_url,
                invalid_price = extraction.stats.invalid_price,
                "extracted listing page"
            );
            raw.extend(extraction.records);

            if let WalkerState::Exhausted(reason) = walker.advance(&snapshot)? {
                tracing::debug!(site = %descriptor.domain, pages, %reason, "pagination finished");
                break;
            }
        }

        Ok((raw, pages))
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
