//! One query, every configured site, concurrently.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use shopscout_core::{
    DescriptorSource, FilterStatus, FleetSearchResult, NormalizedRecord, SiteDescriptor,
    StoreScrapeOutcome,
};
use uuid::Uuid;

use crate::error::ScraperError;
use crate::relevance::{RelevanceFilter, SiteRecords};
use crate::store::{elapsed_ms, StoreScraper};
use crate::urls::build_search_url;

/// Default worker cap for the per-site fan-out.
pub const DEFAULT_MAX_CONCURRENT_SITES: usize = 4;

/// Caller input for a fleet search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    /// Advisory cap handed to the relevance filter.
    pub top_n: Option<u32>,
    pub natural_language_filter: Option<String>,
    /// Replaces each descriptor's page budget.
    pub max_pages_override: Option<u32>,
    /// Domains or aliases to search. Empty means every registered site.
    pub sites: Vec<String>,
}

impl SearchRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    fn wants_filtering(&self) -> bool {
        self.top_n.is_some()
            || self
                .natural_language_filter
                .as_deref()
                .is_some_and(|f| !f.trim().is_empty())
    }

    fn validate(&self) -> Result<(), ScraperError> {
        if self.query.trim().is_empty() {
            return Err(ScraperError::InvalidRequest("query must not be empty".into()));
        }
        if self.top_n == Some(0) {
            return Err(ScraperError::InvalidRequest("top_n must be at least 1".into()));
        }
        if self.max_pages_override == Some(0) {
            return Err(ScraperError::InvalidRequest(
                "max_pages must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A requested site after registry lookup.
enum Target {
    Known(Arc<SiteDescriptor>),
    Unknown(String),
}

/// Runs one [`StoreScraper`] per site and aggregates the outcomes.
///
/// A site's failure is confined to its own outcome. The only error surfaced
/// to the caller is a malformed request.
pub struct FleetSearch {
    descriptors: Arc<dyn DescriptorSource>,
    scraper: StoreScraper,
    relevance: Option<Arc<dyn RelevanceFilter>>,
    max_concurrent_sites: usize,
}

impl FleetSearch {
    #[must_use]
    pub fn new(
        descriptors: Arc<dyn DescriptorSource>,
        scraper: StoreScraper,
        max_concurrent_sites: usize,
    ) -> Self {
        Self {
            descriptors,
            scraper,
            relevance: None,
            max_concurrent_sites: max_concurrent_sites.max(1),
        }
    }

    #[must_use]
    pub fn with_relevance(mut self, relevance: Arc<dyn RelevanceFilter>) -> Self {
        self.relevance = Some(relevance);
        self
    }

    /// Searches every requested site for `request.query`.
    ///
    /// Outcomes are returned in request order (registry order when no sites
    /// are named), whatever order the scrapes finish in.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidRequest`] for a blank query or a zero
    /// `top_n` / `max_pages_override`.
    pub async fn search(&self, request: &SearchRequest) -> Result<FleetSearchResult, ScraperError> {
        request.validate()?;

        let search_id = Uuid::new_v4();
        let searched_at = Utc::now();
        let started = Instant::now();
        let query = request.query.trim();

        let targets = self.resolve_targets(request);
        tracing::info!(
            %search_id,
            query,
            sites = targets.len(),
            max_concurrent = self.max_concurrent_sites,
            "starting fleet search"
        );

        let mut indexed: Vec<(usize, StoreScrapeOutcome)> = stream::iter(targets.iter().enumerate())
            .map(move |(position, target)| async move {
                (position, self.scrape_target(target, query, request).await)
            })
            .buffer_unordered(self.max_concurrent_sites)
            .collect()
            .await;
        indexed.sort_by_key(|(position, _)| *position);
        let mut outcomes: Vec<StoreScrapeOutcome> =
            indexed.into_iter().map(|(_, outcome)| outcome).collect();

        if request.wants_filtering() {
            self.apply_relevance(&mut outcomes, query, request).await;
        }

        let result = FleetSearchResult::from_outcomes(
            search_id,
            query.to_owned(),
            searched_at,
            outcomes,
            elapsed_ms(started),
        );
        tracing::info!(
            %search_id,
            total_stores = result.total_stores,
            successful_stores = result.successful_stores,
            total_products = result.total_products,
            duration_ms = result.duration_ms,
            "fleet search complete"
        );
        Ok(result)
    }

    /// Resolves requested names to descriptors, keeping the first request
    /// position of each site. Domain, alias and `www.` spellings of one site
    /// collapse into a single target; unknown names are kept once each.
    fn resolve_targets(&self, request: &SearchRequest) -> Vec<Target> {
        let names = if request.sites.is_empty() {
            self.descriptors.list_domains()
        } else {
            request.sites.clone()
        };

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            match self.descriptors.get_descriptor(&name) {
                Some(descriptor) => {
                    if seen.insert(descriptor.domain.clone()) {
                        targets.push(Target::Known(descriptor));
                    } else {
                        tracing::debug!(site = %name, "site already requested; skipping duplicate");
                    }
                }
                None => {
                    if seen.insert(name.trim().to_lowercase()) {
                        targets.push(Target::Unknown(name));
                    }
                }
            }
        }
        targets
    }

    async fn scrape_target(
        &self,
        target: &Target,
        query: &str,
        request: &SearchRequest,
    ) -> StoreScrapeOutcome {
        let descriptor = match target {
            Target::Known(descriptor) => descriptor,
            Target::Unknown(site) => {
                let error = ScraperError::ConfigurationMissing { site: site.clone() };
                tracing::warn!(site = %site, error = %error, "skipping site");
                return StoreScrapeOutcome::failed(
                    site.clone(),
                    site.clone(),
                    String::new(),
                    error.to_string(),
                    0,
                );
            }
        };

        match build_search_url(&descriptor.domain, &descriptor.search_url, query) {
            Ok(search_url) => {
                self.scraper
                    .scrape_store(descriptor, &search_url, request.max_pages_override)
                    .await
            }
            Err(e) => {
                tracing::warn!(site = %descriptor.domain, error = %e, "skipping site");
                StoreScrapeOutcome::failed(
                    descriptor.name.clone(),
                    descriptor.domain.clone(),
                    String::new(),
                    e.to_string(),
                    0,
                )
            }
        }
    }

    /// Replaces each successful site's records with the relevance filter's
    /// selection, then applies the cross-site similarity order. Any provider
    /// failure leaves that site's records as scraped.
    async fn apply_relevance(
        &self,
        outcomes: &mut [StoreScrapeOutcome],
        query: &str,
        request: &SearchRequest,
    ) {
        let Some(filter) = &self.relevance else {
            for outcome in outcomes.iter_mut().filter(|o| o.success) {
                outcome.filter = FilterStatus::NotFiltered;
                outcome.filter_note = Some("relevance service not configured".to_owned());
            }
            return;
        };
        let filter_text = request
            .natural_language_filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty());

        futures::future::join_all(outcomes.iter_mut().filter(|o| o.success).map(
            move |outcome| async move {
                if outcome.records.is_empty() {
                    outcome.filter = FilterStatus::Filtered;
                    return;
                }
                match filter
                    .filter_by_relevance(&outcome.records, query, request.top_n, filter_text)
                    .await
                {
                    Ok(filtered) if is_selection(&outcome.records, &filtered.records) => {
                        outcome.records = filtered.records;
                        outcome.filter = FilterStatus::Filtered;
                        outcome.filter_note = filtered.summary;
                    }
                    Ok(_) => {
                        tracing::warn!(
                            site = %outcome.domain,
                            "relevance filter returned records that were not scraped; keeping unfiltered records"
                        );
                        outcome.filter = FilterStatus::NotFiltered;
                        outcome.filter_note =
                            Some("relevance filter returned records that were not scraped".to_owned());
                    }
                    Err(e) => {
                        tracing::warn!(
                            site = %outcome.domain,
                            error = %e,
                            "relevance filtering failed; keeping unfiltered records"
                        );
                        outcome.filter = FilterStatus::NotFiltered;
                        outcome.filter_note = Some(format!("relevance filtering failed: {e}"));
                    }
                }
            },
        ))
        .await;

        let per_site: Vec<SiteRecords> = outcomes
            .iter()
            .filter(|o| o.filter == FilterStatus::Filtered && !o.records.is_empty())
            .map(|o| SiteRecords {
                domain: o.domain.clone(),
                records: o.records.clone(),
            })
            .collect();
        if per_site.is_empty() {
            return;
        }

        match filter.sort_by_similarity_across_sites(&per_site, query).await {
            Ok(sorted) => {
                for site in sorted {
                    let Some(outcome) = outcomes.iter_mut().find(|o| o.domain == site.domain) else {
                        continue;
                    };
                    if is_reordering(&outcome.records, &site.records) {
                        outcome.records = site.records;
                    } else {
                        tracing::warn!(
                            site = %site.domain,
                            "similarity response is not a reordering; keeping filtered order"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "similarity reordering failed; keeping filtered order");
            }
        }
    }
}

fn is_selection(original: &[NormalizedRecord], selected: &[NormalizedRecord]) -> bool {
    selected.iter().all(|r| original.contains(r))
}

fn is_reordering(original: &[NormalizedRecord], reordered: &[NormalizedRecord]) -> bool {
    original.len() == reordered.len() && reordered.iter().all(|r| original.contains(r))
}

#[cfg(test)]
#[path = "fleet_test.rs"]
mod tests;
