//! Command handlers. Results go to stdout; logs go to stderr.

use std::sync::Arc;

use shopscout_core::{load_descriptors, AppConfig, DescriptorRegistry, DescriptorSource};
use shopscout_scraper::{
    ChromiumFetcher, ChromiumSettings, FleetSearch, HttpRelevanceClient, PageFetcher,
    ScrapeSettings, SearchRequest, StoreScraper,
};

fn load_registry(config: &AppConfig) -> anyhow::Result<DescriptorRegistry> {
    let registry = load_descriptors(&config.sites_path)?;
    if registry.is_empty() {
        anyhow::bail!(
            "no sites configured in {}",
            config.sites_path.display()
        );
    }
    Ok(registry)
}

/// Launches the browser, runs the fleet search, and prints the result.
///
/// The browser is closed whether or not the search succeeds.
///
/// # Errors
///
/// Returns an error if the sites file is invalid, the browser cannot be
/// launched, the relevance client cannot be built, or the request itself is
/// malformed. Per-site failures are reported inside the JSON result.
pub(crate) async fn run_search(
    config: &AppConfig,
    request: &SearchRequest,
    pretty: bool,
) -> anyhow::Result<()> {
    let registry = load_registry(config)?;
    let relevance = HttpRelevanceClient::from_config(config)
        .map_err(|e| anyhow::anyhow!("failed to build relevance client: {e}"))?;

    let fetcher = Arc::new(
        ChromiumFetcher::launch(ChromiumSettings::from_config(config))
            .await
            .map_err(|e| anyhow::anyhow!("failed to launch browser: {e}"))?,
    );
    let scraper = StoreScraper::new(
        Arc::clone(&fetcher) as Arc<dyn PageFetcher>,
        ScrapeSettings::from_config(config),
    );
    let mut fleet = FleetSearch::new(Arc::new(registry), scraper, config.max_concurrent_sites);
    if let Some(client) = relevance {
        fleet = fleet.with_relevance(Arc::new(client));
    }

    let outcome = fleet.search(request).await;
    if let Err(e) = fetcher.close().await {
        tracing::warn!(error = %e, "failed to close browser cleanly");
    }
    let result = outcome?;

    let json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{json}");
    Ok(())
}

/// Prints one `domain<TAB>name<TAB>aliases` line per configured site.
///
/// # Errors
///
/// Returns an error if the sites file cannot be loaded.
pub(crate) fn run_sites(config: &AppConfig) -> anyhow::Result<()> {
    let registry = load_registry(config)?;
    for domain in registry.list_domains() {
        if let Some(site) = registry.get_descriptor(&domain) {
            println!("{}\t{}\t{}", site.domain, site.name, site.aliases.join(","));
        }
    }
    Ok(())
}
