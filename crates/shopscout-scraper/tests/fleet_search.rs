//! End-to-end fleet searches over descriptors parsed from YAML, with an
//! in-memory page fetcher standing in for the browser.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shopscout_core::{parse_descriptors, DescriptorSource};
use shopscout_scraper::{
    FleetSearch, NavigationFailureKind, PageFetcher, PageSnapshot, RenderOptions, ScrapeSettings,
    ScraperError, SearchRequest, StoreScraper,
};

const SITES_YAML: &str = r#"
sites:
  - name: Alpha Outfitters
    domain: alpha.example
    aliases: [alpha]
    search_url: "https://alpha.example/search?q={query}"
    currency: usd
    listing:
      container: "div.grid"
      item: "div.card"
      fields:
        url: { selector: "a", attr: href }
        title: { selector: "h2" }
        price: { selector: ".amount" }
        image: { selector: "img", attr: data-src }
    pagination:
      enabled: true
      max_pages: 2
      next: { selector: "link[rel=next]", attr: href }
  - name: Beta Mercado
    domain: beta.example
    search_url: "https://beta.example/buscar/{query}"
    currency: CRC
    listing:
      item: "article.product"
      fields:
        url: { selector: "a.link", attr: href }
        title: { selector: "a.link" }
        price: { selector: "span.precio" }
    pagination:
      enabled: false
  - name: Gamma Goods
    domain: gamma.example
    search_url: "https://gamma.example/s?k={query}"
    listing:
      item: "li.result"
      fields:
        url: { selector: "a", attr: href }
        title: { selector: "a" }
        price: { selector: ".p" }
"#;

fn alpha_page(page: u32, next: Option<&str>) -> String {
    let cards: String = (1..=4)
        .map(|i| {
            format!(
                r#"<div class="card"><a href="/item/{page}{i}"><h2> Trail Mug {page}{i} </h2></a>
                   <span class="amount">$1,2{i}9.50</span><img data-src="/img/{page}{i}.png"></div>"#
            )
        })
        .collect();
    let next = next
        .map(|href| format!(r#"<link rel="next" href="{href}">"#))
        .unwrap_or_default();
    format!(r#"<html><head>{next}</head><body><div class="grid">{cards}</div></body></html>"#)
}

fn beta_page() -> String {
    r#"<html><body>
        <article class="product"><a class="link" href="https://beta.example/p/taza">Taza de café</a><span class="precio">₡49.950</span></article>
        <article class="product"><a class="link" href="/p/agotado">Agotado</a><span class="precio">Consultar</span></article>
    </body></html>"#
        .to_owned()
}

/// Serves canned pages and records peak concurrency.
#[derive(Default)]
struct StaticFetcher {
    pages: HashMap<String, String>,
    timeouts: Vec<String>,
    delay: Duration,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str, _options: &RenderOptions) -> Result<PageSnapshot, ScraperError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.timeouts.iter().any(|t| t == url) {
            return Err(ScraperError::Navigation {
                url: url.to_owned(),
                kind: NavigationFailureKind::Timeout,
                detail: "exceeded 30s".to_owned(),
            });
        }
        self.pages
            .get(url)
            .map(|html| PageSnapshot {
                html: html.clone(),
                final_url: url.to_owned(),
            })
            .ok_or_else(|| ScraperError::Navigation {
                url: url.to_owned(),
                kind: NavigationFailureKind::Unreachable,
                detail: "net::ERR_NAME_NOT_RESOLVED".to_owned(),
            })
    }
}

fn fleet_with(fetcher: Arc<StaticFetcher>, max_concurrent: usize) -> FleetSearch {
    let registry = parse_descriptors(SITES_YAML).expect("fixture YAML is valid");
    let scraper = StoreScraper::new(
        fetcher as Arc<dyn PageFetcher>,
        ScrapeSettings {
            politeness_delay: Duration::ZERO,
        },
    );
    FleetSearch::new(
        Arc::new(registry) as Arc<dyn DescriptorSource>,
        scraper,
        max_concurrent,
    )
}

fn standard_fetcher() -> StaticFetcher {
    let mut pages = HashMap::new();
    pages.insert(
        "https://alpha.example/search?q=travel%20mug".to_owned(),
        alpha_page(1, Some("?q=travel%20mug&page=2")),
    );
    pages.insert(
        "https://alpha.example/search?q=travel%20mug&page=2".to_owned(),
        alpha_page(2, Some("?q=travel%20mug&page=3")),
    );
    pages.insert(
        "https://alpha.example/search?q=travel%20mug&page=3".to_owned(),
        alpha_page(3, None),
    );
    pages.insert(
        "https://beta.example/buscar/travel%20mug".to_owned(),
        beta_page(),
    );
    StaticFetcher {
        pages,
        timeouts: vec!["https://gamma.example/s?k=travel%20mug".to_owned()],
        ..StaticFetcher::default()
    }
}

#[tokio::test]
async fn searches_every_registered_site_and_isolates_the_timeout() {
    let fetcher = Arc::new(standard_fetcher());
    let fleet = fleet_with(Arc::clone(&fetcher), 4);

    let result = fleet
        .search(&SearchRequest::new("travel mug"))
        .await
        .expect("valid request");

    assert_eq!(result.search, "travel mug");
    assert_eq!(result.total_stores, 3);
    assert_eq!(result.successful_stores, 2);
    assert_eq!(result.total_products, 9);
    // alpha: 2 pages (descriptor budget), beta: 1, gamma: 1 failed.
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 4);

    let alpha = &result.stores[0];
    assert_eq!(alpha.store, "Alpha Outfitters");
    assert_eq!(alpha.pages, 2);
    assert_eq!(alpha.records.len(), 8);
    assert_eq!(alpha.records[0].url, "https://alpha.example/item/11");
    assert_eq!(alpha.records[0].name, "Trail Mug 11");
    assert_eq!(alpha.records[0].price, 1_220);
    assert_eq!(alpha.records[0].currency.as_deref(), Some("USD"));
    assert_eq!(
        alpha.records[0].image.as_deref(),
        Some("https://alpha.example/img/11.png")
    );

    let beta = &result.stores[1];
    assert_eq!(beta.records.len(), 1);
    assert_eq!(beta.records[0].name, "Taza de café");
    assert_eq!(beta.records[0].price, 49_950);
    assert_eq!(beta.records[0].currency.as_deref(), Some("CRC"));

    let gamma = &result.stores[2];
    assert!(!gamma.success);
    assert!(gamma.records.is_empty());
    assert!(gamma.error.as_deref().unwrap_or_default().contains("timeout"));
}

#[tokio::test]
async fn max_pages_override_walks_further() {
    let fetcher = Arc::new(standard_fetcher());
    let fleet = fleet_with(Arc::clone(&fetcher), 4);
    let request = SearchRequest {
        max_pages_override: Some(10),
        sites: vec!["alpha".to_owned()],
        ..SearchRequest::new("travel mug")
    };

    let result = fleet.search(&request).await.expect("valid request");

    assert_eq!(result.total_stores, 1);
    assert_eq!(result.stores[0].pages, 3);
    assert_eq!(result.total_products, 12);
}

#[tokio::test]
async fn concurrency_is_capped() {
    let fetcher = Arc::new(StaticFetcher {
        delay: Duration::from_millis(50),
        ..standard_fetcher()
    });
    let fleet = fleet_with(Arc::clone(&fetcher), 1);
    let request = SearchRequest {
        sites: vec!["beta.example".to_owned(), "gamma.example".to_owned()],
        ..SearchRequest::new("travel mug")
    };

    let result = fleet.search(&request).await.expect("valid request");

    assert_eq!(result.total_stores, 2);
    assert_eq!(fetcher.peak_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn serialized_result_is_flat_json() {
    let fleet = fleet_with(Arc::new(standard_fetcher()), 4);
    let result = fleet
        .search(&SearchRequest::new("travel mug"))
        .await
        .expect("valid request");

    let json = serde_json::to_value(&result).expect("serializable");
    assert_eq!(json["total_stores"], 3);
    assert_eq!(json["stores"][2]["success"], false);
    assert_eq!(json["stores"][2]["records"].as_array().map(Vec::len), Some(0));
    assert!(json["stores"][0]["records"][0].get("availability").is_none());
}
