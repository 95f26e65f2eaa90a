//! In-memory pages and descriptors shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use shopscout_core::{
    FieldExtraction, FieldRule, ListingFields, ListingRules, PaginationRules, RenderRules,
    SiteDescriptor,
};

use crate::browser::{PageFetcher, PageSnapshot, RenderOptions};
use crate::error::{NavigationFailureKind, ScraperError};

pub(crate) fn snapshot(url: &str, html: &str) -> PageSnapshot {
    PageSnapshot {
        html: html.to_owned(),
        final_url: url.to_owned(),
    }
}

fn field(selector: &str, extraction: FieldExtraction) -> FieldRule {
    FieldRule {
        selector: Some(selector.to_owned()),
        extraction,
    }
}

/// Rules matching the markup produced by [`listing_html`].
pub(crate) fn listing_rules() -> ListingRules {
    ListingRules {
        container: Some("ul.results".to_owned()),
        item: "li.product".to_owned(),
        fields: ListingFields {
            url: field("a.title", FieldExtraction::Attribute("href".to_owned())),
            title: field("a.title", FieldExtraction::Text),
            price: field(".price", FieldExtraction::Text),
            currency: None,
            image: None,
            availability: None,
        },
    }
}

pub(crate) fn pagination_rules(max_pages: u32) -> PaginationRules {
    PaginationRules {
        enabled: true,
        max_pages,
        next: Some(field("a.next", FieldExtraction::Attribute("href".to_owned()))),
        total_pages: None,
    }
}

pub(crate) fn site_descriptor(domain: &str, max_pages: u32) -> SiteDescriptor {
    SiteDescriptor {
        name: domain.to_owned(),
        domain: domain.to_owned(),
        aliases: Vec::new(),
        search_url: format!("https://{domain}/search?q={{query}}"),
        currency: Some("USD".to_owned()),
        listing: listing_rules(),
        pagination: pagination_rules(max_pages),
        render: RenderRules {
            wait_for: Vec::new(),
            scroll_to_bottom: false,
            max_wait_ms: 1_000,
        },
    }
}

/// One results page with `count` items and an optional next link.
pub(crate) fn listing_html(page: u32, count: u32, next: Option<&str>) -> String {
    let items: String = (1..=count)
        .map(|i| {
            format!(
                r#"<li class="product"><a class="title" href="/p/{page}-{i}">Item {page}-{i}</a><span class="price">${i}.99</span></li>"#
            )
        })
        .collect();
    let next = next
        .map(|href| format!(r#"<a class="next" href="{href}">Next</a>"#))
        .unwrap_or_default();
    format!(r#"<html><body><ul class="results">{items}</ul>{next}</body></html>"#)
}

/// A [`PageFetcher`] serving canned HTML by URL.
///
/// Unknown URLs fail as unreachable; URLs registered with
/// [`FixtureFetcher::fail`] fail with the given kind.
#[derive(Default)]
pub(crate) struct FixtureFetcher {
    pages: HashMap<String, String>,
    failures: HashMap<String, NavigationFailureKind>,
    fetched: Mutex<Vec<String>>,
    count: AtomicUsize,
}

impl FixtureFetcher {
    pub(crate) fn page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_owned(), html);
        self
    }

    pub(crate) fn fail(mut self, url: &str, kind: NavigationFailureKind) -> Self {
        self.failures.insert(url.to_owned(), kind);
        self
    }

    /// Registers `pages` result pages of `per_page` items each for `domain`,
    /// chained by next links, starting at the search URL for `query`.
    pub(crate) fn paged_site(mut self, domain: &str, query: &str, pages: u32, per_page: u32) -> Self {
        let first = format!("https://{domain}/search?q={query}");
        for n in 1..=pages {
            let url = if n == 1 {
                first.clone()
            } else {
                format!("{first}&page={n}")
            };
            let next = (n < pages).then(|| format!("{first}&page={}", n + 1));
            self.pages.insert(url, listing_html(n, per_page, next.as_deref()));
        }
        self
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub(crate) fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str, _options: &RenderOptions) -> Result<PageSnapshot, ScraperError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(url.to_owned());

        if let Some(kind) = self.failures.get(url) {
            return Err(ScraperError::navigation(url, *kind, "fixture failure"));
        }
        match self.pages.get(url) {
            Some(html) => Ok(snapshot(url, html)),
            None => Err(ScraperError::navigation(
                url,
                NavigationFailureKind::Unreachable,
                "no fixture page",
            )),
        }
    }
}
