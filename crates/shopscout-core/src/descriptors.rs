//! Per-site descriptors: where to search, what to extract, how to paginate.
//!
//! The YAML shape is deliberately loose (optional `kind`, `attr` implying
//! an attribute read, missing sections falling back to defaults). Loading
//! converts it into the strongly typed [`SiteDescriptor`] and rejects
//! anything a scrape would otherwise trip over halfway through a run:
//! unparseable CSS selectors, templates without a `{query}` slot, an
//! attribute rule with no attribute name, duplicate domains.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Placeholder substituted with the percent-encoded query.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Page budget for a paginated site whose descriptor sets no `max_pages`.
pub const DEFAULT_PAGINATED_MAX_PAGES: u32 = 5;
const DEFAULT_MAX_WAIT_MS: u64 = 10_000;

// ---------------------------------------------------------------------------
// Validated descriptor types
// ---------------------------------------------------------------------------

/// A fully validated site descriptor. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteDescriptor {
    /// Display name, e.g. `"Example Store"`.
    pub name: String,
    /// Lowercased bare host, e.g. `"store.example"`.
    pub domain: String,
    pub aliases: Vec<String>,
    /// Search URL template containing [`QUERY_PLACEHOLDER`].
    pub search_url: String,
    /// Currency assumed for records whose own currency field is absent.
    pub currency: Option<String>,
    pub listing: ListingRules,
    pub pagination: PaginationRules,
    pub render: RenderRules,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRules {
    /// Element wrapping all results. `None` searches the whole document.
    pub container: Option<String>,
    /// Repeating element, one per product.
    pub item: String,
    pub fields: ListingFields,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingFields {
    pub url: FieldRule,
    pub title: FieldRule,
    pub price: FieldRule,
    pub currency: Option<FieldRule>,
    pub image: Option<FieldRule>,
    pub availability: Option<FieldRule>,
}

/// How to read one value relative to an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRule {
    /// Selector relative to the element. `None` reads the element itself.
    pub selector: Option<String>,
    pub extraction: FieldExtraction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "name")]
pub enum FieldExtraction {
    /// Concatenated, whitespace-collapsed text content.
    Text,
    /// Inner markup.
    Html,
    /// Value of the named attribute.
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationRules {
    pub enabled: bool,
    /// Default page budget when the caller gives no override.
    pub max_pages: u32,
    /// Locates the "next" control and its URL. Required when enabled.
    pub next: Option<FieldRule>,
    /// Locates a total page count rendered on the page.
    pub total_pages: Option<FieldRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderRules {
    /// Readiness selectors; each one is awaited independently.
    pub wait_for: Vec<String>,
    pub scroll_to_bottom: bool,
    /// Upper bound for each readiness-selector wait.
    pub max_wait_ms: u64,
}

// ---------------------------------------------------------------------------
// Configuration collaborator
// ---------------------------------------------------------------------------

/// Read-only lookup of site descriptors.
pub trait DescriptorSource: Send + Sync {
    /// Resolves a domain or alias. Matching ignores case and a leading `www.`.
    fn get_descriptor(&self, domain_or_alias: &str) -> Option<Arc<SiteDescriptor>>;

    /// Every registered domain, in registration order.
    fn list_domains(&self) -> Vec<String>;
}

/// In-memory [`DescriptorSource`] built from validated descriptors.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    sites: Vec<Arc<SiteDescriptor>>,
    index: HashMap<String, usize>,
}

impl DescriptorRegistry {
    /// Builds a registry, rejecting domains or aliases claimed by more than
    /// one descriptor. A descriptor may repeat its own keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when two descriptors claim the same
    /// domain or alias.
    pub fn new(descriptors: Vec<SiteDescriptor>) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for descriptor in descriptors {
            let position = registry.sites.len();
            let keys = std::iter::once(descriptor.domain.as_str())
                .chain(descriptor.aliases.iter().map(String::as_str))
                .map(lookup_key)
                .collect::<Vec<_>>();
            for key in keys {
                match registry.index.insert(key.clone(), position) {
                    Some(owner) if owner != position => {
                        return Err(ConfigError::Validation(format!(
                            "duplicate site domain or alias: '{key}' (from site '{}')",
                            descriptor.name
                        )));
                    }
                    _ => {}
                }
            }
            registry.sites.push(Arc::new(descriptor));
        }
        Ok(registry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl DescriptorSource for DescriptorRegistry {
    fn get_descriptor(&self, domain_or_alias: &str) -> Option<Arc<SiteDescriptor>> {
        self.index
            .get(&lookup_key(domain_or_alias))
            .map(|&i| Arc::clone(&self.sites[i]))
    }

    fn list_domains(&self) -> Vec<String> {
        self.sites.iter().map(|s| s.domain.clone()).collect()
    }
}

fn lookup_key(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    lower
        .strip_prefix("www.")
        .map_or(lower.clone(), str::to_owned)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load, validate, and index the descriptors in a YAML sites file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_descriptors(path: &Path) -> Result<DescriptorRegistry, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SitesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_descriptors(&content)
}

/// Parse and validate descriptors from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::SitesFileParse`] on malformed YAML and
/// [`ConfigError::Validation`] on the first invalid descriptor.
pub fn parse_descriptors(yaml: &str) -> Result<DescriptorRegistry, ConfigError> {
    let file: SitesFile = serde_yaml::from_str(yaml).map_err(ConfigError::SitesFileParse)?;
    let descriptors = file
        .sites
        .into_iter()
        .map(RawSite::validate)
        .collect::<Result<Vec<_>, _>>()?;
    DescriptorRegistry::new(descriptors)
}

#[derive(Debug, Deserialize)]
struct SitesFile {
    sites: Vec<RawSite>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSite {
    name: String,
    domain: String,
    #[serde(default)]
    aliases: Vec<String>,
    search_url: String,
    currency: Option<String>,
    listing: RawListing,
    #[serde(default)]
    pagination: RawPagination,
    #[serde(default)]
    render: RawRender,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawListing {
    container: Option<String>,
    item: String,
    fields: RawFields,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFields {
    url: RawFieldRule,
    title: RawFieldRule,
    price: RawFieldRule,
    currency: Option<RawFieldRule>,
    image: Option<RawFieldRule>,
    availability: Option<RawFieldRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFieldRule {
    selector: Option<String>,
    attr: Option<String>,
    kind: Option<RawKind>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawKind {
    Text,
    Html,
    Attribute,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPagination {
    #[serde(default)]
    enabled: bool,
    max_pages: Option<u32>,
    next: Option<RawFieldRule>,
    total_pages: Option<RawFieldRule>,
}

impl Default for RawPagination {
    fn default() -> Self {
        Self {
            enabled: false,
            max_pages: None,
            next: None,
            total_pages: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRender {
    #[serde(default)]
    wait_for: Vec<String>,
    #[serde(default)]
    scroll_to_bottom: bool,
    #[serde(default = "default_max_wait_ms")]
    max_wait_ms: u64,
}

impl Default for RawRender {
    fn default() -> Self {
        Self {
            wait_for: Vec::new(),
            scroll_to_bottom: false,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
        }
    }
}

fn default_max_wait_ms() -> u64 {
    DEFAULT_MAX_WAIT_MS
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl RawSite {
    fn validate(self) -> Result<SiteDescriptor, ConfigError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "site name must be non-empty".to_string(),
            ));
        }
        let fail = |reason: String| ConfigError::Validation(format!("site '{name}': {reason}"));

        let domain = self.domain.trim().to_lowercase();
        if domain.is_empty() || domain.contains("://") || domain.contains('/') {
            return Err(fail(format!(
                "domain must be a bare host name, got \"{}\"",
                self.domain
            )));
        }

        validate_search_url(&self.search_url).map_err(&fail)?;

        let aliases = self
            .aliases
            .iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>();

        let currency = self
            .currency
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        let listing = self.listing.validate().map_err(&fail)?;
        let pagination = self.pagination.validate().map_err(&fail)?;
        let render = self.render.validate().map_err(&fail)?;

        Ok(SiteDescriptor {
            name,
            domain,
            aliases,
            search_url: self.search_url.trim().to_string(),
            currency,
            listing,
            pagination,
            render,
        })
    }
}

impl RawListing {
    fn validate(self) -> Result<ListingRules, String> {
        let container = self.container.map(|c| c.trim().to_string());
        if let Some(container) = &container {
            check_selector("listing.container", container)?;
        }
        let item = self.item.trim().to_string();
        check_selector("listing.item", &item)?;

        let fields = ListingFields {
            url: self.fields.url.validate("fields.url")?,
            title: self.fields.title.validate("fields.title")?,
            price: self.fields.price.validate("fields.price")?,
            currency: optional_rule(self.fields.currency, "fields.currency")?,
            image: optional_rule(self.fields.image, "fields.image")?,
            availability: optional_rule(self.fields.availability, "fields.availability")?,
        };

        Ok(ListingRules {
            container,
            item,
            fields,
        })
    }
}

impl RawPagination {
    fn validate(self) -> Result<PaginationRules, String> {
        let max_pages = match self.max_pages {
            Some(0) => return Err("pagination.max_pages must be at least 1".to_string()),
            Some(n) => n,
            None if self.enabled => DEFAULT_PAGINATED_MAX_PAGES,
            None => 1,
        };
        let next = optional_rule(self.next, "pagination.next")?;
        if self.enabled && next.is_none() {
            return Err("pagination is enabled but pagination.next is missing".to_string());
        }
        let total_pages = optional_rule(self.total_pages, "pagination.total_pages")?;
        Ok(PaginationRules {
            enabled: self.enabled,
            max_pages,
            next,
            total_pages,
        })
    }
}

impl RawRender {
    fn validate(self) -> Result<RenderRules, String> {
        let wait_for = self
            .wait_for
            .into_iter()
            .map(|s| s.trim().to_string())
            .collect::<Vec<_>>();
        for selector in &wait_for {
            check_selector("render.wait_for", selector)?;
        }
        Ok(RenderRules {
            wait_for,
            scroll_to_bottom: self.scroll_to_bottom,
            max_wait_ms: self.max_wait_ms,
        })
    }
}

impl RawFieldRule {
    fn validate(self, field: &str) -> Result<FieldRule, String> {
        let selector = self
            .selector
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(selector) = &selector {
            check_selector(field, selector)?;
        }

        let attr = self
            .attr
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        let extraction = match (self.kind, attr) {
            (Some(RawKind::Attribute) | None, Some(name)) => FieldExtraction::Attribute(name),
            (Some(RawKind::Attribute), None) => {
                return Err(format!("{field}: kind 'attribute' requires 'attr'"));
            }
            (Some(RawKind::Html), None) => FieldExtraction::Html,
            (Some(RawKind::Text) | None, None) => FieldExtraction::Text,
            (Some(kind), Some(_)) => {
                return Err(format!(
                    "{field}: 'attr' cannot be combined with kind '{}'",
                    match kind {
                        RawKind::Html => "html",
                        _ => "text",
                    }
                ));
            }
        };

        Ok(FieldRule {
            selector,
            extraction,
        })
    }
}

fn optional_rule(rule: Option<RawFieldRule>, field: &str) -> Result<Option<FieldRule>, String> {
    rule.map(|r| r.validate(field)).transpose()
}

fn check_selector(field: &str, selector: &str) -> Result<(), String> {
    if selector.is_empty() {
        return Err(format!("{field}: selector must be non-empty"));
    }
    scraper::Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| format!("{field}: invalid CSS selector \"{selector}\": {e}"))
}

fn validate_search_url(template: &str) -> Result<(), String> {
    let template = template.trim();
    if !template.contains(QUERY_PLACEHOLDER) {
        return Err(format!(
            "search_url must contain {QUERY_PLACEHOLDER}, got \"{template}\""
        ));
    }
    let sample = template.replace(QUERY_PLACEHOLDER, "sample");
    let parsed = url::Url::parse(&sample)
        .map_err(|e| format!("search_url \"{template}\" is not a valid URL: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!(
            "search_url must use http or https, got \"{}\"",
            parsed.scheme()
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "descriptors_test.rs"]
mod tests;
