//! Listing extraction: descriptor field rules applied to a rendered DOM.
//!
//! Pure with respect to its inputs. The same snapshot and rules always
//! produce the same records in document order.

use scraper::{ElementRef, Html, Selector};
use shopscout_core::{FieldExtraction, FieldRule, ListingRules};

use crate::browser::PageSnapshot;
use crate::error::ScraperError;
use crate::parse::parse_price;

/// One scraped item before normalization.
///
/// `url` and `image` may still be relative. Only records with a name, a URL,
/// and a positive price survive extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub url: String,
    pub title: String,
    pub price_text: String,
    pub price: f64,
    pub currency: Option<String>,
    pub image: Option<String>,
    pub availability: Option<String>,
}

/// Per-page diagnostic counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionStats {
    pub items_seen: usize,
    pub kept: usize,
    pub missing_name: usize,
    pub missing_url: usize,
    pub invalid_price: usize,
}

/// Records and diagnostics from one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub records: Vec<RawRecord>,
    pub stats: ExtractionStats,
}

/// A [`FieldRule`] with its selector compiled.
pub(crate) struct CompiledRule<'a> {
    selector: Option<Selector>,
    extraction: &'a FieldExtraction,
}

impl<'a> CompiledRule<'a> {
    pub(crate) fn compile(rule: &'a FieldRule) -> Result<Self, ScraperError> {
        let selector = rule.selector.as_deref().map(compile_selector).transpose()?;
        Ok(Self {
            selector,
            extraction: &rule.extraction,
        })
    }

    /// Reads the rule's value relative to `element`. Empty values are `None`.
    pub(crate) fn read(&self, element: ElementRef<'_>) -> Option<String> {
        let target = match &self.selector {
            Some(selector) => element.select(selector).next()?,
            None => element,
        };
        let value = match self.extraction {
            FieldExtraction::Text => collapse_whitespace(&target.text().collect::<String>()),
            FieldExtraction::Html => target.inner_html().trim().to_owned(),
            FieldExtraction::Attribute(name) => target.value().attr(name)?.trim().to_owned(),
        };
        (!value.is_empty()).then_some(value)
    }
}

pub(crate) fn compile_selector(selector: &str) -> Result<Selector, ScraperError> {
    Selector::parse(selector).map_err(|e| ScraperError::InvalidSelector {
        selector: selector.to_owned(),
        reason: e.to_string(),
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn read_optional(rule: Option<&CompiledRule<'_>>, item: ElementRef<'_>) -> Option<String> {
    rule.and_then(|r| r.read(item))
}

struct CompiledFields<'a> {
    url: CompiledRule<'a>,
    title: CompiledRule<'a>,
    price: CompiledRule<'a>,
    currency: Option<CompiledRule<'a>>,
    image: Option<CompiledRule<'a>>,
    availability: Option<CompiledRule<'a>>,
}

impl<'a> CompiledFields<'a> {
    fn compile(rules: &'a ListingRules) -> Result<Self, ScraperError> {
        let optional = |rule: &'a Option<FieldRule>| rule.as_ref().map(CompiledRule::compile).transpose();
        Ok(Self {
            url: CompiledRule::compile(&rules.fields.url)?,
            title: CompiledRule::compile(&rules.fields.title)?,
            price: CompiledRule::compile(&rules.fields.price)?,
            currency: optional(&rules.fields.currency)?,
            image: optional(&rules.fields.image)?,
            availability: optional(&rules.fields.availability)?,
        })
    }
}

/// Applies a descriptor's listing rules to a rendered page.
///
/// Items without a name or URL, or whose price does not parse to a positive
/// number, are dropped and counted in [`ExtractionStats`]. A page with no
/// container or no items yields an empty extraction, not an error.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidSelector`] if a selector does not compile.
/// Descriptors are validated at load time, so this indicates a descriptor
/// that bypassed loading.
pub fn extract_listings(
    snapshot: &PageSnapshot,
    rules: &ListingRules,
) -> Result<Extraction, ScraperError> {
    let item_selector = compile_selector(&rules.item)?;
    let container_selector = rules.container.as_deref().map(compile_selector).transpose()?;
    let fields = CompiledFields::compile(rules)?;

    let document = Html::parse_document(&snapshot.html);
    let root = match &container_selector {
        Some(selector) => match document.select(selector).next() {
            Some(container) => container,
            None => {
                return Ok(Extraction {
                    records: Vec::new(),
                    stats: ExtractionStats::default(),
                })
            }
        },
        None => document.root_element(),
    };

    let mut stats = ExtractionStats::default();
    let mut records = Vec::new();

    for item in root.select(&item_selector) {
        stats.items_seen += 1;

        let Some(title) = fields.title.read(item) else {
            stats.missing_name += 1;
            continue;
        };
        let Some(url) = fields.url.read(item) else {
            stats.missing_url += 1;
            continue;
        };
        let price_text = fields.price.read(item).unwrap_or_default();
        let Some(price) = parse_price(&price_text) else {
            stats.invalid_price += 1;
            continue;
        };

        records.push(RawRecord {
            url,
            title,
            price_text,
            price,
            currency: read_optional(fields.currency.as_ref(), item),
            image: read_optional(fields.image.as_ref(), item),
            availability: read_optional(fields.availability.as_ref(), item),
        });
    }

    stats.kept = records.len();
    Ok(Extraction { records, stats })
}
