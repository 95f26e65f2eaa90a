//! URL building and resolution.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use shopscout_core::descriptors::QUERY_PLACEHOLDER;
use url::Url;

use crate::error::ScraperError;

/// Substitutes the percent-encoded `query` into a descriptor's search URL
/// template.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidSearchUrl`] if the substituted template is
/// not an absolute URL.
pub fn build_search_url(domain: &str, template: &str, query: &str) -> Result<String, ScraperError> {
    let encoded = utf8_percent_encode(query.trim(), NON_ALPHANUMERIC).to_string();
    let candidate = template.replace(QUERY_PLACEHOLDER, &encoded);
    Url::parse(&candidate)
        .map(|_| candidate)
        .map_err(|e| ScraperError::InvalidSearchUrl {
            domain: domain.to_owned(),
            reason: format!("\"{template}\" does not produce a valid URL: {e}"),
        })
}

/// Resolves `href` against `base`.
///
/// Absolute URLs are returned unchanged. Returns `None` for empty input,
/// non-navigable schemes (`javascript:`, `mailto:`, `data:`), or when `base`
/// itself does not parse.
#[must_use]
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if let Ok(absolute) = Url::parse(href) {
        return matches!(absolute.scheme(), "http" | "https").then(|| href.to_owned());
    }

    let base = Url::parse(base).ok()?;
    let joined = base.join(href).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}
