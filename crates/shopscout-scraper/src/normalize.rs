//! Conversion from [`RawRecord`]s to [`NormalizedRecord`]s.
//!
//! Runs once per store after every page has been extracted. Availability is
//! read during extraction for diagnostics only and never reaches the
//! normalized listing.

use shopscout_core::NormalizedRecord;

use crate::extract::RawRecord;
use crate::parse::round_price;
use crate::urls::resolve_url;

/// Normalizes every raw record scraped for one store.
///
/// Relative `url` and `image` values resolve against `search_url`, names are
/// trimmed, and prices round to the nearest whole currency unit. A record's
/// own currency wins over `default_currency`. Records whose URL does not
/// resolve, whose name is blank, or whose price rounds to zero are dropped.
#[must_use]
pub fn normalize_records(
    raw: Vec<RawRecord>,
    search_url: &str,
    default_currency: Option<&str>,
) -> Vec<NormalizedRecord> {
    let total = raw.len();
    let records: Vec<NormalizedRecord> = raw
        .into_iter()
        .filter_map(|record| normalize_record(record, search_url, default_currency))
        .collect();

    if records.len() < total {
        tracing::debug!(
            search_url,
            dropped = total - records.len(),
            "dropped records during normalization"
        );
    }
    records
}

fn normalize_record(
    record: RawRecord,
    search_url: &str,
    default_currency: Option<&str>,
) -> Option<NormalizedRecord> {
    let name = record.title.trim();
    if name.is_empty() {
        return None;
    }

    Some(NormalizedRecord {
        url: resolve_url(search_url, &record.url)?,
        name: name.to_owned(),
        price: round_price(record.price)?,
        currency: record
            .currency
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .or_else(|| default_currency.map(str::to_owned)),
        image: record
            .image
            .as_deref()
            .and_then(|image| resolve_url(search_url, image)),
    })
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
