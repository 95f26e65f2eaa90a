//! Price parsing for scraped listing text.
//!
//! Catalog price strings range from `"$1,299.99"` through `"₡49.950"` to
//! scientific notation like `"2.499e5"`. Exponential notation is matched
//! first as its own case; everything else is reduced to digits and
//! separators before deciding which separator is the decimal point.

use std::sync::LazyLock;

use regex::Regex;

static EXPONENTIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[+-]?(?:\d+\.?\d*|\.\d+)[eE][+-]?\d+").expect("valid regex")
});

/// Parses a price from scraped text.
///
/// Returns `None` when no positive, finite price can be read. Callers drop
/// the record in that case rather than defaulting the price.
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let value = match EXPONENTIAL.find(text) {
        Some(m) => m.as_str().parse::<f64>().ok()?,
        None => parse_plain_number(text)?,
    };

    (value.is_finite() && value > 0.0).then_some(value)
}

/// Rounds a parsed price to the nearest whole currency unit.
///
/// Returns `None` when the rounded value is not positive.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn round_price(value: f64) -> Option<u64> {
    let rounded = value.round();
    (rounded.is_finite() && rounded >= 1.0 && rounded < 1.8e19).then(|| rounded as u64)
}

/// Strips everything except digits and separators, then normalizes the
/// separators into a single optional decimal point.
fn parse_plain_number(text: &str) -> Option<f64> {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let kept = kept.trim_matches(|c| c == '.' || c == ',');
    if !kept.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    let decimal_at = decimal_separator_position(kept);
    let normalized: String = kept
        .char_indices()
        .filter_map(|(i, c)| match c {
            '.' | ',' if Some(i) == decimal_at => Some('.'),
            '.' | ',' => None,
            digit => Some(digit),
        })
        .collect();

    normalized.parse::<f64>().ok()
}

/// Picks which separator (if any) is the decimal point.
///
/// - Both `.` and `,` present: the last separator is the decimal point.
/// - One kind, repeated: all are thousands separators.
/// - One kind, once: a thousands separator when exactly three digits
///   follow it, otherwise the decimal point.
fn decimal_separator_position(s: &str) -> Option<usize> {
    let separators: Vec<(usize, char)> = s
        .char_indices()
        .filter(|(_, c)| *c == '.' || *c == ',')
        .collect();
    let &(last_pos, last_char) = separators.last()?;

    let mixed = separators.iter().any(|(_, c)| *c != last_char);
    if mixed {
        return Some(last_pos);
    }
    if separators.len() > 1 {
        return None;
    }

    let digits_after = s.len() - last_pos - 1;
    (digits_after != 3).then_some(last_pos)
}
