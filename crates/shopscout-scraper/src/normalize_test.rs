use super::*;

const SEARCH_URL: &str = "https://store.example/search?q=kettle";

fn make_raw(url: &str, title: &str, price: f64) -> RawRecord {
    RawRecord {
        url: url.to_owned(),
        title: title.to_owned(),
        price_text: price.to_string(),
        price,
        currency: None,
        image: None,
        availability: Some("In stock".to_owned()),
    }
}

#[test]
fn resolves_relative_url_and_image_against_search_url() {
    let mut raw = make_raw("/p/123", "Kettle", 25.0);
    raw.image = Some("//cdn.store.example/k.jpg".to_owned());
    let records = normalize_records(vec![raw], SEARCH_URL, None);
    assert_eq!(records[0].url, "https://store.example/p/123");
    assert_eq!(records[0].image.as_deref(), Some("https://cdn.store.example/k.jpg"));
}

#[test]
fn absolute_url_is_kept_unchanged() {
    let raw = make_raw("https://other.example/item?id=9", "Kettle", 25.0);
    let records = normalize_records(vec![raw], SEARCH_URL, None);
    assert_eq!(records[0].url, "https://other.example/item?id=9");
}

#[test]
fn trims_name_and_rounds_price() {
    let records = normalize_records(
        vec![
            make_raw("/a", "  Electric Kettle \n", 19.5),
            make_raw("/b", "Stovetop Kettle", 19.49),
        ],
        SEARCH_URL,
        None,
    );
    assert_eq!(records[0].name, "Electric Kettle");
    assert_eq!(records[0].price, 20);
    assert_eq!(records[1].price, 19);
}

#[test]
fn drops_records_that_cannot_be_normalized() {
    let records = normalize_records(
        vec![
            make_raw("/ok", "Kept", 10.0),
            make_raw("/cheap", "Rounds to zero", 0.4),
            make_raw("javascript:void(0)", "No link", 10.0),
            make_raw("/blank", "   ", 10.0),
        ],
        SEARCH_URL,
        None,
    );
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Kept");
}

#[test]
fn record_currency_overrides_descriptor_default() {
    let mut with_currency = make_raw("/a", "A", 10.0);
    with_currency.currency = Some(" CRC ".to_owned());
    let records = normalize_records(
        vec![with_currency, make_raw("/b", "B", 10.0)],
        SEARCH_URL,
        Some("USD"),
    );
    assert_eq!(records[0].currency.as_deref(), Some("CRC"));
    assert_eq!(records[1].currency.as_deref(), Some("USD"));
}

#[test]
fn record_currency_is_uppercased_like_descriptor_currency() {
    let mut lower = make_raw("/a", "A", 10.0);
    lower.currency = Some("usd".to_owned());
    let records = normalize_records(vec![lower], SEARCH_URL, Some("USD"));
    assert_eq!(records[0].currency.as_deref(), Some("USD"));
}

#[test]
fn availability_is_not_carried_into_normalized_json() {
    let records = normalize_records(vec![make_raw("/a", "A", 10.0)], SEARCH_URL, None);
    let json = serde_json::to_value(&records[0]).unwrap();
    assert!(json.get("availability").is_none());
    assert!(json.get("image").is_none());
}

#[test]
fn preserves_input_order() {
    let records = normalize_records(
        vec![
            make_raw("/1", "First", 1.0),
            make_raw("/2", "Second", 2.0),
            make_raw("/3", "Third", 3.0),
        ],
        SEARCH_URL,
        None,
    );
    let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["First", "Second", "Third"]);
}
