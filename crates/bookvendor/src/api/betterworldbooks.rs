use log::{info, trace};
use regex::Regex;

use crate::{model::Cents, Error};

use super::{Client, RawOfferSummary, RawProduct};

/// Fetches the current listing for an ISBN from the BetterWorldBooks product
/// service.
///
/// The service answers with a flat, tag-delimited text body rather than a
/// structured document. A body carrying none of the offer tags is still a
/// successful fetch: the item exists in the catalog with nothing on sale,
/// which is a result worth keeping.
pub(crate) fn fetch<C: Client>(endpoint: &str, isbn: &str) -> Result<RawProduct, Error> {
    info!("Fetching the BetterWorldBooks listing for ISBN '{isbn}'");
    let url = format!("{endpoint}{isbn}");

    let client = C::default();
    let body = client.get_text(&url)?;

    let summary = RawOfferSummary {
        total_new: tagged(&body, "TotalNew").and_then(|count| count.parse().ok()),
        total_used: tagged(&body, "TotalUsed").and_then(|count| count.parse().ok()),
        total_collectible: tagged(&body, "TotalCollectible")
            .and_then(|count| count.parse().ok()),
        lowest_new: tagged(&body, "LowestNewPrice")
            .as_deref()
            .and_then(parse_dollars),
        lowest_used: tagged(&body, "LowestUsedPrice")
            .as_deref()
            .and_then(parse_dollars),
        lowest_collectible: tagged(&body, "LowestCollectiblePrice")
            .as_deref()
            .and_then(parse_dollars),
    };

    trace!("Parsed listing for '{isbn}': {summary:?}");

    Ok(RawProduct {
        native_id: isbn.to_owned(),
        offer_summary: Some(summary),
        ..RawProduct::default()
    })
}

/// Extracts the value of a flat `<Tag>value</Tag>` pair from the body.
fn tagged(body: &str, tag: &str) -> Option<String> {
    let pattern =
        Regex::new(&format!("<{tag}>([^<]+)</{tag}>")).expect("tag patterns are static and valid");
    pattern
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().to_owned())
}

/// Parses a `$d,ddd.cc` display amount into minor units.
fn parse_dollars(raw: &str) -> Option<Cents> {
    let raw = raw.trim().trim_start_matches('$').replace(',', "");
    let (dollars, cents) = match raw.split_once('.') {
        Some((dollars, cents)) => (dollars, cents),
        None => (raw.as_str(), ""),
    };

    let dollars: Cents = dollars.parse().ok()?;
    let cents: Cents = match cents.len() {
        0 => 0,
        1 => cents.parse::<Cents>().ok()? * 10,
        2 => cents.parse().ok()?,
        _ => return None,
    };
    Some(dollars * 100 + cents)
}
