//! Reduction of raw vendor records into [`CanonicalMetadata`].
//!
//! Pure data mapping, no I/O. Every attribute the vendor left out stays out
//! of the result; nothing is filled with placeholder values.

use std::collections::HashMap;

use log::warn;

use crate::{
    api::RawProduct,
    isbn,
    model::{Author, CanonicalMetadata, OfferSummary},
    price::{format_dollars, select_price, tier_price},
    Error, ErrorKind,
};

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Normalizes a raw Amazon product record.
///
/// # Errors
///
/// An `Err` of kind [`ErrorKind::Malformed`] is returned when the record has
/// no title; everything else is individually optional.
pub(crate) fn normalize_amazon(
    raw: RawProduct,
    associate_tag: &str,
) -> Result<CanonicalMetadata, Error> {
    // Deconstruct to take ownership of fields (avoids cloning).
    let RawProduct {
        native_id: asin,
        title,
        authors,
        isbn,
        publisher,
        publication_date,
        binding,
        edition,
        number_of_pages,
        languages,
        cover,
        product_group,
        offer_summary,
        total_vendor_offers,
    } = raw;

    let title = title.ok_or_else(|| {
        Error::new(
            ErrorKind::Malformed,
            format!("product record '{asin}' has no title"),
        )
    })?;

    let mut metadata = CanonicalMetadata {
        url: Some(format!("https://www.amazon.com/dp/{asin}/?tag={associate_tag}")),
        title: Some(title),
        authors: authors.into_iter().map(|name| Author { name }).collect(),
        source_records: vec![format!("amazon:{asin}")],
        identifiers: HashMap::from([("amazon".to_owned(), vec![asin])]),
        number_of_pages,
        languages,
        cover,
        product_group,
        edition,
        ..CanonicalMetadata::default()
    };

    if let Some(summary) = offer_summary {
        let used = tier_price(summary.lowest_used, summary.total_used);
        let new = tier_price(summary.lowest_new, summary.total_new);

        if let Some((amount, tier)) = select_price(used, new) {
            metadata.price = Some(format!("${} ({tier})", format_dollars(amount)));
            metadata.price_amt = Some(amount);
            metadata.qlt = Some(tier);
        }

        metadata.offer_summary = Some(OfferSummary {
            total_new: summary.total_new.unwrap_or(0),
            total_used: summary.total_used.unwrap_or(0),
            total_collectible: summary.total_collectible.unwrap_or(0),
            lowest_new: summary.lowest_new,
            lowest_used: summary.lowest_used,
            lowest_collectible: summary.lowest_collectible,
            amazon_offers: total_vendor_offers,
        });
    }

    if let Some(date) = publication_date {
        metadata.publish_date = format_publish_date(&date);
    }
    if let Some(binding) = binding {
        metadata.physical_format = Some(binding.to_lowercase());
    }
    if let Some(publisher) = publisher {
        metadata.publishers = Some(vec![publisher]);
    }
    if let Some(isbn) = isbn {
        apply_isbn_fields(&mut metadata, &isbn);
    }

    Ok(metadata)
}

/// Normalizes a raw BetterWorldBooks listing.
///
/// The product service exposes no bibliographic fields, so the result is the
/// minimal price record: affiliate link, headline price and provenance.
pub(crate) fn normalize_betterworldbooks(raw: RawProduct, affiliate_id: &str) -> CanonicalMetadata {
    let isbn = raw.native_id;

    let mut metadata = CanonicalMetadata {
        url: Some(format!(
            "http://www.anrdoezrs.net/links/{affiliate_id}/type/dlg/\
             http://www.betterworldbooks.com/-id-{isbn}.aspx"
        )),
        source_records: vec![format!("betterworldbooks:{isbn}")],
        identifiers: HashMap::from([("betterworldbooks".to_owned(), vec![isbn])]),
        ..CanonicalMetadata::default()
    };

    if let Some(summary) = raw.offer_summary {
        let used = tier_price(summary.lowest_used, summary.total_used);
        let new = tier_price(summary.lowest_new, summary.total_new);

        if let Some((amount, tier)) = select_price(used, new) {
            metadata.price = Some(format!("${} ({tier})", format_dollars(amount)));
            metadata.price_amt = Some(amount);
            metadata.qlt = Some(tier);
        }
    }

    metadata
}

/// Formats the vendor publication date for display.
///
/// Only a full year-month-day date after 1900 keeps its month and day; sparse
/// vendor dates fall back to the bare year so no false month or day is
/// invented for them.
fn format_publish_date(raw: &str) -> Option<String> {
    let mut parts = raw.split('-');

    let year: u32 = parts.next()?.trim().parse().ok()?;
    let month = parts.next().and_then(|m| m.parse::<usize>().ok());
    let day = parts.next().and_then(|d| d.parse::<u32>().ok());

    match (month, day) {
        (Some(month @ 1..=12), Some(day @ 1..=31)) if year > 1900 => Some(format!(
            "{} {day:02}, {year}",
            MONTH_ABBREVIATIONS[month - 1]
        )),
        _ => Some(year.to_string()),
    }
}

fn apply_isbn_fields(metadata: &mut CanonicalMetadata, raw_isbn: &str) {
    match raw_isbn.len() {
        10 => match isbn::isbn_10_to_13(raw_isbn) {
            Ok(derived) => {
                metadata.isbn_10 = Some(vec![raw_isbn.to_owned()]);
                metadata.isbn_13 = Some(vec![derived]);
            }
            Err(err) => warn!("vendor reported an invalid ISBN-10 '{raw_isbn}': {err}"),
        },
        13 => {
            metadata.isbn_13 = Some(vec![raw_isbn.to_owned()]);
            if raw_isbn.starts_with("978") {
                match isbn::isbn_13_to_10(raw_isbn) {
                    Ok(derived) => metadata.isbn_10 = Some(vec![derived]),
                    Err(err) => {
                        warn!("vendor reported an invalid ISBN-13 '{raw_isbn}': {err}");
                    }
                }
            }
        }
        _ => warn!("vendor reported an ISBN of unexpected length: '{raw_isbn}'"),
    }
}
