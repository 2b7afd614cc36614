//! The canonical, vendor-agnostic book metadata schema.
//!
//! Every vendor response is reduced to [`CanonicalMetadata`] before anything
//! downstream sees it. Optional attributes that the vendor did not supply are
//! omitted from the serialized mapping entirely rather than emitted as
//! `null`, so consumers can test for key presence.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Minor units (cents) of the vendor's listing currency.
pub type Cents = u32;

/// Offer tier reported by a vendor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferTier {
    /// A new copy.
    New,
    /// A used copy.
    Used,
    /// A collectible copy. Tracked in the offer summary but never competing
    /// for the headline price.
    Collectible,
}

impl fmt::Display for OfferTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferTier::New => f.write_str("new"),
            OfferTier::Used => f.write_str("used"),
            OfferTier::Collectible => f.write_str("collectible"),
        }
    }
}

/// A single contributing author.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// Display name as the vendor reports it.
    pub name: String,
}

/// Counts and lowest amounts per offer tier, present only when the vendor
/// response carried an offers section.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct OfferSummary {
    /// Number of new offers.
    pub total_new: u32,
    /// Number of used offers.
    pub total_used: u32,
    /// Number of collectible offers.
    pub total_collectible: u32,
    /// Lowest new amount in minor units.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lowest_new: Option<Cents>,
    /// Lowest used amount in minor units.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lowest_used: Option<Cents>,
    /// Lowest collectible amount in minor units.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lowest_collectible: Option<Cents>,
    /// Offers sold by the vendor itself rather than marketplace sellers.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub amazon_offers: Option<u32>,
}

/// Normalized metadata for one book as reported by one vendor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMetadata {
    /// Vendor name mapped to the vendor-native identifiers of this book.
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub identifiers: HashMap<String, Vec<String>>,
    /// Normalized ISBN-10s, including the form derived from a `978` ISBN-13.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub isbn_10: Option<Vec<String>>,
    /// Normalized ISBN-13s, including the form derived from an ISBN-10.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub isbn_13: Option<Vec<String>>,
    /// Headline price for display, e.g. `"$12.00 (used)"`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price: Option<String>,
    /// Headline price in minor units, for comparison by callers.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price_amt: Option<Cents>,
    /// The offer tier the headline price came from.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub qlt: Option<OfferTier>,
    /// Per-tier offer counts and lowest amounts.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub offer_summary: Option<OfferSummary>,
    /// Title of the book.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    /// Contributing authors, in the vendor's order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authors: Vec<Author>,
    /// Publication date, either `"Mon DD, YYYY"` or a bare year.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub publish_date: Option<String>,
    /// Publishers of this edition.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub publishers: Option<Vec<String>>,
    /// Page count.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub number_of_pages: Option<u32>,
    /// Languages of this edition.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub languages: Vec<String>,
    /// Cover image URL.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cover: Option<String>,
    /// Physical format, lowercased (e.g. `"paperback"`).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub physical_format: Option<String>,
    /// Edition statement as the vendor reports it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub edition: Option<String>,
    /// Vendor product group (e.g. `"Book"`).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub product_group: Option<String>,
    /// Provenance markers, always a single `"vendor:native_id"` element.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub source_records: Vec<String>,
    /// Affiliate-tagged product link.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
}

/// Result of the bulk title/author search path.
///
/// The search surface reports failure in-band rather than raising, so the
/// presentation layer can render "no results" without error handling.
#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchOutcome {
    /// One or more books matched.
    Results {
        /// The matching books, normalized.
        results: Vec<CanonicalMetadata>,
    },
    /// The vendor reported no matches or the search failed.
    Error {
        /// Human-readable description of what went wrong.
        error: String,
        /// HTTP status code, when the vendor answered with one.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<u16>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_omitted_from_serialized_output() {
        let metadata = CanonicalMetadata {
            title: Some("Foo".to_owned()),
            ..CanonicalMetadata::default()
        };

        let json = serde_json::to_value(&metadata).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(1, object.len());
        assert_eq!("Foo", object["title"]);
        assert!(!object.contains_key("price"));
        assert!(!object.contains_key("isbn_10"));
    }

    #[test]
    fn offer_tier_serializes_lowercase() {
        assert_eq!(
            "\"collectible\"",
            serde_json::to_string(&OfferTier::Collectible).unwrap()
        );
    }

    #[test]
    fn search_error_outcome_serializes_flat() {
        let outcome = SearchOutcome::Error {
            error: "no results".to_owned(),
            code: None,
        };

        assert_eq!(
            r#"{"error":"no results"}"#,
            serde_json::to_string(&outcome).unwrap()
        );
    }
}
