//! Vendor orchestration behind the public metadata surface.
//!
//! One service instance owns a memoized fetch path per vendor. The `get_*`
//! methods degrade every failure to "no metadata" so a single vendor outage
//! never faults the caller; the `lookup_*` methods keep the typed outcome
//! for callers that need to tell "nothing to show" from "should retry".

use std::{fmt, marker::PhantomData, str::FromStr, sync::Arc, time::Duration};

use log::warn;

use crate::{
    api::{amazon, betterworldbooks, Client},
    cache::{Lookup, Memoized, Store, HALF_DAY, WEEK},
    isbn::normalize_isbn,
    model::{CanonicalMetadata, SearchOutcome},
    normalize, Error, ErrorKind,
};

/// The identifier kinds accepted by the lookup surface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IdType {
    /// An ISBN-10 or ISBN-13, normalized before use.
    Isbn,
    /// The vendor-native article number, passed through untouched.
    Asin,
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdType::Isbn => f.write_str("isbn"),
            IdType::Asin => f.write_str("asin"),
        }
    }
}

impl FromStr for IdType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "isbn" => Ok(IdType::Isbn),
            "asin" => Ok(IdType::Asin),
            _ => Err(Error::new(
                ErrorKind::Format,
                format!("unknown identifier type '{s}', expected 'isbn' or 'asin'"),
            )),
        }
    }
}

/// Construction-time settings for [`MetadataService`].
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Base URL of the Amazon product API.
    pub amazon_endpoint: String,
    /// Associate tag appended to every constructed Amazon product link.
    pub amazon_associate_tag: String,
    /// Base URL of the BetterWorldBooks product service; the ISBN is
    /// appended verbatim.
    pub betterworldbooks_endpoint: String,
    /// Affiliate id woven into constructed BetterWorldBooks links.
    pub betterworldbooks_affiliate_id: String,
    /// Cache lifetime for Amazon lookups.
    pub amazon_ttl: Duration,
    /// Cache lifetime for BetterWorldBooks lookups.
    pub betterworldbooks_ttl: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            amazon_endpoint: "https://webservices.amazon.com/onca/json".to_owned(),
            amazon_associate_tag: "bookvendor-20".to_owned(),
            betterworldbooks_endpoint: "https://products.betterworldbooks.com/service.aspx?ItemId="
                .to_owned(),
            betterworldbooks_affiliate_id: "bookvendor".to_owned(),
            amazon_ttl: WEEK,
            betterworldbooks_ttl: HALF_DAY,
        }
    }
}

/// The public metadata surface, generic over the HTTP client so tests can
/// substitute a mock.
pub struct MetadataService<C: Client> {
    config: ServiceConfig,
    amazon_cache: Memoized<CanonicalMetadata>,
    betterworldbooks_cache: Memoized<CanonicalMetadata>,
    _client: PhantomData<fn() -> C>,
}

impl<C: Client> MetadataService<C> {
    /// Creates a service over the given configuration and cache store.
    #[must_use]
    pub fn new(config: ServiceConfig, store: Arc<dyn Store>) -> Self {
        Self {
            amazon_cache: Memoized::new(
                "vendor.amazon.lookup",
                config.amazon_ttl,
                Arc::clone(&store),
            ),
            betterworldbooks_cache: Memoized::new(
                "vendor.betterworldbooks.lookup",
                config.betterworldbooks_ttl,
                store,
            ),
            config,
            _client: PhantomData,
        }
    }

    /// Looks up vendor metadata for a single book, degrading every failure
    /// to `None`.
    ///
    /// A failed or absent lookup shows up downstream as "no price and no
    /// metadata", never as an error page.
    pub fn get_metadata(&self, id: &str, id_type: IdType) -> Option<CanonicalMetadata> {
        if id.is_empty() {
            return None;
        }
        match self.lookup_metadata(id, id_type) {
            Ok(outcome) => outcome.found(),
            Err(err) => {
                warn!("amazon metadata lookup for {id_type} '{id}' failed: {err}");
                None
            }
        }
    }

    /// Looks up vendor metadata for a single book, keeping the typed
    /// outcome.
    ///
    /// ISBN input is normalized before the cache key is built, so hyphenated
    /// and bare forms of one ISBN share an entry. A vendor-confirmed miss
    /// comes back as [`Lookup::Missing`] and is served from cache on
    /// subsequent calls.
    ///
    /// # Errors
    ///
    /// An `Err` of kind [`ErrorKind::Format`] is returned for a malformed
    /// identifier; transient vendor failures keep their fetch kind
    /// ([`ErrorKind::Network`], [`ErrorKind::Throttled`] or
    /// [`ErrorKind::Malformed`]) and are never cached.
    pub fn lookup_metadata(
        &self,
        id: &str,
        id_type: IdType,
    ) -> Result<Lookup<CanonicalMetadata>, Error> {
        let id = match id_type {
            IdType::Isbn => normalize_isbn(id)?,
            IdType::Asin => id.to_owned(),
        };

        let endpoint = self.config.amazon_endpoint.as_str();
        let associate_tag = self.config.amazon_associate_tag.as_str();
        let args = format!("{id}:{id_type}");

        self.amazon_cache.get_or_fetch(&args, || {
            match amazon::lookup::<C>(endpoint, &id, id_type) {
                Ok(raw) => normalize::normalize_amazon(raw, associate_tag).map(Lookup::Found),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(Lookup::Missing),
                Err(err) => Err(err),
            }
        })
    }

    /// Searches the vendor catalog for books by title and/or author.
    ///
    /// A bulk, uncached path: result sets are too variable to be worth
    /// keying. Vendor-reported emptiness and fetch failures both come back
    /// in-band as [`SearchOutcome::Error`].
    pub fn search(&self, title: &str, author: &str) -> SearchOutcome {
        match amazon::search::<C>(&self.config.amazon_endpoint, title, author) {
            Ok(raws) => {
                let results = raws
                    .into_iter()
                    .filter_map(|raw| {
                        match normalize::normalize_amazon(raw, &self.config.amazon_associate_tag) {
                            Ok(metadata) => Some(metadata),
                            Err(err) => {
                                warn!("skipping an unusable search result: {err}");
                                None
                            }
                        }
                    })
                    .collect();
                SearchOutcome::Results { results }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => SearchOutcome::Error {
                error: "no results".to_owned(),
                code: err.code(),
            },
            Err(err) => SearchOutcome::Error {
                code: err.code(),
                error: err.to_string(),
            },
        }
    }

    /// Fetches the current BetterWorldBooks price listing for an ISBN,
    /// degrading every failure to `None`.
    pub fn get_betterworldbooks_metadata(&self, isbn: &str) -> Option<CanonicalMetadata> {
        if isbn.is_empty() {
            return None;
        }
        match self.lookup_betterworldbooks(isbn) {
            Ok(outcome) => outcome.found(),
            Err(err) => {
                warn!("betterworldbooks lookup for '{isbn}' failed: {err}");
                None
            }
        }
    }

    /// Fetches the current BetterWorldBooks price listing for an ISBN,
    /// keeping the typed outcome.
    ///
    /// # Errors
    ///
    /// As [`MetadataService::lookup_metadata`].
    pub fn lookup_betterworldbooks(
        &self,
        isbn: &str,
    ) -> Result<Lookup<CanonicalMetadata>, Error> {
        let isbn = normalize_isbn(isbn)?;

        let endpoint = self.config.betterworldbooks_endpoint.as_str();
        let affiliate_id = self.config.betterworldbooks_affiliate_id.as_str();

        self.betterworldbooks_cache.get_or_fetch(&isbn, || {
            match betterworldbooks::fetch::<C>(endpoint, &isbn) {
                Ok(raw) => Ok(Lookup::Found(normalize::normalize_betterworldbooks(
                    raw,
                    affiliate_id,
                ))),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(Lookup::Missing),
                Err(err) => Err(err),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::api::{impl_text_producer, MockClient, Producer, ThrottledProducer};
    use crate::cache::MemoryStore;
    use crate::model::OfferTier;

    const ITEM_LOOKUP_JSON: &str = include_str!("../tests/data/amazon_item_lookup.json");

    // A product that exists but has no offer section, so the normalized
    // metadata is valid yet carries no price.
    const PRICELESS_ITEM_JSON: &str = r#"{
        "Items": [{
            "ASIN": "B000FOO000",
            "ItemAttributes": { "Title": "Foo", "ProductGroup": "Book" }
        }]
    }"#;

    impl_text_producer! {
        ValidItemProducer => Ok(ITEM_LOOKUP_JSON.to_owned()),
        PricelessItemProducer => Ok(PRICELESS_ITEM_JSON.to_owned()),
        EmptyItemProducer => Ok(r#"{ "Items": [] }"#.to_owned()),
    }

    thread_local! {
        static FLAKY_CALLS: Cell<u32> = Cell::new(0);
    }

    // Fails with a throttling error on the first call of the test thread,
    // produces a priceless product on every later call.
    #[derive(Default)]
    struct ThrottledOnceProducer;

    impl Producer<String> for ThrottledOnceProducer {
        fn produce() -> Result<String, Error> {
            let calls = FLAKY_CALLS.with(|calls| {
                calls.set(calls.get() + 1);
                calls.get()
            });
            if calls == 1 {
                Err(Error::new(ErrorKind::Throttled, "vendor responded with status 503")
                    .with_code(503))
            } else {
                Ok(PRICELESS_ITEM_JSON.to_owned())
            }
        }
    }

    fn service<P: Producer<String>>() -> MetadataService<MockClient<P>> {
        MetadataService::new(ServiceConfig::default(), Arc::new(MemoryStore::new()))
    }

    #[test]
    fn lookup_by_isbn_normalizes_the_identifier_first() {
        let service = service::<ValidItemProducer>();

        let metadata = service
            .get_metadata("0-7356-1967-0", IdType::Isbn)
            .expect("the fixture product should normalize");

        assert_eq!(Some("Code Complete".to_owned()), metadata.title);
        assert_eq!(Some(1200), metadata.price_amt);
        assert_eq!(Some(OfferTier::Used), metadata.qlt);
    }

    #[test]
    fn malformed_isbn_degrades_to_none_without_a_fetch() {
        let service = service::<ValidItemProducer>();

        assert_eq!(None, service.get_metadata("not-an-isbn", IdType::Isbn));
        assert_eq!(None, service.get_metadata("", IdType::Isbn));
    }

    #[test]
    fn malformed_isbn_surfaces_as_a_format_error_on_the_typed_path() {
        let service = service::<ValidItemProducer>();

        let err = service
            .lookup_metadata("not-an-isbn", IdType::Isbn)
            .unwrap_err();

        assert_eq!(ErrorKind::Format, err.kind());
    }

    #[test]
    fn vendor_confirmed_missing_is_cached_on_the_lookup_path() {
        let service = service::<EmptyItemProducer>();

        assert_eq!(
            Lookup::Missing,
            service.lookup_metadata("B000FOO000", IdType::Asin).unwrap()
        );
        // Served from cache; the producer would answer identically anyway,
        // so assert on the typed outcome.
        assert_eq!(
            Lookup::Missing,
            service.lookup_metadata("B000FOO000", IdType::Asin).unwrap()
        );
        assert_eq!(None, service.get_metadata("B000FOO000", IdType::Asin));
    }

    #[test]
    fn throttled_lookup_degrades_then_recovers_then_serves_from_cache() {
        let service = service::<ThrottledOnceProducer>();

        // First caller hits the throttle: no metadata, nothing cached.
        assert_eq!(None, service.get_metadata("B000FOO000", IdType::Asin));

        // Second caller retries the fetch and gets the priceless product.
        let metadata = service
            .get_metadata("B000FOO000", IdType::Asin)
            .expect("the retry should reach the vendor");
        assert_eq!(Some("Foo".to_owned()), metadata.title);
        assert_eq!(None, metadata.price);

        // Third caller is served from cache without another fetch.
        let metadata = service
            .get_metadata("B000FOO000", IdType::Asin)
            .expect("the cached value should be returned");
        assert_eq!(Some("Foo".to_owned()), metadata.title);

        assert_eq!(2, FLAKY_CALLS.with(Cell::get));
    }

    #[test]
    fn priceless_but_valid_metadata_is_cached() {
        let service = service::<PricelessItemProducer>();

        let first = service.get_metadata("B000FOO000", IdType::Asin).unwrap();
        let second = service.get_metadata("B000FOO000", IdType::Asin).unwrap();

        assert_eq!(first, second);
        assert_eq!(None, first.price);
        assert_eq!(Some("Foo".to_owned()), first.title);
    }

    #[test]
    fn search_maps_every_result_through_the_normalizer() {
        let service = service::<ValidItemProducer>();

        match service.search("Code Complete", "Steve McConnell") {
            SearchOutcome::Results { results } => {
                assert_eq!(2, results.len());
                assert_eq!(Some("Code Complete".to_owned()), results[0].title);
            }
            SearchOutcome::Error { error, .. } => panic!("unexpected search error: {error}"),
        }
    }

    #[test]
    fn empty_search_reports_no_results_in_band() {
        let service = service::<EmptyItemProducer>();

        assert_eq!(
            SearchOutcome::Error {
                error: "no results".to_owned(),
                code: None,
            },
            service.search("t", "a")
        );
    }

    #[test]
    fn failed_search_reports_the_status_code_in_band() {
        let service = service::<ThrottledProducer>();

        match service.search("t", "a") {
            SearchOutcome::Error { code, .. } => assert_eq!(Some(503), code),
            SearchOutcome::Results { .. } => panic!("a throttled search cannot have results"),
        }
    }

    #[test]
    fn betterworldbooks_path_uses_the_short_lived_cache() {
        // The text body reaches the BWB fetcher through the same mock
        // client; any producer emitting tagged text works here.
        impl_text_producer! {
            ListingProducer => Ok(
                "<response><TotalUsed>2</TotalUsed>\
                 <LowestUsedPrice>$4.25</LowestUsedPrice></response>".to_owned()
            ),
        }

        let service = service::<ListingProducer>();

        let metadata = service
            .get_betterworldbooks_metadata("978-0-14-032872-1")
            .expect("the listing should normalize");

        assert_eq!(Some("$4.25 (used)".to_owned()), metadata.price);
        assert_eq!(Some(425), metadata.price_amt);
        assert_eq!(
            vec!["betterworldbooks:9780140328721".to_owned()],
            metadata.source_records
        );
    }

    #[test]
    fn identifier_type_parses_and_displays() {
        assert_eq!(IdType::Isbn, "isbn".parse().unwrap());
        assert_eq!(IdType::Asin, "asin".parse().unwrap());
        assert_eq!("isbn", IdType::Isbn.to_string());

        let err = IdType::from_str("upc").unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
    }
}
