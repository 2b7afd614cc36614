use std::time::Duration;

use serde::de::DeserializeOwned;

pub(crate) mod amazon;
pub(crate) mod betterworldbooks;

use crate::{model::Cents, Error, ErrorKind};

/// Seconds before an in-flight vendor request is abandoned.
///
/// Vendor fetches block the calling thread, so the transport enforces its own
/// deadline rather than trusting the vendor to hang up.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimal HTTP surface the vendor fetchers run against.
pub trait Client
where
    Self: Default,
{
    /// Fetches the raw text body at `url`.
    ///
    /// # Errors
    ///
    /// An `Err` of kind [`ErrorKind::Network`] is returned when the transport
    /// fails, [`ErrorKind::Throttled`] when the vendor answers with an error
    /// status, and [`ErrorKind::Malformed`] when the body is empty or
    /// unreadable.
    fn get_text(&self, url: &str) -> Result<String, Error>;

    /// Fetches and deserializes the JSON body at `url`.
    ///
    /// # Errors
    ///
    /// As [`Client::get_text`], with [`ErrorKind::Malformed`] when the body
    /// does not decode into `T`.
    fn get_json<T>(&self, url: &str) -> Result<T, Error>
    where
        T: DeserializeOwned;
}

/// Blocking HTTP client used for all vendor calls.
pub struct HttpClient {
    inner: reqwest::blocking::Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        let inner = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("TLS backend should initialise for the blocking client");
        Self { inner }
    }
}

impl Client for HttpClient {
    fn get_text(&self, url: &str) -> Result<String, Error> {
        let resp = self
            .inner
            .get(url)
            .send()
            .map_err(|e| Error::wrap(ErrorKind::Network, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::new(
                ErrorKind::Throttled,
                format!("vendor responded with status {status}"),
            )
            .with_code(status.as_u16()));
        }

        let text = resp
            .text()
            .map_err(|e| Error::wrap(ErrorKind::Malformed, e))?;

        if text.is_empty() {
            Err(Error::new(ErrorKind::Malformed, "response body is empty"))
        } else {
            Ok(text)
        }
    }

    fn get_json<T>(&self, url: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let resp = self
            .inner
            .get(url)
            .send()
            .map_err(|e| Error::wrap(ErrorKind::Network, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::new(
                ErrorKind::Throttled,
                format!("vendor responded with status {status}"),
            )
            .with_code(status.as_u16()));
        }

        resp.json()
            .map_err(|e| Error::wrap(ErrorKind::Malformed, e))
    }
}

/// Vendor-agnostic raw record every fetcher produces before normalization.
///
/// Wire formats differ per vendor (structured JSON against a tag-delimited
/// text body) but the differences stop at this boundary; the normalizer never
/// sees a vendor field name.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RawProduct {
    /// The vendor's own identifier for the listing (ASIN, or the queried
    /// ISBN for vendors without one).
    pub(crate) native_id: String,
    pub(crate) title: Option<String>,
    pub(crate) authors: Vec<String>,
    pub(crate) isbn: Option<String>,
    pub(crate) publisher: Option<String>,
    pub(crate) publication_date: Option<String>,
    pub(crate) binding: Option<String>,
    pub(crate) edition: Option<String>,
    pub(crate) number_of_pages: Option<u32>,
    pub(crate) languages: Vec<String>,
    pub(crate) cover: Option<String>,
    pub(crate) product_group: Option<String>,
    pub(crate) offer_summary: Option<RawOfferSummary>,
    /// Offers sold directly by the vendor, reported outside the summary.
    pub(crate) total_vendor_offers: Option<u32>,
}

/// Per-tier counts and lowest amounts as the vendor reported them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RawOfferSummary {
    pub(crate) total_new: Option<u32>,
    pub(crate) total_used: Option<u32>,
    pub(crate) total_collectible: Option<u32>,
    pub(crate) lowest_new: Option<Cents>,
    pub(crate) lowest_used: Option<Cents>,
    pub(crate) lowest_collectible: Option<Cents>,
}

#[cfg(test)]
pub(crate) use test::{
    assert_url, impl_text_producer, MockClient, NetworkErrorProducer, Producer,
    ThrottledProducer, URL_SINK,
};
