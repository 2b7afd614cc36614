use log::{info, trace};
use serde::Deserialize;

use crate::{model::Cents, service::IdType, Error, ErrorKind};

use super::{Client, RawOfferSummary, RawProduct};

/// Looks up a single product by identifier.
///
/// Books are looked up on the Books search index so the offer data comes
/// back; an ASIN addresses the listing directly. More than one product can
/// match an identifier - the first is taken, deterministically.
pub(crate) fn lookup<C: Client>(
    endpoint: &str,
    id: &str,
    id_type: IdType,
) -> Result<RawProduct, Error> {
    info!("Looking up {id_type} '{id}' with the Amazon product API");
    let mut url = format!("{endpoint}?Operation=ItemLookup&MerchantId=Amazon");
    if id_type == IdType::Isbn {
        url.push_str("&SearchIndex=Books&IdType=ISBN");
    }
    url.push_str("&ItemId=");
    url.push_str(id);

    let client = C::default();
    let ItemPage { mut items } = client.get_json(&url)?;

    trace!("Lookup returned {} item(s)", items.len());

    let product = items.drain(..).next().ok_or_else(|| {
        Error::new(
            ErrorKind::NotFound,
            format!("no product found for {id_type} '{id}'"),
        )
    })?;

    Ok(product.into_raw())
}

/// Searches the vendor catalog for books by title and/or author.
pub(crate) fn search<C: Client>(
    endpoint: &str,
    title: &str,
    author: &str,
) -> Result<Vec<RawProduct>, Error> {
    info!("Searching the Amazon catalog for title '{title}' and author '{author}'");
    let url =
        format!("{endpoint}?Operation=ItemSearch&SearchIndex=Books&Title={title}&Author={author}");

    let client = C::default();
    let ItemPage { items } = client.get_json(&url)?;

    if items.is_empty() {
        Err(Error::new(ErrorKind::NotFound, "no results"))
    } else {
        Ok(items.into_iter().map(ProductModel::into_raw).collect())
    }
}

#[derive(Deserialize)]
#[cfg_attr(test, derive(Debug))]
struct ItemPage {
    #[serde(rename = "Items", default)]
    items: Vec<ProductModel>,
}

#[derive(Deserialize)]
#[cfg_attr(test, derive(Debug))]
struct ProductModel {
    #[serde(rename = "ASIN")]
    asin: String,
    #[serde(rename = "ItemAttributes")]
    attributes: AttributesModel,
    #[serde(rename = "LargeImage")]
    large_image: Option<ImageModel>,
    #[serde(rename = "OfferSummary")]
    offer_summary: Option<OfferSummaryModel>,
    #[serde(rename = "Offers")]
    offers: Option<OffersModel>,
}

#[derive(Deserialize)]
#[cfg_attr(test, derive(Debug))]
struct AttributesModel {
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Author", default)]
    authors: Vec<String>,
    #[serde(rename = "ISBN")]
    isbn: Option<String>,
    #[serde(rename = "NumberOfPages")]
    number_of_pages: Option<String>,
    #[serde(rename = "Languages", default)]
    languages: Vec<String>,
    #[serde(rename = "PublicationDate")]
    publication_date: Option<String>,
    #[serde(rename = "Publisher")]
    publisher: Option<String>,
    #[serde(rename = "Binding")]
    binding: Option<String>,
    #[serde(rename = "Edition")]
    edition: Option<String>,
    #[serde(rename = "ProductGroup")]
    product_group: Option<String>,
}

#[derive(Deserialize)]
#[cfg_attr(test, derive(Debug))]
struct ImageModel {
    #[serde(rename = "URL")]
    url: String,
}

/// Offer counts come over the wire as strings, `"0"` included.
#[derive(Deserialize)]
#[cfg_attr(test, derive(Debug))]
struct OfferSummaryModel {
    #[serde(rename = "TotalNew")]
    total_new: Option<String>,
    #[serde(rename = "TotalUsed")]
    total_used: Option<String>,
    #[serde(rename = "TotalCollectible")]
    total_collectible: Option<String>,
    #[serde(rename = "LowestNewPrice")]
    lowest_new: Option<PriceModel>,
    #[serde(rename = "LowestUsedPrice")]
    lowest_used: Option<PriceModel>,
    #[serde(rename = "LowestCollectiblePrice")]
    lowest_collectible: Option<PriceModel>,
}

#[derive(Deserialize)]
#[cfg_attr(test, derive(Debug))]
struct PriceModel {
    #[serde(rename = "Amount")]
    amount: Cents,
}

#[derive(Deserialize)]
#[cfg_attr(test, derive(Debug))]
struct OffersModel {
    #[serde(rename = "TotalOffers")]
    total_offers: Option<String>,
}

impl ProductModel {
    /// Flattens the vendor wire shape into the common raw record.
    fn into_raw(self) -> RawProduct {
        // Deconstruct to take ownership of fields (avoids cloning).
        let ProductModel {
            asin,
            attributes:
                AttributesModel {
                    title,
                    mut authors,
                    isbn,
                    number_of_pages,
                    languages,
                    publication_date,
                    publisher,
                    binding,
                    edition,
                    product_group,
                },
            large_image,
            offer_summary,
            offers,
        } = self;

        authors.retain(|author| !author.is_empty());

        RawProduct {
            native_id: asin,
            title,
            authors,
            isbn,
            publisher,
            publication_date,
            binding,
            edition,
            number_of_pages: number_of_pages.and_then(|p| p.parse().ok()),
            languages,
            cover: large_image.map(|i| i.url),
            product_group,
            offer_summary: offer_summary.map(OfferSummaryModel::into_raw),
            total_vendor_offers: offers
                .and_then(|o| o.total_offers)
                .and_then(|t| t.parse().ok()),
        }
    }
}

impl OfferSummaryModel {
    fn into_raw(self) -> RawOfferSummary {
        RawOfferSummary {
            total_new: parse_count(self.total_new),
            total_used: parse_count(self.total_used),
            total_collectible: parse_count(self.total_collectible),
            lowest_new: self.lowest_new.map(|p| p.amount),
            lowest_used: self.lowest_used.map(|p| p.amount),
            lowest_collectible: self.lowest_collectible.map(|p| p.amount),
        }
    }
}

fn parse_count(raw: Option<String>) -> Option<u32> {
    raw.and_then(|count| count.parse().ok())
}
