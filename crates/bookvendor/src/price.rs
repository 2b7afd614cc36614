//! Headline-price selection across offer tiers.

use crate::model::{Cents, OfferTier};

/// Returns the price a tier contributes to selection.
///
/// A tier whose offer count is zero or unreported contributes nothing, even
/// when the vendor left a price field populated: a price with no copies
/// behind it is not an offer.
pub(crate) fn tier_price(amount: Option<Cents>, total: Option<u32>) -> Option<Cents> {
    match total {
        Some(total) if total > 0 => amount,
        _ => None,
    }
}

/// Picks the headline price between the used and new tiers.
///
/// The lower amount wins. Equal amounts resolve to `used` - an explicit
/// policy, not an accident of evaluation order. Collectible offers never
/// compete here; they are informational and live only in the offer summary.
pub(crate) fn select_price(
    used: Option<Cents>,
    new: Option<Cents>,
) -> Option<(Cents, OfferTier)> {
    match (used, new) {
        (Some(used), Some(new)) if used <= new => Some((used, OfferTier::Used)),
        (_, Some(new)) => Some((new, OfferTier::New)),
        (Some(used), None) => Some((used, OfferTier::Used)),
        (None, None) => None,
    }
}

/// Formats minor units as a grouped two-decimal amount, e.g. `1,234.56`.
pub(crate) fn format_dollars(amount: Cents) -> String {
    let dollars = (amount / 100).to_string();
    let cents = amount % 100;

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3 + 3);
    for (i, c) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{grouped}.{cents:02}")
}
