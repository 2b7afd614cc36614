//! ISBN normalization and conversion.
//!
//! Vendors hand back identifiers in whatever shape their catalog holds them,
//! so everything entering the cache or the canonical schema goes through
//! [`normalize_isbn`] first. Conversion between the two forms is only defined
//! in one direction for the `979` Bookland range: every ISBN-10 has an
//! ISBN-13, but only `978`-prefixed ISBN-13s can be mapped back.

use crate::{Error, ErrorKind};

/// Normalizes an ISBN-10 or ISBN-13 by stripping separators and validating
/// the check digit.
///
/// Hyphens and spaces are removed and a trailing lowercase `x` is uppercased.
///
/// # Errors
///
/// An `Err` of kind [`ErrorKind::Format`] is returned when the input is not a
/// checksum-valid ISBN of either length.
pub fn normalize_isbn(isbn: &str) -> Result<String, Error> {
    let compact: String = isbn
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let valid = match compact.len() {
        10 => is_valid_isbn_10(&compact),
        13 => is_valid_isbn_13(&compact),
        _ => false,
    };

    if valid {
        Ok(compact)
    } else {
        Err(Error::new(
            ErrorKind::Format,
            format!("'{isbn}' is not a valid ISBN-10 or ISBN-13"),
        ))
    }
}

/// Derives the ISBN-13 form of an ISBN-10.
///
/// # Errors
///
/// An `Err` of kind [`ErrorKind::Format`] is returned when the input is not a
/// valid ISBN-10.
pub fn isbn_10_to_13(isbn: &str) -> Result<String, Error> {
    let isbn = normalize_isbn(isbn)?;
    if isbn.len() != 10 {
        return Err(Error::new(
            ErrorKind::Format,
            format!("'{isbn}' is not an ISBN-10"),
        ));
    }

    let mut isbn_13 = String::with_capacity(13);
    isbn_13.push_str("978");
    isbn_13.push_str(&isbn[..9]);
    isbn_13.push(digit_char(ean_check_digit(&isbn_13)));
    Ok(isbn_13)
}

/// Derives the ISBN-10 form of a `978`-prefixed ISBN-13.
///
/// # Errors
///
/// An `Err` of kind [`ErrorKind::Format`] is returned when the input is not a
/// valid ISBN-13 or carries a Bookland prefix other than `978`, which has no
/// ISBN-10 form.
pub fn isbn_13_to_10(isbn: &str) -> Result<String, Error> {
    let isbn = normalize_isbn(isbn)?;
    if isbn.len() != 13 {
        return Err(Error::new(
            ErrorKind::Format,
            format!("'{isbn}' is not an ISBN-13"),
        ));
    }
    if !isbn.starts_with("978") {
        return Err(Error::new(
            ErrorKind::Format,
            format!("'{isbn}' has no ISBN-10 form"),
        ));
    }

    let mut isbn_10 = isbn[3..12].to_owned();
    match isbn_10_check_digit(&isbn_10) {
        10 => isbn_10.push('X'),
        digit => isbn_10.push(digit_char(digit)),
    }
    Ok(isbn_10)
}

fn is_valid_isbn_10(isbn: &str) -> bool {
    let mut sum = 0;
    for (c, weight) in isbn.chars().zip((1..=10u32).rev()) {
        let value = match c {
            'X' if weight == 1 => 10,
            _ => match c.to_digit(10) {
                Some(d) => d,
                None => return false,
            },
        };
        sum += value * weight;
    }
    sum % 11 == 0
}

fn is_valid_isbn_13(isbn: &str) -> bool {
    let mut sum = 0;
    for (i, c) in isbn.chars().enumerate() {
        match c.to_digit(10) {
            Some(d) => sum += d * if i % 2 == 0 { 1 } else { 3 },
            None => return false,
        }
    }
    sum % 10 == 0
}

/// Check digit for the first twelve digits of an ISBN-13.
fn ean_check_digit(digits: &str) -> u32 {
    let sum: u32 = digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .zip([1, 3].into_iter().cycle())
        .map(|(d, w)| d * w)
        .sum();
    (10 - sum % 10) % 10
}

/// Check digit for the first nine digits of an ISBN-10; `10` stands for `X`.
fn isbn_10_check_digit(digits: &str) -> u32 {
    let sum: u32 = digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .zip((2..=10).rev())
        .map(|(d, w)| d * w)
        .sum();
    (11 - sum % 11) % 11
}

fn digit_char(digit: u32) -> char {
    char::from_digit(digit, 10).expect("check digits are single decimal digits")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_separators() {
        assert_eq!("9780140328721", normalize_isbn("978-0-14-032872-1").unwrap());
        assert_eq!("0140328726", normalize_isbn("0 14 032872 6").unwrap());
    }

    #[test]
    fn normalize_uppercases_final_x() {
        assert_eq!("080442957X", normalize_isbn("080442957x").unwrap());
    }

    #[test]
    fn normalize_rejects_bad_checksum() {
        let err = normalize_isbn("0140328727").unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());

        let err = normalize_isbn("9780140328722").unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
    }

    #[test]
    fn normalize_rejects_wrong_length() {
        assert_eq!(
            ErrorKind::Format,
            normalize_isbn("12345").unwrap_err().kind()
        );
        assert_eq!(ErrorKind::Format, normalize_isbn("").unwrap_err().kind());
    }

    #[test]
    fn ten_to_thirteen_derives_known_pair() {
        assert_eq!("9780140328721", isbn_10_to_13("0140328726").unwrap());
    }

    #[test]
    fn thirteen_to_ten_derives_known_pair() {
        assert_eq!("0140328726", isbn_13_to_10("9780140328721").unwrap());
    }

    #[test]
    fn ten_to_thirteen_handles_x_check_digit() {
        assert_eq!("9780804429573", isbn_10_to_13("080442957X").unwrap());
        assert_eq!("080442957X", isbn_13_to_10("9780804429573").unwrap());
    }

    #[test]
    fn non_978_prefix_has_no_isbn_10_form() {
        let err = isbn_13_to_10("9798123456781").unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
    }

    #[test]
    fn conversion_round_trips_for_978_isbns() {
        for isbn_13 in ["9780140328721", "9780804429573", "9780735619678"] {
            let isbn_10 = isbn_13_to_10(isbn_13).unwrap();
            assert_eq!(isbn_13, isbn_10_to_13(&isbn_10).unwrap());
        }
    }
}
