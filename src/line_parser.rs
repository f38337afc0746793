//! # Line Parser
//!
//! Decides what a single line of user text means:
//!
//! - `كولا 23` is a complete purchase (product, price, no notes)
//! - `قهوة ٢٦.٥ بدون سكر` is a complete purchase with notes
//! - `كولا` is only a product name, the price comes in a later message
//!
//! The first token that parses as a number splits the line: everything before
//! it is the product, everything after it is notes. Product names rarely contain
//! raw numerals, so the first number is overwhelmingly the price.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::trace;

use crate::numerals::{normalize_digits, parse_decimal};
use crate::purchase::{PurchaseItem, RecordError};

/// Why a line did not yield a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line is empty")]
    Empty,
    #[error("no product name before price {price}")]
    MissingProduct { price: Decimal },
    #[error("no price given for {product:?}")]
    MissingPrice { product: String },
    #[error("price {price} for {product:?} is out of range")]
    PriceOutOfRange { product: String, price: Decimal },
}

impl ParseError {
    /// Product the error is about, when one could be extracted
    pub fn product(&self) -> Option<&str> {
        match self {
            ParseError::MissingPrice { product } | ParseError::PriceOutOfRange { product, .. } => {
                Some(product.as_str())
            }
            ParseError::Empty | ParseError::MissingProduct { .. } => None,
        }
    }
}

/// Result of parsing one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Product, price and notes (possibly empty) were all found
    CompleteRecord(PurchaseItem),
    /// Only a product name; the price has to be asked for
    ProductOnly(String),
    Unparseable(ParseError),
}

/// Parse one line of user input.
///
/// Product and notes keep the user's original digit glyphs; only the price
/// candidate is normalized before parsing.
pub fn parse_line(raw: &str) -> ParseOutcome {
    let line = raw.trim();
    if line.is_empty() {
        return ParseOutcome::Unparseable(ParseError::Empty);
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        trace!(?line, "Single token, treating as product name");
        return ParseOutcome::ProductOnly(line.to_string());
    }

    let Some((index, price)) = tokens
        .iter()
        .enumerate()
        .find_map(|(i, token)| parse_decimal(&normalize_digits(token)).map(|price| (i, price)))
    else {
        trace!(?line, "No numeric token, treating line as product name");
        return ParseOutcome::ProductOnly(line.to_string());
    };

    let product = tokens[..index].join(" ");
    let notes = tokens[index + 1..].join(" ");

    match PurchaseItem::new(product.as_str(), price, notes) {
        Ok(item) => {
            trace!(?item, "Parsed complete record");
            ParseOutcome::CompleteRecord(item)
        }
        Err(RecordError::EmptyProduct) => {
            ParseOutcome::Unparseable(ParseError::MissingProduct { price })
        }
        Err(RecordError::PriceOutOfRange(price)) => {
            ParseOutcome::Unparseable(ParseError::PriceOutOfRange { product, price })
        }
    }
}
