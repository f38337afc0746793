//! # Purchase Record Model
//!
//! A [`PurchaseRecord`] is one row of the shared ledger: the date it was
//! submitted, what was bought, what it cost and optional free-form notes.
//! [`PurchaseItem`] is the same entry before a date is attached. Both are
//! validated on construction and immutable afterwards.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::numerals::{normalize_digits, parse_decimal};

/// Smallest accepted price (0.01).
pub const MIN_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest accepted price (1,000,000).
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Why a price was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("{0:?} is not a number")]
    NotANumber(String),
    #[error("price {0} is outside the accepted range")]
    OutOfRange(Decimal),
}

/// Why a record could not be built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("product name is empty")]
    EmptyProduct,
    #[error("price {0} is outside the accepted range")]
    PriceOutOfRange(Decimal),
}

/// True when `price` lies within [`MIN_PRICE`] and [`MAX_PRICE`].
pub fn is_valid_price(price: Decimal) -> bool {
    (MIN_PRICE..=MAX_PRICE).contains(&price)
}

/// Check a parsed price against [`MIN_PRICE`] and [`MAX_PRICE`].
pub fn check_price_bounds(price: Decimal) -> Result<Decimal, PriceError> {
    if is_valid_price(price) {
        Ok(price)
    } else {
        Err(PriceError::OutOfRange(price))
    }
}

/// Parse a whole user reply as a price, normalizing digits first.
pub fn parse_price(input: &str) -> Result<Decimal, PriceError> {
    let trimmed = input.trim();
    let normalized = normalize_digits(trimmed);
    let price = parse_decimal(&normalized)
        .ok_or_else(|| PriceError::NotANumber(trimmed.to_string()))?;
    check_price_bounds(price)
}

/// Format a price without trailing zeros (`26.50` → `26.5`, `23.0` → `23`).
pub fn display_price(price: Decimal) -> String {
    price.normalize().to_string()
}

/// A validated purchase that has no date yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseItem {
    product: String,
    price: Decimal,
    notes: String,
}

impl PurchaseItem {
    /// Trim the text fields and validate product and price.
    pub fn new(
        product: impl Into<String>,
        price: Decimal,
        notes: impl Into<String>,
    ) -> Result<Self, RecordError> {
        let product = product.into().trim().to_string();
        if product.is_empty() {
            return Err(RecordError::EmptyProduct);
        }
        if !is_valid_price(price) {
            return Err(RecordError::PriceOutOfRange(price));
        }

        Ok(Self {
            product,
            price,
            notes: notes.into().trim().to_string(),
        })
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Attach the purchase date.
    pub fn dated(self, date: NaiveDate) -> PurchaseRecord {
        PurchaseRecord {
            date,
            product: self.product,
            price: self.price,
            notes: self.notes,
        }
    }
}

/// One purchase as stored in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    date: NaiveDate,
    product: String,
    price: Decimal,
    notes: String,
}

impl PurchaseRecord {
    /// Build a record, trimming the text fields and validating product and price.
    pub fn new(
        date: NaiveDate,
        product: impl Into<String>,
        price: Decimal,
        notes: impl Into<String>,
    ) -> Result<Self, RecordError> {
        Ok(PurchaseItem::new(product, price, notes)?.dated(date))
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    /// Notes, empty when the user skipped them
    pub fn notes(&self) -> &str {
        &self.notes
    }
}

impl fmt::Display for PurchaseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.date.format("%Y-%m-%d"),
            self.product,
            display_price(self.price)
        )?;
        if !self.notes.is_empty() {
            write!(f, " ({})", self.notes)?;
        }
        Ok(())
    }
}
