//! # Batch Splitter
//!
//! A message with several lines is a list of purchases, one per line. Each line
//! is parsed on its own; good lines become records, bad lines become errors, and
//! the caller reports both. There is no follow-up turn in batch mode, so a bare
//! product name without a price is an error rather than a question.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use crate::line_parser::{parse_line, ParseError, ParseOutcome};
use crate::purchase::PurchaseRecord;

/// A rejected line of a batch message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {error}")]
pub struct LineError {
    /// 1-based line number within the message
    pub line: usize,
    pub error: ParseError,
}

/// Records and errors collected from one batch message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub records: Vec<PurchaseRecord>,
    pub errors: Vec<LineError>,
}

impl BatchOutcome {
    pub fn success_count(&self) -> usize {
        self.records.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Split `text` into lines and parse each one.
///
/// Blank lines are skipped. Every record gets the same `date`, captured once by
/// the caller when the batch started.
pub fn parse_batch(text: &str, date: NaiveDate) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_number = index + 1;

        let error = match parse_line(line) {
            ParseOutcome::CompleteRecord(item) => {
                outcome.records.push(item.dated(date));
                continue;
            }
            ParseOutcome::ProductOnly(product) => ParseError::MissingPrice { product },
            ParseOutcome::Unparseable(error) => error,
        };

        debug!(line = line_number, %error, "Rejected batch line");
        outcome.errors.push(LineError {
            line: line_number,
            error,
        });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_mixed_batch() {
        let outcome = parse_batch("كولا 23\nشيبس 19.5\nxyz", day());

        assert_eq!(outcome.success_count(), 2);
        assert_eq!(outcome.records[0].product(), "كولا");
        assert_eq!(outcome.records[1].price(), Decimal::new(195, 1));
        assert_eq!(
            outcome.errors,
            vec![LineError {
                line: 3,
                error: ParseError::MissingPrice {
                    product: "xyz".to_string()
                },
            }]
        );
    }

    #[test]
    fn test_blank_lines_skipped_but_numbered() {
        let outcome = parse_batch("كولا ٢٣\n\n   \nمنتج 0", day());

        assert_eq!(outcome.success_count(), 1);
        assert_eq!(outcome.error_count(), 1);
        assert_eq!(outcome.errors[0].line, 4);
        assert_eq!(outcome.errors[0].error.product(), Some("منتج"));
    }

    #[test]
    fn test_shared_date_and_notes() {
        let outcome = parse_batch("قهوة 26.5 بدون سكر\nحليب 8", day());

        assert!(outcome.records.iter().all(|r| r.date() == day()));
        assert_eq!(outcome.records[0].notes(), "بدون سكر");
        assert_eq!(outcome.records[1].notes(), "");
    }

    #[test]
    fn test_arabic_decimal_separator_in_batch() {
        let outcome = parse_batch("قهوة ٢٦٫٥\nكولا 23", day());

        assert_eq!(outcome.error_count(), 0);
        assert_eq!(outcome.records[0].price(), Decimal::new(265, 1));
    }

    #[test]
    fn test_all_lines_bad() {
        let outcome = parse_batch("خبز أبيض\n15 جبنة", day());

        assert_eq!(outcome.success_count(), 0);
        assert_eq!(outcome.error_count(), 2);
        assert!(matches!(
            outcome.errors[1].error,
            ParseError::MissingProduct { .. }
        ));
    }
}
