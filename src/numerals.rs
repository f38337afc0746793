//! # Numeral Normalization
//!
//! Users type prices with Arabic-Indic digits (`٢٦.٥`), Persian/Urdu digits
//! (`۲۶.۵`), ASCII digits, or a mix of them. Everything numeric in this crate goes
//! through [`normalize_digits`] first and is then parsed with [`parse_decimal`],
//! which deliberately accepts ASCII digits only.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::str::FromStr;

/// Code point of the digit zero for each supported decimal-digit block.
const DIGIT_ZEROS: &[u32] = &[
    0x0660, // Arabic-Indic
    0x06F0, // Extended Arabic-Indic
    0x07C0, // NKo
    0x0966, // Devanagari
    0x09E6, // Bengali
    0x0A66, // Gurmukhi
    0x0AE6, // Gujarati
    0x0B66, // Oriya
    0x0BE6, // Tamil
    0x0C66, // Telugu
    0x0CE6, // Kannada
    0x0D66, // Malayalam
    0x0E50, // Thai
    0x0ED0, // Lao
    0x0F20, // Tibetan
    0x1040, // Myanmar
    0x17E0, // Khmer
    0x1810, // Mongolian
    0xFF10, // Fullwidth
];

/// Arabic decimal separator, typed instead of `.` on Arabic keyboards
pub const ARABIC_DECIMAL_SEPARATOR: char = '\u{066B}';

/// Arabic thousands separator, dropped during normalization
pub const ARABIC_THOUSANDS_SEPARATOR: char = '\u{066C}';

fn ascii_digit(c: char) -> Option<char> {
    let code = c as u32;
    DIGIT_ZEROS
        .iter()
        .find(|&&zero| (zero..zero + 10).contains(&code))
        .and_then(|&zero| char::from_digit(code - zero, 10))
}

fn needs_rewrite(c: char) -> bool {
    c == ARABIC_DECIMAL_SEPARATOR || c == ARABIC_THOUSANDS_SEPARATOR || ascii_digit(c).is_some()
}

/// Replace every non-ASCII decimal digit with its ASCII equivalent.
///
/// The Arabic decimal separator `٫` becomes `.` and the Arabic thousands
/// separator `٬` is removed. All other characters pass through unchanged.
/// Borrows the input when there is nothing to replace.
///
/// ```rust
/// use purchases::numerals::normalize_digits;
///
/// assert_eq!(normalize_digits("قهوة ٢٦.٥"), "قهوة 26.5");
/// assert_eq!(normalize_digits("٢٦٫٥"), "26.5");
/// assert_eq!(normalize_digits("١٬٢٥٠"), "1250");
/// assert_eq!(normalize_digits("۱۲۳"), "123");
/// ```
pub fn normalize_digits(text: &str) -> Cow<'_, str> {
    if !text.chars().any(needs_rewrite) {
        return Cow::Borrowed(text);
    }

    Cow::Owned(
        text.chars()
            .filter(|&c| c != ARABIC_THOUSANDS_SEPARATOR)
            .map(|c| match c {
                ARABIC_DECIMAL_SEPARATOR => '.',
                c => ascii_digit(c).unwrap_or(c),
            })
            .collect(),
    )
}

// Optional sign, ASCII digits, at most one decimal point. A trailing point
// (`23.`) is allowed since prices often end a sentence.
// `[0-9]` rather than `\d`: `\d` would also accept Arabic-Indic digits.
const DECIMAL_PATTERN: &str = r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)$";

/// Integer digits a `Decimal` can hold.
const MAX_INTEGER_DIGITS: usize = 28;

lazy_static! {
    static ref DECIMAL_REGEX: Regex =
        Regex::new(DECIMAL_PATTERN).expect("Decimal token pattern should be valid");
}

/// Parse an already-normalized token as a decimal number.
///
/// Accepts an optional sign, ASCII digits and at most one `.` (`12`, `-3`,
/// `26.5`, `.5`, `23.`). Returns `None` for anything else, including digits
/// from other scripts. Numbers too large for [`Decimal`] saturate to
/// [`Decimal::MAX`] (or [`Decimal::MIN`]), so they still read as numbers and
/// fail the price bounds instead of passing for text.
pub fn parse_decimal(token: &str) -> Option<Decimal> {
    if !DECIMAL_REGEX.is_match(token) {
        return None;
    }

    let (negative, unsigned) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    let unsigned = unsigned.strip_suffix('.').unwrap_or(unsigned);
    let canonical = if unsigned.starts_with('.') {
        Cow::Owned(format!("0{unsigned}"))
    } else {
        Cow::Borrowed(unsigned)
    };

    let value = match Decimal::from_str(&canonical) {
        Ok(value) => value,
        Err(_) if integer_digits(&canonical) > MAX_INTEGER_DIGITS => Decimal::MAX,
        Err(_) => return None,
    };
    Some(if negative { -value } else { value })
}

fn integer_digits(unsigned: &str) -> usize {
    unsigned
        .split('.')
        .next()
        .unwrap_or_default()
        .trim_start_matches('0')
        .len()
}
