//! UI Builder module for formatting replies

// Import localization
use crate::localization::{t_args_lang, t_lang};

use crate::batch::LineError;
use crate::config::MAX_RECENT_LIMIT;
use crate::dialogue::Prompt;
use crate::line_parser::ParseError;
use crate::purchase::{display_price, PriceError, PurchaseRecord, MAX_PRICE, MIN_PRICE};

use super::dialogue_manager::Reply;

/// Explain why a line was not accepted
pub fn format_parse_error(error: &ParseError, language_code: Option<&str>) -> String {
    match error {
        ParseError::Empty => t_lang("line-empty", language_code),
        ParseError::MissingProduct { price } => t_args_lang(
            "line-missing-product",
            &[("price", display_price(*price).as_str())],
            language_code,
        ),
        ParseError::MissingPrice { product } => {
            t_args_lang("line-missing-price", &[("product", product.as_str())], language_code)
        }
        ParseError::PriceOutOfRange { product, price } => t_args_lang(
            "line-price-out-of-range",
            &[("product", product.as_str()), ("price", display_price(*price).as_str())],
            language_code,
        ),
    }
}

fn format_line_error(error: &LineError, language_code: Option<&str>) -> String {
    t_args_lang(
        "line-error",
        &[
            ("line", error.line.to_string().as_str()),
            ("reason", format_parse_error(&error.error, language_code).as_str()),
        ],
        language_code,
    )
}

fn format_prompt(prompt: &Prompt, language_code: Option<&str>) -> String {
    match prompt {
        Prompt::AskPrice { product } => {
            t_args_lang("ask-price", &[("product", product.as_str())], language_code)
        }
        Prompt::AskNotes => t_lang("ask-notes", language_code),
        Prompt::InvalidLine(error) => format_parse_error(error, language_code),
        Prompt::InvalidPrice(PriceError::NotANumber(_)) => t_lang("invalid-price", language_code),
        Prompt::InvalidPrice(PriceError::OutOfRange(price)) => t_args_lang(
            "price-out-of-range",
            &[
                ("price", display_price(*price).as_str()),
                ("min", display_price(MIN_PRICE).as_str()),
                ("max", display_price(MAX_PRICE).as_str()),
            ],
            language_code,
        ),
        Prompt::PriceRequired => t_lang("price-required", language_code),
        Prompt::NothingToSkip => t_lang("nothing-to-skip", language_code),
    }
}

/// Confirmation for a stored record
pub fn format_added(record: &PurchaseRecord, language_code: Option<&str>) -> String {
    let notes = if record.notes().is_empty() {
        t_lang("notes-none", language_code)
    } else {
        record.notes().to_string()
    };

    t_args_lang(
        "record-added",
        &[
            ("product", record.product()),
            ("price", display_price(record.price()).as_str()),
            ("notes", notes.as_str()),
        ],
        language_code,
    )
}

/// Format stored purchases as a numbered list, oldest first
pub fn format_recent_list(records: &[PurchaseRecord], language_code: Option<&str>) -> String {
    let mut result = t_args_lang(
        "recent-header",
        &[("count", records.len().to_string().as_str())],
        language_code,
    );
    result.push('\n');

    for (i, record) in records.iter().enumerate() {
        result.push_str(&format!(
            "\n{}. {} • {} • {}",
            i + 1,
            record.date().format("%Y-%m-%d"),
            record.product(),
            display_price(record.price())
        ));
        if !record.notes().is_empty() {
            result.push_str(&format!(" ({})", record.notes()));
        }
    }

    result
}

/// Render one reply as message text
pub fn render_reply(reply: &Reply, language_code: Option<&str>) -> String {
    match reply {
        Reply::Welcome => t_lang("welcome", language_code),
        Reply::Help => format!(
            "{}\n\n{}",
            t_lang("welcome", language_code),
            t_lang("help-commands", language_code)
        ),
        Reply::Prompt(prompt) => format_prompt(prompt, language_code),
        Reply::Added(record) => format_added(record, language_code),
        Reply::BatchSummary {
            added,
            failed,
            errors,
        } => {
            let mut lines = Vec::new();
            if *added > 0 {
                lines.push(t_args_lang(
                    "batch-added",
                    &[("count", added.to_string().as_str())],
                    language_code,
                ));
            }
            if *failed > 0 {
                lines.push(t_args_lang(
                    "batch-failed",
                    &[("count", failed.to_string().as_str())],
                    language_code,
                ));
            }
            lines.extend(errors.iter().map(|e| format_line_error(e, language_code)));
            lines.join("\n")
        }
        Reply::Cancelled => t_lang("cancelled", language_code),
        Reply::SinkFailure => t_lang("sink-failure", language_code),
        Reply::SessionLost => t_lang("session-lost", language_code),
        Reply::Recent(records) => format_recent_list(records, language_code),
        Reply::NoRecent => t_lang("recent-empty", language_code),
        Reply::RecentFailure => t_lang("recent-failed", language_code),
        Reply::RecentUsage => t_args_lang(
            "recent-usage",
            &[("max", MAX_RECENT_LIMIT.to_string().as_str())],
            language_code,
        ),
    }
}
