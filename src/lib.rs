//! # Purchases Telegram Bot
//!
//! A Telegram bot for logging purchases in Arabic. Users send `product price
//! [notes]` lines, in Arabic-Indic or ASCII digits, one at a time or as a list,
//! and every accepted purchase is appended to a shared ledger (a Google Sheets
//! worksheet or a PostgreSQL table).

pub mod batch;
pub mod bot;
pub mod config;
pub mod dialogue;
pub mod instance_lock;
pub mod ledger;
pub mod line_parser;
pub mod localization;
pub mod logging;
pub mod numerals;
pub mod purchase;
