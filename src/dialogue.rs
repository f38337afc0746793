//! Purchase entry dialogue: per-user conversation state and its transitions.
//!
//! A user either sends a whole purchase in one message, or builds it up over
//! several turns: product name, then price, then notes. [`ConversationSession`]
//! carries the partial input between turns and [`ConversationSession::advance`]
//! decides what the next message means. Nothing here talks to Telegram or the
//! ledger; the caller executes the returned [`Transition`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use thiserror::Error;

use crate::batch::{parse_batch, BatchOutcome};
use crate::line_parser::{parse_line, ParseError, ParseOutcome};
use crate::purchase::{is_valid_price, parse_price, PriceError, PurchaseRecord, RecordError};

/// Replies meaning "no notes" while notes are awaited
pub const NO_NOTES_WORDS: &[&str] = &[".", "لا", "no"];

/// Where the user is in the entry flow
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    AwaitingProduct,
    AwaitingPrice,
    AwaitingNotes,
}

/// Partially entered purchase of one user
///
/// `pending_price` is only set once `pending_product` is, and `AwaitingNotes`
/// requires both. The default value is the initial, empty session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub state: SessionState,
    pub pending_product: Option<String>,
    pub pending_price: Option<Decimal>,
}

/// Type alias for the purchase dialogue
pub type PurchaseDialogue = Dialogue<ConversationSession, InMemStorage<ConversationSession>>;

/// What the user sent, as far as the state machine is concerned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Text(&'a str),
    Skip,
    Cancel,
}

/// Follow-up message for a flow that is still open
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prompt {
    AskPrice { product: String },
    AskNotes,
    InvalidLine(ParseError),
    InvalidPrice(PriceError),
    /// `/skip` while a price is still missing
    PriceRequired,
    NothingToSkip,
}

/// The session was found in a state its handler cannot work with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("state {0:?} reached without a pending product")]
    MissingProduct(SessionState),
    #[error("state {0:?} reached without a pending price")]
    MissingPrice(SessionState),
    #[error("pending data no longer forms a valid record: {0}")]
    InvalidRecord(#[from] RecordError),
}

/// Outcome of feeding one input into a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Flow continues in `next`; tell the user `prompt`
    Continue {
        next: ConversationSession,
        prompt: Prompt,
    },
    /// Submit one record and end the flow
    Submit(PurchaseRecord),
    /// Submit the valid lines of a batch and end the flow
    SubmitBatch(BatchOutcome),
    Cancelled,
    /// Invariant broken; end the flow and ask the user to start over
    Aborted(SessionError),
}

impl ConversationSession {
    /// Session waiting for the price of `product`
    pub fn awaiting_price(product: impl Into<String>) -> Self {
        Self {
            state: SessionState::AwaitingPrice,
            pending_product: Some(product.into()),
            pending_price: None,
        }
    }

    /// Session waiting for the notes of `product` bought at `price`
    pub fn awaiting_notes(product: impl Into<String>, price: Decimal) -> Self {
        Self {
            state: SessionState::AwaitingNotes,
            pending_product: Some(product.into()),
            pending_price: Some(price),
        }
    }

    pub fn is_initial(&self) -> bool {
        *self == Self::default()
    }

    fn product(&self) -> Result<&str, SessionError> {
        self.pending_product
            .as_deref()
            .filter(|product| !product.trim().is_empty())
            .ok_or(SessionError::MissingProduct(self.state))
    }

    fn price(&self) -> Result<Decimal, SessionError> {
        let price = self
            .pending_price
            .ok_or(SessionError::MissingPrice(self.state))?;
        if is_valid_price(price) {
            Ok(price)
        } else {
            Err(SessionError::InvalidRecord(RecordError::PriceOutOfRange(price)))
        }
    }

    /// Feed one input into the session.
    ///
    /// `today` becomes the date of any record submitted by this step.
    pub fn advance(self, input: Input<'_>, today: NaiveDate) -> Transition {
        if input == Input::Cancel {
            return Transition::Cancelled;
        }

        match self.state {
            SessionState::AwaitingProduct => match input {
                Input::Text(text) => on_product_text(self, text, today),
                _ => Transition::Continue {
                    next: self,
                    prompt: Prompt::NothingToSkip,
                },
            },
            SessionState::AwaitingPrice => {
                let product = match self.product() {
                    Ok(product) => product.to_string(),
                    Err(e) => return Transition::Aborted(e),
                };
                match input {
                    Input::Text(text) => match parse_price(text) {
                        Ok(price) => Transition::Continue {
                            next: Self::awaiting_notes(product, price),
                            prompt: Prompt::AskNotes,
                        },
                        Err(e) => Transition::Continue {
                            next: self,
                            prompt: Prompt::InvalidPrice(e),
                        },
                    },
                    _ => Transition::Continue {
                        next: self,
                        prompt: Prompt::PriceRequired,
                    },
                }
            }
            SessionState::AwaitingNotes => {
                let (product, price) = match self.product().and_then(|p| Ok((p, self.price()?))) {
                    Ok(pending) => pending,
                    Err(e) => return Transition::Aborted(e),
                };
                let notes = match input {
                    Input::Text(text) if !is_no_notes(text) => text.trim(),
                    _ => "",
                };
                match PurchaseRecord::new(today, product, price, notes) {
                    Ok(record) => Transition::Submit(record),
                    Err(e) => Transition::Aborted(e.into()),
                }
            }
        }
    }
}

/// `/skip` or `/skip@botname` as the first word
fn is_skip_command(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .and_then(|word| word.split('@').next())
        == Some("/skip")
}

fn is_no_notes(text: &str) -> bool {
    let text = text.trim();
    is_skip_command(text) || NO_NOTES_WORDS.iter().any(|word| word.eq_ignore_ascii_case(text))
}

fn on_product_text(session: ConversationSession, text: &str, today: NaiveDate) -> Transition {
    let text = text.trim();
    if text.contains('\n') {
        return Transition::SubmitBatch(parse_batch(text, today));
    }

    match parse_line(text) {
        ParseOutcome::CompleteRecord(item) => Transition::Submit(item.dated(today)),
        ParseOutcome::ProductOnly(product) => Transition::Continue {
            next: ConversationSession::awaiting_price(product.clone()),
            prompt: Prompt::AskPrice { product },
        },
        ParseOutcome::Unparseable(error) => Transition::Continue {
            next: session,
            prompt: Prompt::InvalidLine(error),
        },
    }
}
