//! Dialogue Manager module: runs conversation transitions against the ledger
//!
//! [`drive`] is everything that happens for one user message short of talking
//! to Telegram: the state transition, the ledger write it implies and the list
//! of replies to send. The caller persists [`Step::session`] and renders the
//! replies.

use chrono::NaiveDate;
use teloxide::types::ChatId;
use tracing::{error, info, warn};

use crate::batch::LineError;
use crate::config::MAX_RECENT_LIMIT;
use crate::dialogue::{ConversationSession, Input, Prompt, Transition};
use crate::ledger::RecordSink;
use crate::numerals::normalize_digits;
use crate::purchase::PurchaseRecord;

/// One message to send back to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Welcome,
    Help,
    Prompt(Prompt),
    Added(PurchaseRecord),
    BatchSummary {
        added: usize,
        failed: usize,
        errors: Vec<LineError>,
    },
    Cancelled,
    /// The ledger refused or could not be reached
    SinkFailure,
    SessionLost,
    Recent(Vec<PurchaseRecord>),
    NoRecent,
    RecentFailure,
    RecentUsage,
}

/// Result of handling one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Session to store; the initial session means the flow has ended
    pub session: ConversationSession,
    pub replies: Vec<Reply>,
}

impl Step {
    fn finished(replies: Vec<Reply>) -> Self {
        Self {
            session: ConversationSession::default(),
            replies,
        }
    }
}

/// Advance `session` with `input` and perform any ledger write it calls for.
pub async fn drive(
    chat_id: ChatId,
    session: ConversationSession,
    input: Input<'_>,
    sink: &dyn RecordSink,
    today: NaiveDate,
) -> Step {
    match session.advance(input, today) {
        Transition::Continue { next, prompt } => Step {
            session: next,
            replies: vec![Reply::Prompt(prompt)],
        },
        Transition::Submit(record) => match sink.append_record(&record).await {
            Ok(()) => {
                info!(user_id = %chat_id, product = %record.product(), price = %record.price(), "Purchase recorded");
                Step::finished(vec![Reply::Added(record), Reply::Welcome])
            }
            Err(e) => {
                error!(user_id = %chat_id, error = %e, "Failed to record purchase");
                Step::finished(vec![Reply::SinkFailure])
            }
        },
        Transition::SubmitBatch(outcome) => {
            let parsed = outcome.success_count();
            let rejected = outcome.error_count();

            let added = if parsed == 0 {
                0
            } else {
                match sink.append_batch(&outcome.records).await {
                    Ok(()) => parsed,
                    Err(e) => {
                        error!(user_id = %chat_id, error = %e, records = parsed, "Failed to record purchase batch");
                        return Step::finished(vec![
                            Reply::SinkFailure,
                            Reply::BatchSummary {
                                added: 0,
                                failed: parsed + rejected,
                                errors: outcome.errors,
                            },
                        ]);
                    }
                }
            };

            info!(user_id = %chat_id, added, rejected, "Purchase batch processed");
            Step::finished(vec![
                Reply::BatchSummary {
                    added,
                    failed: rejected,
                    errors: outcome.errors,
                },
                Reply::Welcome,
            ])
        }
        Transition::Cancelled => {
            info!(user_id = %chat_id, "Entry cancelled");
            Step::finished(vec![Reply::Cancelled])
        }
        Transition::Aborted(e) => {
            warn!(user_id = %chat_id, error = %e, "Conversation state was inconsistent, resetting");
            Step::finished(vec![Reply::SessionLost])
        }
    }
}

/// Parse the `/recent` argument: empty means `default_limit`, larger values are capped.
pub fn recent_limit(argument: &str, default_limit: usize) -> Option<usize> {
    let argument = normalize_digits(argument.trim());
    if argument.is_empty() {
        return Some(default_limit.clamp(1, MAX_RECENT_LIMIT));
    }
    match argument.parse::<usize>() {
        Ok(0) | Err(_) => None,
        Ok(limit) => Some(limit.min(MAX_RECENT_LIMIT)),
    }
}

/// Handle `/recent [n]`
pub async fn recent(
    chat_id: ChatId,
    argument: &str,
    default_limit: usize,
    sink: &dyn RecordSink,
) -> Reply {
    let Some(limit) = recent_limit(argument, default_limit) else {
        return Reply::RecentUsage;
    };

    match sink.fetch_recent(limit).await {
        Ok(records) if records.is_empty() => Reply::NoRecent,
        Ok(records) => Reply::Recent(records),
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Failed to read recent purchases");
            Reply::RecentFailure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_limit() {
        assert_eq!(recent_limit("", 5), Some(5));
        assert_eq!(recent_limit(" 12 ", 5), Some(12));
        assert_eq!(recent_limit("١٠", 5), Some(10));
        assert_eq!(recent_limit("500", 5), Some(MAX_RECENT_LIMIT));
        assert_eq!(recent_limit("0", 5), None);
        assert_eq!(recent_limit("many", 5), None);
    }
}
