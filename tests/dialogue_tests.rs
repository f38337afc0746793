//! # Dialogue Tests
//!
//! Conversation flows driven through the dialogue manager against an in-memory
//! ledger, plus a ledger that always fails.

use async_trait::async_trait;
use chrono::NaiveDate;
use purchases::bot::dialogue_manager::{drive, recent, Reply, Step};
use purchases::dialogue::{ConversationSession, Input, Prompt, SessionError, SessionState};
use purchases::ledger::{MemoryLedger, RecordSink, SinkError};
use purchases::line_parser::ParseError;
use purchases::purchase::{PriceError, PurchaseRecord};
use rust_decimal::Decimal;
use teloxide::types::ChatId;

/// Ledger that refuses every write
struct FailingSink;

#[async_trait]
impl RecordSink for FailingSink {
    async fn append_record(&self, _record: &PurchaseRecord) -> Result<(), SinkError> {
        Err(SinkError::Connectivity("offline".to_string()))
    }

    async fn append_batch(&self, _records: &[PurchaseRecord]) -> Result<(), SinkError> {
        Err(SinkError::Unauthorized("revoked".to_string()))
    }

    async fn fetch_recent(&self, _limit: usize) -> Result<Vec<PurchaseRecord>, SinkError> {
        Err(SinkError::StoreNotFound("gone".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: ChatId = ChatId(42);

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    async fn send(ledger: &dyn RecordSink, session: ConversationSession, input: Input<'_>) -> Step {
        drive(USER, session, input, ledger, day()).await
    }

    #[tokio::test]
    async fn test_product_price_skip_notes_flow() {
        let ledger = MemoryLedger::new();

        let step = send(&ledger, ConversationSession::default(), Input::Text("كولا")).await;
        assert_eq!(step.session.state, SessionState::AwaitingPrice);
        assert_eq!(
            step.replies,
            vec![Reply::Prompt(Prompt::AskPrice {
                product: "كولا".to_string()
            })]
        );

        let step = send(&ledger, step.session, Input::Text("٢٣")).await;
        assert_eq!(step.session.state, SessionState::AwaitingNotes);
        assert_eq!(step.session.pending_price, Some(Decimal::new(23, 0)));
        assert_eq!(step.replies, vec![Reply::Prompt(Prompt::AskNotes)]);

        let step = send(&ledger, step.session, Input::Text(".")).await;
        assert!(step.session.is_initial());

        let stored = ledger.snapshot().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].product(), "كولا");
        assert_eq!(stored[0].price(), Decimal::new(23, 0));
        assert_eq!(stored[0].notes(), "");
        assert_eq!(stored[0].date(), day());
        assert_eq!(step.replies, vec![Reply::Added(stored[0].clone()), Reply::Welcome]);
    }

    #[tokio::test]
    async fn test_notes_kept_verbatim() {
        let ledger = MemoryLedger::new();
        let session = ConversationSession::awaiting_notes("قهوة", Decimal::new(265, 1));

        let step = send(&ledger, session, Input::Text("  بدون سكر  ")).await;
        assert!(step.session.is_initial());
        assert_eq!(ledger.snapshot().await[0].notes(), "بدون سكر");
    }

    #[tokio::test]
    async fn test_skip_command_in_notes() {
        let ledger = MemoryLedger::new();
        let session = ConversationSession::awaiting_notes("شاي", Decimal::new(15, 0));

        let step = send(&ledger, session, Input::Skip).await;
        assert!(step.session.is_initial());
        assert_eq!(ledger.snapshot().await[0].notes(), "");
    }

    #[tokio::test]
    async fn test_single_line_record() {
        let ledger = MemoryLedger::new();

        let step = send(&ledger, ConversationSession::default(), Input::Text("قهوة ٢٦.٥ بدون سكر")).await;
        assert!(step.session.is_initial());

        let stored = ledger.snapshot().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].notes(), "بدون سكر");
    }

    #[tokio::test]
    async fn test_invalid_price_keeps_state() {
        let ledger = MemoryLedger::new();
        let session = ConversationSession::awaiting_price("كولا");

        let step = send(&ledger, session.clone(), Input::Text("غالي")).await;
        assert_eq!(step.session, session);
        assert_eq!(
            step.replies,
            vec![Reply::Prompt(Prompt::InvalidPrice(PriceError::NotANumber(
                "غالي".to_string()
            )))]
        );

        let step = send(&ledger, session.clone(), Input::Text("0")).await;
        assert_eq!(step.session, session);
        assert!(matches!(
            step.replies[..],
            [Reply::Prompt(Prompt::InvalidPrice(PriceError::OutOfRange(_)))]
        ));
        assert!(ledger.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_line_stays_initial() {
        let ledger = MemoryLedger::new();

        let step = send(&ledger, ConversationSession::default(), Input::Text("23 كولا")).await;
        assert!(step.session.is_initial());
        assert_eq!(
            step.replies,
            vec![Reply::Prompt(Prompt::InvalidLine(ParseError::MissingProduct {
                price: Decimal::new(23, 0)
            }))]
        );
    }

    #[tokio::test]
    async fn test_cancel_from_every_state() {
        let ledger = MemoryLedger::new();
        let sessions = [
            ConversationSession::default(),
            ConversationSession::awaiting_price("كولا"),
            ConversationSession::awaiting_notes("كولا", Decimal::new(23, 0)),
        ];

        for session in sessions {
            let step = send(&ledger, session, Input::Cancel).await;
            assert!(step.session.is_initial());
            assert_eq!(step.replies, vec![Reply::Cancelled]);
        }
        assert!(ledger.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_skip_outside_notes() {
        let ledger = MemoryLedger::new();

        let step = send(&ledger, ConversationSession::default(), Input::Skip).await;
        assert_eq!(step.replies, vec![Reply::Prompt(Prompt::NothingToSkip)]);

        let session = ConversationSession::awaiting_price("كولا");
        let step = send(&ledger, session.clone(), Input::Skip).await;
        assert_eq!(step.session, session);
        assert_eq!(step.replies, vec![Reply::Prompt(Prompt::PriceRequired)]);
    }

    #[tokio::test]
    async fn test_broken_session_is_reset() {
        let ledger = MemoryLedger::new();
        let broken = ConversationSession {
            state: SessionState::AwaitingPrice,
            pending_product: None,
            pending_price: None,
        };

        let step = send(&ledger, broken.clone(), Input::Text("23")).await;
        assert!(step.session.is_initial());
        assert_eq!(step.replies, vec![Reply::SessionLost]);

        assert_eq!(
            broken.advance(Input::Text("23"), day()),
            purchases::dialogue::Transition::Aborted(SessionError::MissingProduct(
                SessionState::AwaitingPrice
            ))
        );
    }

    #[tokio::test]
    async fn test_batch_partial_success() {
        let ledger = MemoryLedger::new();

        let step = send(
            &ledger,
            ConversationSession::default(),
            Input::Text("كولا ٢٣\nشيبس ١٩.٥\nxyz"),
        )
        .await;

        assert!(step.session.is_initial());
        assert_eq!(ledger.snapshot().await.len(), 2);
        match &step.replies[0] {
            Reply::BatchSummary {
                added,
                failed,
                errors,
            } => {
                assert_eq!(*added, 2);
                assert_eq!(*failed, 1);
                assert_eq!(errors[0].line, 3);
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sink_failure_clears_session() {
        let step = send(
            &FailingSink,
            ConversationSession::awaiting_notes("كولا", Decimal::new(23, 0)),
            Input::Text("."),
        )
        .await;

        assert!(step.session.is_initial());
        assert_eq!(step.replies, vec![Reply::SinkFailure]);
    }

    #[tokio::test]
    async fn test_batch_sink_failure_reports_nothing_added() {
        let step = send(&FailingSink, ConversationSession::default(), Input::Text("كولا 23\nxyz")).await;

        assert!(step.session.is_initial());
        assert_eq!(step.replies[0], Reply::SinkFailure);
        assert!(matches!(
            step.replies[1],
            Reply::BatchSummary { added: 0, failed: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_recent_command() {
        let ledger = MemoryLedger::new();
        assert_eq!(recent(USER, "", 5, &ledger).await, Reply::NoRecent);

        for input in ["كولا 23", "شاي 15", "خبز 5"] {
            send(&ledger, ConversationSession::default(), Input::Text(input)).await;
        }

        match recent(USER, "2", 5, &ledger).await {
            Reply::Recent(records) => {
                let products: Vec<&str> = records.iter().map(|r| r.product()).collect();
                assert_eq!(products, vec!["شاي", "خبز"]);
            }
            other => panic!("unexpected reply {other:?}"),
        }

        assert_eq!(recent(USER, "abc", 5, &ledger).await, Reply::RecentUsage);
        assert_eq!(recent(USER, "", 5, &FailingSink).await, Reply::RecentFailure);
    }

    #[tokio::test]
    async fn test_duplicate_records_are_stored_twice() {
        let ledger = MemoryLedger::new();
        for _ in 0..2 {
            send(&ledger, ConversationSession::default(), Input::Text("كولا 23")).await;
        }
        let stored = ledger.snapshot().await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], stored[1]);
    }
}
