//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use chrono::Local;
use teloxide::prelude::*;
use tracing::debug;

// Import localization
use crate::localization::t_lang;

// Import dialogue types
use crate::config::BotSettings;
use crate::dialogue::{Input, PurchaseDialogue};
use crate::ledger::SharedSink;

use super::commands::Command;
use super::dialogue_manager::{drive, recent, Reply};
use super::ui_builder::render_reply;

fn language_code(msg: &Message) -> Option<&str> {
    msg.from
        .as_ref()
        .and_then(|user| user.language_code.as_ref())
        .map(|s| s.as_str())
}

async fn send_replies(
    bot: &Bot,
    chat_id: ChatId,
    replies: &[Reply],
    language_code: Option<&str>,
) -> Result<()> {
    for reply in replies {
        bot.send_message(chat_id, render_reply(reply, language_code))
            .await?;
    }
    Ok(())
}

/// Feed `input` to the user's session, store the new session, then reply.
async fn handle_input(
    bot: &Bot,
    msg: &Message,
    dialogue: PurchaseDialogue,
    sink: &SharedSink,
    input: Input<'_>,
) -> Result<()> {
    let session = dialogue.get().await?.unwrap_or_default();
    let step = drive(
        msg.chat.id,
        session,
        input,
        sink.as_ref(),
        Local::now().date_naive(),
    )
    .await;

    if step.session.is_initial() {
        dialogue.exit().await?;
    } else {
        dialogue.update(step.session).await?;
    }

    send_replies(bot, msg.chat.id, &step.replies, language_code(msg)).await
}

async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    debug!(user_id = %msg.chat.id, "Received unsupported message type from user");
    bot.send_message(msg.chat.id, t_lang("unsupported-message", language_code(msg)))
        .await?;
    Ok(())
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: PurchaseDialogue,
    sink: SharedSink,
) -> Result<()> {
    match msg.text() {
        Some(text) => {
            debug!(user_id = %msg.chat.id, message_length = text.len(), "Received text message from user");
            handle_input(&bot, &msg, dialogue, &sink, Input::Text(text)).await
        }
        None => handle_unsupported_message(&bot, &msg).await,
    }
}

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: PurchaseDialogue,
    sink: SharedSink,
    settings: BotSettings,
) -> Result<()> {
    debug!(user_id = %msg.chat.id, command = ?cmd, "Received command from user");
    let language_code = language_code(&msg);

    match cmd {
        Command::Start => {
            dialogue.exit().await?;
            send_replies(&bot, msg.chat.id, &[Reply::Welcome], language_code).await
        }
        Command::Help => send_replies(&bot, msg.chat.id, &[Reply::Help], language_code).await,
        Command::Cancel => handle_input(&bot, &msg, dialogue, &sink, Input::Cancel).await,
        Command::Skip => handle_input(&bot, &msg, dialogue, &sink, Input::Skip).await,
        Command::Recent(argument) => {
            let reply = recent(
                msg.chat.id,
                &argument,
                settings.recent_default_limit,
                sink.as_ref(),
            )
            .await;
            send_replies(&bot, msg.chat.id, &[reply], language_code).await
        }
    }
}
