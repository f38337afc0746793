//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules for better organization:
//! - `commands`: Control commands available in every state
//! - `message_handler`: Handles incoming text and unsupported messages
//! - `ui_builder`: Formats reply messages
//! - `dialogue_manager`: Runs dialogue transitions against the ledger

pub mod commands;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

use anyhow::Result;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::config::BotSettings;
use crate::dialogue::ConversationSession;
use crate::ledger::SharedSink;

pub use commands::Command;
pub use dialogue_manager::{drive, Reply, Step};
pub use message_handler::{command_handler, message_handler};
pub use ui_builder::render_reply;

/// Update routing: commands first, everything else goes to the conversation.
///
/// The session store is keyed by chat, and the dispatcher processes updates of
/// one chat strictly in order, so a session is never touched by two handlers
/// at once.
pub fn schema() -> UpdateHandler<anyhow::Error> {
    Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<ConversationSession>, ConversationSession>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(dptree::endpoint(message_handler))
}

/// Register the command menu and poll for updates until Ctrl-C.
pub async fn run(bot: Bot, sink: SharedSink, settings: BotSettings) -> Result<()> {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    info!("Bot initialized, starting dispatcher");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![
            InMemStorage::<ConversationSession>::new(),
            sink,
            settings
        ])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Dispatcher stopped");
    Ok(())
}
