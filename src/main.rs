use anyhow::{Context, Result};
use teloxide::prelude::*;
use tracing::info;

use purchases::bot;
use purchases::config::BotConfig;
use purchases::instance_lock::InstanceLock;
use purchases::ledger::build_sink;
use purchases::localization::init_localization;
use purchases::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env().context("Invalid configuration")?;

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_tracing(&config.log)?;

    info!("Starting Purchases Telegram Bot");

    let _instance_lock = InstanceLock::acquire(&config.pid_file)?;

    init_localization(&config.settings.language)?;

    let sink = build_sink(&config.ledger).context("Failed to set up the ledger")?;

    let bot = Bot::new(config.telegram_token);

    bot::run(bot, sink, config.settings).await
}
