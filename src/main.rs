mod bot;
mod calendar;
mod config;
mod data;
mod db;

use std::sync::Arc;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::bot::commands::Command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cfg = config::Config::from_env()?;
    let _log_guard = init_tracing(&cfg);

    let users = db::open(&cfg.users_db_path)?;
    let api = Arc::new(data::fetcher::ApiClient::new(
        &cfg.base_api_url,
        &cfg.api_key,
        cfg.http_timeout,
    )?);
    let bot = Bot::new(&cfg.bot_token);

    tracing::info!(
        base_api_url = %cfg.base_api_url,
        timeout_secs = cfg.http_timeout.as_secs(),
        "ArzWatch bot is starting polling..."
    );

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        tracing::warn!(error = %e, "Could not register command list");
    }

    let handler = Update::filter_message()
        .filter_command::<Command>()
        .endpoint(bot::commands::handle);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![api, users])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Unhandled error occurred",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Console logging, plus a daily-rolling file when `LOG_DIR` is set. The
/// returned guard flushes the file writer on drop.
fn init_tracing(cfg: &config::Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "arzwatch_bot=info".into());

    let (file_layer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "arzwatch_bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}
