use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, User};
use teloxide::utils::command::BotCommands;

use crate::bot::messages;
use crate::data::fetcher::{ApiClient, Market, NewUser};
use crate::data::parser::{CryptoItem, PriceItem};
use crate::db::UserRepository;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "دستورات ربات ArzWatch:")]
pub enum Command {
    #[command(description = "شروع")]
    Start,
    #[command(description = "نمایش راهنما")]
    Help,
    #[command(description = "نمایش اطلاعات مصرفی")]
    Usage,
    #[command(description = "قیمت طلا")]
    Gold,
    #[command(description = "قیمت سکه")]
    Coin,
    #[command(description = "قیمت ارز دیجیتال")]
    Crypto,
    #[command(description = "قیمت ارزها")]
    Currency,
}

/// Entry point for every recognised command. Any failure inside a command is
/// logged and answered with the generic error message.
pub async fn handle(
    bot: Bot,
    msg: Message,
    cmd: Command,
    api: Arc<ApiClient>,
    users: Arc<dyn UserRepository>,
) -> HandlerResult {
    if let Err(e) = dispatch(&bot, &msg, &cmd, &api, users.as_ref()).await {
        tracing::error!(chat_id = msg.chat.id.0, command = ?cmd, error = %e, "Command failed");
        reply(&bot, &msg, messages::error()).await?;
    }
    Ok(())
}

async fn dispatch(
    bot: &Bot,
    msg: &Message,
    cmd: &Command,
    api: &ApiClient,
    users: &dyn UserRepository,
) -> HandlerResult {
    let user_id = sender_id(msg);
    match cmd {
        Command::Start => cmd_start(bot, msg, api, users).await?,
        Command::Help => reply(bot, msg, &messages::help()).await?,
        Command::Usage => {
            let text = usage_reply(api, user_id, &display_name(msg.from.as_ref())).await;
            reply(bot, msg, &text).await?;
        }
        Command::Gold => reply(bot, msg, &price_reply(api, Market::Gold, user_id).await).await?,
        Command::Coin => reply(bot, msg, &price_reply(api, Market::Coin, user_id).await).await?,
        Command::Crypto => reply(bot, msg, &price_reply(api, Market::Crypto, user_id).await).await?,
        Command::Currency => {
            reply(bot, msg, &price_reply(api, Market::Currency, user_id).await).await?
        }
    }
    Ok(())
}

async fn reply(bot: &Bot, msg: &Message, text: &str) -> HandlerResult {
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn cmd_start(
    bot: &Bot,
    msg: &Message,
    api: &ApiClient,
    users: &dyn UserRepository,
) -> HandlerResult {
    let user_id = sender_id(msg);
    let from = msg.from.as_ref();
    let username = from.and_then(|u| u.username.as_deref()).unwrap_or("");
    let first_name = from.map(|u| u.first_name.as_str()).unwrap_or("");
    let last_name = from.and_then(|u| u.last_name.as_deref()).unwrap_or("");

    let name = display_name(from);
    let welcome = start_reply(users, user_id, username, first_name, last_name, &name)?;
    reply(bot, msg, &welcome).await?;

    let profile = NewUser {
        user_id,
        username,
        first_name,
        last_name,
        is_bot: from.is_some_and(|u| u.is_bot),
        phone_number: "",
        language_code: from.and_then(|u| u.language_code.as_deref()).unwrap_or(""),
        last_seen: msg.date.to_rfc3339(),
    };
    register_profile(api, &profile).await;
    Ok(())
}

/// Records the sender in the local store and renders the welcome with the
/// updated user count.
fn start_reply(
    users: &dyn UserRepository,
    user_id: i64,
    username: &str,
    first_name: &str,
    last_name: &str,
    name: &str,
) -> anyhow::Result<String> {
    let is_new = users.get_user(user_id)?.is_none();
    users.upsert_user(user_id, username, first_name, last_name)?;
    let total_users = users.count_users()?;
    if is_new {
        tracing::info!(user_id, username, first_name, last_name, total_users, "New user");
    } else {
        tracing::info!(user_id, username, "Returning user");
    }
    Ok(messages::welcome(name, total_users))
}

/// Sends the profile to the backend. Runs after the welcome is sent, so a
/// failure is logged and reported as `false`, never raised.
async fn register_profile(api: &ApiClient, profile: &NewUser<'_>) -> bool {
    let user_id = profile.user_id;
    match api.register_user(profile).await {
        Ok(status) if status == reqwest::StatusCode::CREATED => {
            tracing::info!(user_id, "Saved user info");
            true
        }
        Ok(status) => {
            tracing::warn!(user_id, status = status.as_u16(), "User info not saved");
            false
        }
        Err(e) => {
            tracing::error!(user_id, error = %e, "Exception during user info save");
            false
        }
    }
}

/// Fetches `market` and renders its board, or the generic error message.
/// Never returns a partially rendered board.
pub async fn price_reply(api: &ApiClient, market: Market, user_id: i64) -> String {
    let rendered = match market {
        Market::Gold => api
            .fetch_market::<PriceItem>(market, user_id)
            .await
            .map(|p| messages::gold(&p.items, &p.retrieved_at)),
        Market::Coin => api
            .fetch_market::<PriceItem>(market, user_id)
            .await
            .map(|p| messages::coin(&p.items, &p.retrieved_at)),
        Market::Currency => api
            .fetch_market::<PriceItem>(market, user_id)
            .await
            .map(|p| messages::currency(&p.items, &p.retrieved_at)),
        Market::Crypto => api
            .fetch_market::<CryptoItem>(market, user_id)
            .await
            .map(|p| messages::crypto(&p.items, &p.retrieved_at)),
    };
    rendered.unwrap_or_else(|e| {
        let endpoint = market.endpoint();
        tracing::error!(endpoint, user_id, error = %e, "Error fetching market data");
        messages::error().to_string()
    })
}

pub async fn usage_reply(api: &ApiClient, user_id: i64, name: &str) -> String {
    match api.usage(user_id).await {
        Ok(usage) => {
            tracing::info!(user_id, "Retrieved user info");
            messages::usage(name, &usage, chrono::Utc::now())
        }
        Err(e) => {
            tracing::error!(user_id, error = %e, "Error retrieving user info");
            messages::error().to_string()
        }
    }
}

/// Telegram user id of the sender, falling back to the chat id for
/// anonymous senders.
fn sender_id(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .map(|u| u.id.0 as i64)
        .unwrap_or(msg.chat.id.0)
}

fn display_name(user: Option<&User>) -> String {
    user.map(|u| greeting_name(&u.first_name, u.username.as_deref()))
        .unwrap_or_default()
}

fn greeting_name(first_name: &str, username: Option<&str>) -> String {
    if first_name.is_empty() {
        username.unwrap_or_default().to_string()
    } else {
        first_name.to_string()
    }
}
