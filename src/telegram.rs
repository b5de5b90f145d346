//! Telegram front end
//!
//! Long-polling dispatcher with two routes, both behind the [`AccessGate`]:
//! - `/start` replies with a greeting
//! - any other text (not a command) is answered by the [`AuraEngine`]
//!
//! Updates from users outside the allow-list get no reply at all.

use std::sync::Arc;

use anyhow::Result;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{ChatAction, Update},
    utils::command::BotCommands,
};
use tracing::{debug, error, info, warn};

use crate::auth::AccessGate;
use crate::config::Config;
use crate::engine::AuraEngine;

/// Telegram rejects messages longer than this many UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "say hello")]
    Start,
}

/// What gated handlers get besides the message.
#[derive(Clone)]
pub struct BotContext {
    pub bot: Bot,
    pub engine: AuraEngine,
}

struct BotData {
    gate: AccessGate,
    engine: AuraEngine,
}

impl BotData {
    fn context(&self, bot: Bot) -> BotContext {
        BotContext {
            bot,
            engine: self.engine.clone(),
        }
    }
}

/// Run Telegram bot with explicit Dispatcher for reliable polling
pub async fn run_telegram_bot(config: &Config, engine: AuraEngine) -> Result<()> {
    info!("===========================================");
    info!("  Aura Telegram - Starting...");
    info!("===========================================");
    info!("Allowed users: {:?}", config.allowed_user_ids);

    let bot = Bot::new(config.telegram_token.clone());

    info!("Verifying bot token...");
    match bot.get_me().await {
        Ok(me) => {
            info!(
                "Bot authenticated: @{} (ID: {})",
                me.username.as_deref().unwrap_or("unknown"),
                me.id
            );
        }
        Err(e) => {
            error!("Failed to authenticate bot: {}", e);
            anyhow::bail!("Bot authentication failed: {}", e);
        }
    }

    // Polling needs the webhook gone; anything queued while offline is dropped.
    if let Err(e) = bot.delete_webhook().drop_pending_updates(true).await {
        warn!("Failed to delete webhook: {} (continuing anyway)", e);
    }

    let data = Arc::new(BotData {
        gate: AccessGate::new(config.allowed_user_ids.clone()),
        engine,
    });

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(
            dptree::filter(|msg: Message| is_question(&msg)).endpoint(text_handler),
        );

    info!("Bot started and polling for updates...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![data])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in message handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped.");
    Ok(())
}

/// Plain text that is not a command.
pub(crate) fn is_question(msg: &Message) -> bool {
    msg.text().is_some_and(|t| !t.starts_with('/'))
}

async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    data: Arc<BotData>,
) -> ResponseResult<()> {
    let ctx = data.context(bot);
    let outcome = match cmd {
        Command::Start => data.gate.wrap(start).call(msg, ctx).await,
    };
    outcome.unwrap_or(Ok(()))
}

async fn text_handler(bot: Bot, msg: Message, data: Arc<BotData>) -> ResponseResult<()> {
    let ctx = data.context(bot);
    data.gate
        .wrap(answer_question)
        .call(msg, ctx)
        .await
        .unwrap_or(Ok(()))
}

pub fn greeting(first_name: Option<&str>) -> String {
    format!(
        "Hello, {}! I am the Aura expert for our Viessmann boiler. Ask me a question about it.",
        first_name.unwrap_or("there")
    )
}

async fn start(msg: Message, ctx: BotContext) -> ResponseResult<()> {
    let name = msg.from.as_ref().map(|u| u.first_name.as_str());
    ctx.bot.send_message(msg.chat.id, greeting(name)).await?;
    Ok(())
}

async fn answer_question(msg: Message, ctx: BotContext) -> ResponseResult<()> {
    let Some(question) = msg.text() else {
        return Ok(());
    };
    let user_name = msg
        .from
        .as_ref()
        .map(|u| u.first_name.as_str())
        .unwrap_or("unknown");
    info!("Received question from user '{}': {}", user_name, question);

    if let Err(e) = ctx.bot.send_chat_action(msg.chat.id, ChatAction::Typing).await {
        warn!("Failed to send typing action: {}", e);
    }

    let answer = ctx.engine.get_response(question).await;
    send_long_message(&ctx.bot, msg.chat.id, &answer).await
}

/// Send `text`, split into as many messages as Telegram needs.
async fn send_long_message(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<()> {
    for chunk in split_message(text, MAX_MESSAGE_LEN) {
        bot.send_message(chat_id, chunk).await?;
    }
    Ok(())
}

/// Split on char boundaries into pieces of at most `max_len` UTF-16 code
/// units (the unit Telegram counts in), preferring to break after a newline.
/// Concatenating the pieces gives back `text`.
pub fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let Some(hard_limit) = utf16_boundary(remaining, max_len) else {
            chunks.push(remaining);
            break;
        };

        let split_at = remaining[..hard_limit]
            .rfind('\n')
            .map(|idx| idx + 1)
            .unwrap_or(hard_limit);

        let (chunk, rest) = remaining.split_at(split_at);
        chunks.push(chunk);
        remaining = rest;
    }

    chunks
}

/// Byte index of the first char that would push `text` past `max_len`
/// UTF-16 units, or `None` if all of it fits. Always at least one char in.
fn utf16_boundary(text: &str, max_len: usize) -> Option<usize> {
    let mut units = 0;
    for (idx, c) in text.char_indices() {
        units += c.len_utf16();
        if units > max_len {
            return Some(if idx == 0 { c.len_utf8() } else { idx });
        }
    }
    None
}
