use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, UpdateKind};
use tracing::{info, warn};

use crate::platform::{IncomingMessage, ReplySender};

/// Telegram rejects messages over 4096 characters.
const MAX_MESSAGE_LEN: usize = 4000;

/// Split `text` into chunks of at most `max_chars` characters, breaking
/// after the last newline (or else space) inside each window.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let window_end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .map(|pos| pos + 1)
            .unwrap_or(window_end);

        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Map a webhook update to an [`IncomingMessage`]. Anything other than a
/// new text message with a known sender yields `None`.
pub fn incoming_from_update(update: &Update, bot_id: u64) -> Option<IncomingMessage> {
    let msg = match &update.kind {
        UpdateKind::Message(msg) => msg,
        _ => return None,
    };
    let user = msg.from.as_ref()?;
    let text = msg.text()?;

    Some(IncomingMessage {
        sender_id: user.id.0,
        sender_is_bot: user.is_bot,
        bot_id,
        chat_id: msg.chat.id.0,
        text: text.to_string(),
    })
}

/// The numeric bot id is the part of the token before the colon.
pub fn bot_id_from_token(token: &str) -> Option<u64> {
    token.split_once(':')?.0.parse().ok()
}

/// Ask Telegram who we are, falling back to the id embedded in the token.
pub async fn resolve_bot_id(bot: &Bot, token: &str) -> Result<u64> {
    match bot.get_me().await {
        Ok(me) => {
            info!("Running as @{} ({})", me.username(), me.user.id);
            Ok(me.user.id.0)
        }
        Err(e) => {
            warn!("getMe failed, using bot id from token: {}", e);
            bot_id_from_token(token).context("Bot token does not start with a numeric bot id")
        }
    }
}

/// Point Telegram at our webhook URL.
pub async fn register_webhook(bot: &Bot, url: &str, secret: Option<&str>) -> Result<()> {
    let url = reqwest::Url::parse(url).with_context(|| format!("Invalid webhook URL: {}", url))?;
    let mut request = bot.set_webhook(url.clone());
    if let Some(secret) = secret {
        request = request.secret_token(secret.to_string());
    }
    request.await.context("setWebhook failed")?;
    info!("Webhook registered at {}", url);
    Ok(())
}

/// Sends replies through the Bot API.
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ReplySender for TelegramSender {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            self.bot
                .send_message(ChatId(chat_id), chunk)
                .await
                .with_context(|| format!("Failed to send message to chat {}", chat_id))?;
        }
        Ok(())
    }
}
