pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

/// A text message received from the chat transport
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// User ID of the sender
    pub sender_id: u64,
    /// Whether the sender account is itself a bot
    pub sender_is_bot: bool,
    /// User ID of this bot, used to drop its own messages
    pub bot_id: u64,
    /// Chat the replies are addressed to
    pub chat_id: i64,
    /// The message text
    pub text: String,
}

impl IncomingMessage {
    pub fn is_from_bot(&self) -> bool {
        self.sender_is_bot || self.sender_id == self.bot_id
    }
}

/// One plain-text message to send back to the originating chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub text: String,
}

impl OutboundReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Reply primitive of the chat transport.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;
}
