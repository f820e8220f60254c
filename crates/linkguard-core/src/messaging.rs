//! Messaging port.
//!
//! Telegram is the first implementation; the shape keeps handlers and the
//! price ticker messenger-agnostic so they can be tested without a network.

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    Result,
};

#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Send a plain-text message and return a reference to it.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    /// Send a plain-text message as a reply to another message.
    async fn send_reply(&self, reply_to: MessageRef, text: &str) -> Result<MessageRef>;

    /// Send a Markdown-formatted message.
    async fn send_markdown(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    /// Ban (kick) a member from a group chat.
    async fn ban_user(&self, chat_id: ChatId, user: UserId) -> Result<()>;
}

/// Split a numbered list into chunks that fit under the platform message
/// limit, sending the prefix with the first chunk.
pub fn paginate_list(prefix: &str, items: &[String], max_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut message = format!("{prefix}\n");

    for (i, item) in items.iter().enumerate() {
        let line = format!("{}. {item}\n", i + 1);
        if message.len() + line.len() > max_len && !message.trim().is_empty() {
            out.push(std::mem::take(&mut message));
        }
        message.push_str(&line);
    }

    if !message.trim().is_empty() {
        out.push(message);
    }
    out
}

pub fn message_ref(chat_id: i64, message_id: i32) -> MessageRef {
    MessageRef {
        chat_id: ChatId(chat_id),
        message_id: MessageId(message_id),
    }
}
