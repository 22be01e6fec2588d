//! Channel trait and the message types that cross it.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::dialog::{InboundEvent, UserId};
use crate::error::ChannelError;

/// One event received from a channel, already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Channel that produced the message ("telegram", "cli").
    pub channel: String,
    pub user_id: UserId,
    pub event: InboundEvent,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: UserId, event: InboundEvent) -> Self {
        Self {
            channel: channel.to_string(),
            user_id,
            event,
        }
    }
}

/// Keyboard change to attach to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKeyboard {
    /// Leave whatever keyboard the user currently has.
    Unchanged,
    /// One-time keyboard with a single button that shares the user's contact.
    RequestContact { label: String },
    /// Remove the custom keyboard.
    Remove,
}

/// A single outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingReply {
    pub text: String,
    pub keyboard: ReplyKeyboard,
}

impl OutgoingReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: ReplyKeyboard::Unchanged,
        }
    }

    pub fn with_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.keyboard = keyboard;
        self
    }
}

/// Stream of incoming messages from a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A message transport: pure I/O, no dialog logic.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name (e.g. "telegram", "cli").
    fn name(&self) -> &str;

    /// Start receiving. The stream ends when the channel stops.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Deliver `replies` to `user_id`, in order.
    async fn send(&self, user_id: UserId, replies: &[OutgoingReply]) -> Result<(), ChannelError>;

    /// Check the channel can reach its backend.
    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
