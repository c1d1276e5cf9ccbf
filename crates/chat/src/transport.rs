use async_trait::async_trait;
use thiserror::Error;

use taskbot_core::domain::UserId;

use crate::markup::Markup;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("chat transport send failed: {0}")]
    Send(String),
    #[error("chat transport unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Private chats share the user's id.
    pub chat_id: UserId,
    pub text: String,
    pub markup: Option<Markup>,
}

impl OutboundMessage {
    pub fn text(chat_id: UserId, text: impl Into<String>) -> Self {
        Self { chat_id, text: text.into(), markup: None }
    }

    pub fn with_markup(chat_id: UserId, text: impl Into<String>, markup: Markup) -> Self {
        Self { chat_id, text: text.into(), markup: Some(markup) }
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError>;
}

/// Discards every message. Used by tooling that builds handlers without a
/// live bot connection.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl ChatTransport for NoopTransport {
    async fn send(&self, _message: OutboundMessage) -> Result<(), TransportError> {
        Ok(())
    }
}
