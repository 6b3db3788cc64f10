//! Channel trait: the abstraction over message endpoints.
//!
//! A Channel connects RelayClaw to somewhere people talk to it (a terminal,
//! a chat platform bridge, a GUI). It produces inbound messages and accepts
//! outbound text, optionally token by token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::ChannelError;

/// An inbound message. Immutable once created and consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Message identifier
    pub id: String,

    /// The text content
    pub content: String,

    /// Sender identity (platform user ID, or `system_scheduler`)
    pub sender_id: String,

    /// Name of the channel the reply should go to
    pub channel: String,

    pub received_at: DateTime<Utc>,
}

impl ChannelMessage {
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            sender_id: sender_id.into(),
            channel: channel.into(),
            received_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// First 80 characters, for logs and events.
    pub fn preview(&self) -> String {
        self.content.chars().take(80).collect()
    }
}

/// The core Channel trait.
///
/// Outbound operations other than `send_message` default to no-ops so that
/// endpoints only implement what they can render.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name; also the address used to route replies (e.g., "console").
    fn name(&self) -> &str;

    /// Whether the endpoint can render a reply token by token.
    fn is_streaming(&self) -> bool {
        false
    }

    /// Start listening for incoming messages.
    ///
    /// Returns a receiver that yields incoming messages. The implementation
    /// handles polling, webhooks, or terminal input internally.
    async fn start(&self) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError>;

    /// Stop the channel gracefully.
    async fn stop(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Deliver a complete message.
    async fn send_message(&self, content: &str) -> Result<(), ChannelError>;

    /// Deliver one streamed text token.
    async fn send_token(&self, _token: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Deliver one streamed reasoning fragment.
    async fn send_reasoning(&self, _fragment: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Announce a tool call that is about to run.
    async fn send_tool_call(&self, _tool_name: &str, _arguments: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Show a "thinking" indicator (if the endpoint supports it).
    async fn show_thinking(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
