//! Telegram channel: Bot API long polling in, `sendMessage` out.
//!
//! Telegram cannot render a reply token by token, so this channel is not
//! streaming and only ever receives whole replies. Replies go to the chat
//! that most recently wrote to the bot, or to the configured `chat_id`
//! before anyone has.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relayclaw_config::TelegramConfig;
use relayclaw_core::channel::{Channel, ChannelMessage};
use relayclaw_core::error::ChannelError;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CHANNEL_NAME: &str = "telegram";

/// Longest text a single `sendMessage` accepts, in characters.
const MAX_MESSAGE_CHARS: usize = 4096;

const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram Bot API channel.
#[derive(Debug)]
pub struct TelegramChannel {
    client: reqwest::Client,
    /// `<api_base>/bot<token>`
    bot_url: String,
    allowed_users: Arc<Vec<String>>,
    poll_timeout: Duration,
    reply_chat: Arc<Mutex<Option<i64>>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl TelegramChannel {
    pub fn new(bot_token: &str, api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_url: format!("{}/bot{}", api_base.trim_end_matches('/'), bot_token),
            allowed_users: Arc::new(Vec::new()),
            poll_timeout: Duration::from_secs(30),
            reply_chat: Arc::new(Mutex::new(None)),
            poller: Mutex::new(None),
        }
    }

    /// Build from the `[channels.telegram]` section. A bot token is required.
    pub fn from_config(config: &TelegramConfig) -> Result<Self, ChannelError> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ChannelError::NotConfigured(
                    "telegram needs channels.telegram.bot_token or TELEGRAM_BOT_TOKEN".into(),
                )
            })?;

        let mut channel = Self::new(token, &config.api_base)
            .with_allowed_users(config.allowed_users.clone())
            .with_poll_timeout(config.poll_timeout());
        if let Some(chat_id) = config.chat_id {
            channel = channel.with_chat_id(chat_id);
        }
        Ok(channel)
    }

    /// User IDs or usernames allowed in. Empty denies everyone, `*` allows all.
    pub fn with_allowed_users(mut self, users: Vec<String>) -> Self {
        self.allowed_users = Arc::new(users);
        self
    }

    pub fn with_chat_id(self, chat_id: i64) -> Self {
        *lock(&self.reply_chat) = Some(chat_id);
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Chat that the next reply goes to.
    pub fn reply_chat(&self) -> Option<i64> {
        *lock(&self.reply_chat)
    }

    async fn send_chunk(&self, chat_id: i64, text: &str) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(format!("{}/sendMessage", self.bot_url))
            .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .map_err(|e| delivery_failed(e.to_string()))?;

        let status = response.status();
        let body: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| delivery_failed(format!("unreadable response ({status}): {e}")))?;
        if !body.ok {
            return Err(delivery_failed(
                body.description.unwrap_or_else(|| status.to_string()),
            ));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn delivery_failed(reason: String) -> ChannelError {
    ChannelError::DeliveryFailed {
        channel: CHANNEL_NAME.into(),
        reason,
    }
}

fn is_allowed(allowed: &[String], user: Option<&User>) -> bool {
    if allowed.iter().any(|u| u == "*") {
        return true;
    }
    let Some(user) = user else {
        return false;
    };
    let id = user.id.to_string();
    allowed.iter().any(|entry| {
        let entry = entry.trim_start_matches('@');
        entry == id || user.username.as_deref() == Some(entry)
    })
}

/// Split `text` into pieces Telegram will accept, on character boundaries.
fn chunks(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(MAX_MESSAGE_CHARS)
        .map(|c| c.iter().collect())
        .collect()
}

/// State owned by the polling task.
struct Poller {
    client: reqwest::Client,
    bot_url: String,
    allowed_users: Arc<Vec<String>>,
    poll_timeout: Duration,
    reply_chat: Arc<Mutex<Option<i64>>>,
    tx: mpsc::Sender<Result<ChannelMessage, ChannelError>>,
}

impl Poller {
    async fn run(self) {
        let mut offset = 0i64;
        loop {
            let updates = match self.get_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "Telegram poll failed; retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(message) = update.message else {
                    continue;
                };
                let Some(text) = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
                else {
                    continue;
                };
                if !is_allowed(&self.allowed_users, message.from.as_ref()) {
                    debug!(chat_id = message.chat.id, "Ignoring message from user not in allowlist");
                    continue;
                }

                *lock(&self.reply_chat) = Some(message.chat.id);
                let sender = message
                    .from
                    .as_ref()
                    .map(|u| u.id.to_string())
                    .unwrap_or_default();
                let inbound = ChannelMessage::new(CHANNEL_NAME, sender, text);
                if self.tx.send(Ok(inbound)).await.is_err() {
                    return; // multiplexer gone
                }
            }
        }
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, String> {
        let response = self
            .client
            .get(format!("{}/getUpdates", self.bot_url))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.poll_timeout.as_secs().to_string()),
            ])
            .timeout(self.poll_timeout + Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let body: ApiResponse<Vec<Update>> = response
            .json()
            .await
            .map_err(|e| format!("unreadable response ({status}): {e}"))?;
        match (body.ok, body.result) {
            (true, Some(updates)) => Ok(updates),
            _ => Err(body.description.unwrap_or_else(|| status.to_string())),
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let mut poller = lock(&self.poller);
        if poller.is_some() {
            return Err(ChannelError::ConnectionLost("telegram already started".into()));
        }

        let (tx, rx) = mpsc::channel(64);
        let task = Poller {
            client: self.client.clone(),
            bot_url: self.bot_url.clone(),
            allowed_users: self.allowed_users.clone(),
            poll_timeout: self.poll_timeout,
            reply_chat: self.reply_chat.clone(),
            tx,
        };
        *poller = Some(tokio::spawn(task.run()));
        info!(allowed_users = self.allowed_users.len(), "Telegram channel polling");
        Ok(rx)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        if let Some(poller) = lock(&self.poller).take() {
            poller.abort();
            info!("Telegram channel stopped");
        }
        Ok(())
    }

    async fn send_message(&self, content: &str) -> Result<(), ChannelError> {
        let chat_id = self
            .reply_chat()
            .ok_or_else(|| delivery_failed("no chat to reply to yet".into()))?;
        for chunk in chunks(content) {
            self.send_chunk(chat_id, &chunk).await?;
        }
        Ok(())
    }
}

// --- Bot API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    username: Option<String>,
}
