//! Channel multiplexer: fan-in of every endpoint into one inbound queue,
//! fan-out of replies addressed by channel name.
//!
//! The inbound queue is bounded. When it is full, producers (channel
//! forwarders and injectors) wait; nothing is dropped.
//!
//! Injectors hold only a weak handle on the queue. Once
//! [`ChannelMultiplexer::close_inbound`] has been called, the queue closes as
//! soon as every started channel's input has ended.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relayclaw_core::channel::{Channel, ChannelMessage};
use relayclaw_core::error::ChannelError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A handle for enqueueing messages that did not come from an endpoint.
/// It does not keep the queue open.
#[derive(Clone)]
pub struct MessageInjector {
    tx: mpsc::WeakSender<ChannelMessage>,
}

impl MessageInjector {
    /// Enqueue a message, waiting for room if the queue is full.
    pub async fn inject(&self, message: ChannelMessage) -> Result<(), ChannelError> {
        let tx = self.tx.upgrade().ok_or(ChannelError::QueueClosed)?;
        tx.send(message).await.map_err(|_| ChannelError::QueueClosed)
    }
}

/// Holds the registered channels and the merged inbound queue.
pub struct ChannelMultiplexer {
    channels: Vec<Arc<dyn Channel>>,
    inbound_tx: Mutex<Option<mpsc::Sender<ChannelMessage>>>,
    inbound_weak: mpsc::WeakSender<ChannelMessage>,
    inbound_rx: Mutex<Option<mpsc::Receiver<ChannelMessage>>>,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
    delivery_timeout: Duration,
}

impl ChannelMultiplexer {
    /// Create a multiplexer whose inbound queue holds `capacity` messages.
    pub fn new(capacity: usize, delivery_timeout: Duration) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity.max(1));
        Self {
            channels: Vec::new(),
            inbound_weak: inbound_tx.downgrade(),
            inbound_tx: Mutex::new(Some(inbound_tx)),
            inbound_rx: Mutex::new(Some(inbound_rx)),
            forwarders: Mutex::new(Vec::new()),
            delivery_timeout,
        }
    }

    /// Register a channel. Outbound operations go to the first registrant
    /// with a matching name.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        if self.get(&name).is_some() {
            warn!(channel = %name, "Channel name already registered; later registrant is unreachable");
        }
        info!(channel = %name, streaming = channel.is_streaming(), "Registered channel");
        self.channels.push(channel);
    }

    /// Get a channel by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Channel>> {
        self.channels.iter().find(|c| c.name() == name)
    }

    /// Registered channel names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Start every channel and forward its production into the merged queue.
    pub async fn start(&self) -> Result<(), ChannelError> {
        let sender = self
            .inbound_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(ChannelError::QueueClosed)?;

        for channel in &self.channels {
            let mut rx = channel.start().await?;
            let tx = sender.clone();
            let name = channel.name().to_string();

            let handle = tokio::spawn(async move {
                while let Some(item) = rx.recv().await {
                    match item {
                        Ok(message) => {
                            if tx.send(message).await.is_err() {
                                break; // merged receiver dropped
                            }
                        }
                        Err(e) => warn!(channel = %name, error = %e, "Channel reported an error"),
                    }
                }
                debug!(channel = %name, "Channel input ended");
            });

            self.lock_forwarders().push(handle);
            info!(channel = %channel.name(), "Started channel");
        }
        Ok(())
    }

    /// Drop the multiplexer's own hold on the inbound queue.
    ///
    /// From here on only channel forwarders keep the queue open: it closes,
    /// and the consumer sees the end of input, once every started channel
    /// has finished producing. Call after [`start`](Self::start).
    pub fn close_inbound(&self) {
        let released = self
            .inbound_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if released.is_some() {
            debug!("Inbound queue now closes with its last channel");
        }
    }

    /// Stop forwarding and stop every channel.
    pub async fn stop(&self) {
        for handle in self.lock_forwarders().drain(..) {
            handle.abort();
        }
        for channel in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!(channel = %channel.name(), error = %e, "Failed to stop channel");
            }
        }
    }

    /// Take the merged inbound queue. Only the first call gets it.
    pub fn messages(&self) -> Option<mpsc::Receiver<ChannelMessage>> {
        self.inbound_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Enqueue a message as if an endpoint had produced it.
    pub async fn inject_message(&self, message: ChannelMessage) -> Result<(), ChannelError> {
        self.injector().inject(message).await
    }

    /// A cloneable handle for producers outside the multiplexer.
    pub fn injector(&self) -> MessageInjector {
        MessageInjector {
            tx: self.inbound_weak.clone(),
        }
    }

    /// Whether the named channel renders replies token by token.
    /// Unknown names are not streaming.
    pub fn is_streaming(&self, channel: &str) -> bool {
        self.get(channel).is_some_and(|c| c.is_streaming())
    }

    pub async fn send_message(&self, channel: &str, content: &str) -> Result<(), ChannelError> {
        let target = self.route(channel)?;
        self.bounded(channel, "send_message", target.send_message(content))
            .await
    }

    pub async fn send_token(&self, channel: &str, token: &str) -> Result<(), ChannelError> {
        let target = self.route(channel)?;
        self.bounded(channel, "send_token", target.send_token(token)).await
    }

    pub async fn send_reasoning(&self, channel: &str, fragment: &str) -> Result<(), ChannelError> {
        let target = self.route(channel)?;
        self.bounded(channel, "send_reasoning", target.send_reasoning(fragment))
            .await
    }

    pub async fn send_tool_call(
        &self,
        channel: &str,
        tool_name: &str,
        arguments: &str,
    ) -> Result<(), ChannelError> {
        let target = self.route(channel)?;
        self.bounded(
            channel,
            "send_tool_call",
            target.send_tool_call(tool_name, arguments),
        )
        .await
    }

    pub async fn show_thinking(&self, channel: &str) -> Result<(), ChannelError> {
        let target = self.route(channel)?;
        self.bounded(channel, "show_thinking", target.show_thinking())
            .await
    }

    fn route(&self, channel: &str) -> Result<&Arc<dyn Channel>, ChannelError> {
        self.get(channel).ok_or_else(|| {
            debug!(channel = %channel, "No channel registered under this name");
            ChannelError::NotRegistered(channel.to_string())
        })
    }

    /// Run one delivery under the delivery timeout, logging failures.
    async fn bounded(
        &self,
        channel: &str,
        operation: &'static str,
        delivery: impl Future<Output = Result<(), ChannelError>>,
    ) -> Result<(), ChannelError> {
        let result = match tokio::time::timeout(self.delivery_timeout, delivery).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::DeliveryTimeout {
                channel: channel.to_string(),
                timeout_ms: self.delivery_timeout.as_millis() as u64,
            }),
        };
        if let Err(e) = &result {
            warn!(channel = %channel, operation, error = %e, "Delivery failed");
        }
        result
    }

    fn lock_forwarders(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.forwarders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
