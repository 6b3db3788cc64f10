//! The conversation orchestrator: turns one inbound message into a bounded
//! sequence of model calls and tool dispatches.
//!
//! Per message:
//! 1. Lock the history partition and append the user turn
//! 2. Stream a completion, forwarding text and reasoning live when the
//!    origin channel can render it
//! 3. Append the assembled assistant turn
//! 4. If it requested tools, run them in index order, append their results
//!    and go back to 2; otherwise the exchange is done
//!
//! The loop runs at most `max_turns` model calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use relayclaw_channels::ChannelMultiplexer;
use relayclaw_config::{AgentConfig, HistoryScope, ProviderConfig};
use relayclaw_core::channel::ChannelMessage;
use relayclaw_core::error::{ChannelError, Error, ProviderError, ToolError};
use relayclaw_core::event::{DomainEvent, EventBus};
use relayclaw_core::message::{ToolCallRequest, Turn};
use relayclaw_core::provider::{Provider, ProviderRequest, StreamDelta};
use relayclaw_core::tool::{ToolCallResult, ToolRegistry};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assembler::DeltaAssembler;
use crate::store::ConversationStore;

/// Shown on the origin channel when the provider cannot be reached.
pub const PROVIDER_ERROR_NOTICE: &str = "Error communicating with AI.";

/// Tunables for the turn loop.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Model calls allowed per exchange
    pub max_turns: usize,
    pub max_concurrent_exchanges: usize,
    pub history_scope: HistoryScope,
    pub stream_open_timeout: Duration,
    /// Longest wait for the next delta of an open stream
    pub stream_idle_timeout: Duration,
    pub tool_timeout: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(provider: &ProviderConfig, agent: &AgentConfig) -> Self {
        Self {
            model: provider.model.clone(),
            temperature: provider.temperature,
            max_tokens: provider.max_tokens,
            max_turns: agent.max_turns,
            max_concurrent_exchanges: agent.max_concurrent_exchanges,
            history_scope: agent.history_scope,
            stream_open_timeout: agent.stream_open_timeout(),
            stream_idle_timeout: agent.stream_idle_timeout(),
            tool_timeout: agent.tool_timeout(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&ProviderConfig::default(), &AgentConfig::default())
    }
}

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The model produced a turn without tool calls.
    Completed { model_calls: usize },
    /// The turn cap was reached while the model still wanted tools.
    Truncated { model_calls: usize },
    /// The provider stream could not be opened.
    ProviderFailed,
    /// The runtime is shutting down.
    Cancelled,
}

/// Drives exchanges between channels, the provider and the tools.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    channels: Arc<ChannelMultiplexer>,
    store: ConversationStore,
    event_bus: Arc<EventBus>,
    settings: OrchestratorSettings,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        channels: Arc<ChannelMultiplexer>,
        event_bus: Arc<EventBus>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            channels,
            store: ConversationStore::new(settings.history_scope),
            event_bus,
            permits: Arc::new(Semaphore::new(settings.max_concurrent_exchanges.max(1))),
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Share a cancellation token with the rest of the runtime.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Seed every history with a system turn. Only valid once, before the
    /// first exchange.
    pub async fn set_system_prompt(&self, prompt: impl Into<String>) -> Result<(), Error> {
        self.store.set_system_prompt(prompt).await
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancel in-flight streams and tool calls and stop accepting messages.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Handle one message to completion.
    pub async fn handle(&self, message: ChannelMessage) {
        let outcome = self.process(message).await;
        debug!(?outcome, "Exchange finished");
    }

    /// Consume the inbound queue, running up to `max_concurrent_exchanges`
    /// exchanges at once. Returns after shutdown once in-flight exchanges
    /// have unwound, or when the queue closes and they have finished.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<ChannelMessage>) {
        info!(
            max_concurrent = self.settings.max_concurrent_exchanges,
            "Orchestrator running"
        );
        let mut exchanges = JoinSet::new();

        loop {
            let message = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(joined) = exchanges.join_next(), if !exchanges.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Exchange task failed");
                    }
                    continue;
                }
                message = inbound.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let this = Arc::clone(&self);
            exchanges.spawn(async move {
                let _permit = permit;
                this.handle(message).await;
            });
        }

        while let Some(joined) = exchanges.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Exchange task failed");
            }
        }
        info!("Orchestrator stopped");
    }

    /// Run one exchange and report how it ended.
    pub async fn process(&self, message: ChannelMessage) -> ExchangeOutcome {
        let channel = message.channel.as_str();
        info!(
            channel = %channel,
            sender = %message.sender_id,
            message_id = %message.id,
            "Processing message"
        );
        self.event_bus.publish(DomainEvent::MessageReceived {
            channel: channel.to_string(),
            sender_id: message.sender_id.clone(),
            content_preview: message.preview(),
            timestamp: chrono::Utc::now(),
        });

        let mut history = tokio::select! {
            _ = self.shutdown.cancelled() => return ExchangeOutcome::Cancelled,
            guard = self.store.lock(channel) => guard,
        };
        history.push(Turn::user(message.content.as_str()));

        let streaming = self.channels.is_streaming(channel);
        let tool_definitions = self.tools.schemas();

        for iteration in 1..=self.settings.max_turns {
            if self.shutdown.is_cancelled() {
                return ExchangeOutcome::Cancelled;
            }
            debug!(channel = %channel, iteration, "Model turn");
            delivered(self.channels.show_thinking(channel).await);

            let request = ProviderRequest {
                model: self.settings.model.clone(),
                turns: history.turns.clone(),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
                tools: tool_definitions.clone(),
            };

            let opened = tokio::select! {
                _ = self.shutdown.cancelled() => return ExchangeOutcome::Cancelled,
                opened = tokio::time::timeout(
                    self.settings.stream_open_timeout,
                    self.provider.stream(request),
                ) => opened,
            };
            let mut stream = match opened {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return self.provider_failed(channel, e).await,
                Err(_) => {
                    let e = ProviderError::Timeout(format!(
                        "stream did not open within {}s",
                        self.settings.stream_open_timeout.as_secs()
                    ));
                    return self.provider_failed(channel, e).await;
                }
            };

            let mut assembler = DeltaAssembler::new();
            loop {
                let next = tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        stream.close();
                        return ExchangeOutcome::Cancelled;
                    }
                    next = tokio::time::timeout(self.settings.stream_idle_timeout, stream.next()) => next,
                };
                match next {
                    Ok(Some(Ok(delta))) => {
                        if streaming {
                            self.forward(channel, &delta).await;
                        }
                        assembler.push(&delta);
                    }
                    Ok(Some(Err(e))) => {
                        warn!(channel = %channel, error = %e, "Stream failed; keeping what arrived");
                        break;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        warn!(
                            channel = %channel,
                            idle_secs = self.settings.stream_idle_timeout.as_secs(),
                            "Stream went idle; keeping what arrived"
                        );
                        break;
                    }
                }
            }
            stream.close();

            let assembled = assembler.finish();
            if streaming && !assembled.text.is_empty() {
                delivered(self.channels.send_token(channel, "\n").await);
            }

            let calls = assembled.dispatchable_calls();
            history.push(Turn::assistant_with_calls(assembled.text.as_str(), calls.clone()));

            if calls.is_empty() {
                if !streaming {
                    delivered(self.channels.send_message(channel, &assembled.text).await);
                }
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    channel: channel.to_string(),
                    model: self.settings.model.clone(),
                    iterations: iteration,
                    timestamp: chrono::Utc::now(),
                });
                return ExchangeOutcome::Completed {
                    model_calls: iteration,
                };
            }

            debug!(channel = %channel, tool_count = calls.len(), "Executing tool calls");
            for call in &calls {
                delivered(
                    self.channels
                        .send_tool_call(channel, &call.name, &call.arguments)
                        .await,
                );
                let Some(result) = self.run_tool(call).await else {
                    return ExchangeOutcome::Cancelled;
                };
                history.push(Turn::tool_result(result.call_id, result.output));
            }
        }

        let max_turns = self.settings.max_turns;
        warn!(channel = %channel, max_turns, "Turn cap reached; truncating exchange");
        self.event_bus.publish(DomainEvent::ExchangeTruncated {
            channel: channel.to_string(),
            max_turns,
            timestamp: chrono::Utc::now(),
        });
        delivered(
            self.channels
                .send_message(
                    channel,
                    &format!("[conversation truncated after {max_turns} model turns]"),
                )
                .await,
        );
        ExchangeOutcome::Truncated {
            model_calls: max_turns,
        }
    }

    async fn forward(&self, channel: &str, delta: &StreamDelta) {
        match delta {
            StreamDelta::Text(token) => delivered(self.channels.send_token(channel, token).await),
            StreamDelta::Reasoning(fragment) => {
                delivered(self.channels.send_reasoning(channel, fragment).await)
            }
            StreamDelta::ToolCall(_) | StreamDelta::Usage(_) => {}
        }
    }

    /// Dispatch one call under the tool timeout. `None` on shutdown.
    async fn run_tool(&self, call: &ToolCallRequest) -> Option<ToolCallResult> {
        let start = Instant::now();
        let dispatched = tokio::select! {
            _ = self.shutdown.cancelled() => return None,
            dispatched = tokio::time::timeout(self.settings.tool_timeout, self.tools.dispatch(call)) => dispatched,
        };
        let result = dispatched.unwrap_or_else(|_| {
            let e = ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_secs: self.settings.tool_timeout.as_secs(),
            };
            ToolCallResult {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                output: format!("Error: {e}"),
                success: false,
            }
        });
        let duration_ms = start.elapsed().as_millis() as u64;

        if result.success {
            debug!(tool = %call.name, duration_ms, "Tool succeeded");
        } else {
            warn!(tool = %call.name, duration_ms, output = %result.output, "Tool failed");
        }
        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: result.success,
            duration_ms,
            timestamp: chrono::Utc::now(),
        });
        Some(result)
    }

    async fn provider_failed(&self, channel: &str, error: ProviderError) -> ExchangeOutcome {
        warn!(channel = %channel, provider = %self.provider.name(), error = %error, "Provider unavailable");
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: format!("provider stream for {channel}"),
            error_message: error.to_string(),
            timestamp: chrono::Utc::now(),
        });
        delivered(self.channels.send_message(channel, PROVIDER_ERROR_NOTICE).await);
        ExchangeOutcome::ProviderFailed
    }
}

/// Outbound delivery is best-effort; the multiplexer already logs failures.
fn delivered(result: Result<(), ChannelError>) {
    if let Err(e) = result {
        debug!(error = %e, "Ignoring failed delivery");
    }
}
