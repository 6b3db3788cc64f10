//! Shared test doubles: a scripted provider, a recording channel and a
//! tool that sleeps.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use relayclaw_core::channel::{Channel, ChannelMessage};
use relayclaw_core::error::{ChannelError, ProviderError, ToolError};
use relayclaw_core::message::Role;
use relayclaw_core::provider::{
    CompletionStream, Provider, ProviderRequest, ProviderResponse, StreamDelta, ToolCallFragment,
};
use relayclaw_core::schema::{ObjectSchema, SchemaType};
use relayclaw_core::tool::Tool;
use std::sync::Arc;
use tokio::sync::mpsc;

pub fn text(s: &str) -> StreamDelta {
    StreamDelta::Text(s.into())
}

pub fn tool_call(index: usize, id: &str, name: &str, arguments: &str) -> StreamDelta {
    StreamDelta::ToolCall(ToolCallFragment {
        index: Some(index),
        id: Some(id.into()),
        kind: Some("function".into()),
        name: Some(name.into()),
        arguments: Some(arguments.into()),
    })
}

type Script = Result<Vec<StreamDelta>, ProviderError>;

enum Mode {
    /// Pop scripts in order; panic when they run out.
    Queue(VecDeque<Script>),
    /// Return the same deltas forever.
    Repeat(Vec<StreamDelta>),
    /// Call the named tool for each new user turn, then answer.
    EchoTool(String),
}

/// A provider that replays canned streams.
pub struct ScriptedProvider {
    mode: Mutex<Mode>,
    requests: Mutex<Vec<ProviderRequest>>,
    fail_midstream: bool,
    hang: bool,
    /// Senders kept alive so hanging streams never end.
    open: Mutex<Vec<mpsc::Sender<Result<StreamDelta, ProviderError>>>>,
}

impl ScriptedProvider {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode: Mutex::new(mode),
            requests: Mutex::new(Vec::new()),
            fail_midstream: false,
            hang: false,
            open: Mutex::new(Vec::new()),
        }
    }

    pub fn new(scripts: Vec<Script>) -> Self {
        Self::with_mode(Mode::Queue(scripts.into()))
    }

    pub fn repeating(deltas: Vec<StreamDelta>) -> Self {
        Self::with_mode(Mode::Repeat(deltas))
    }

    pub fn echoing_tool(tool: &str) -> Self {
        Self::with_mode(Mode::EchoTool(tool.into()))
    }

    /// End every stream with an error after its deltas.
    pub fn failing_midstream(mut self) -> Self {
        self.fail_midstream = true;
        self
    }

    /// Never end streams after their deltas.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_script(&self, request: &ProviderRequest) -> Script {
        let mut mode = self.mode.lock().unwrap();
        match &mut *mode {
            Mode::Queue(scripts) => scripts
                .pop_front()
                .expect("ScriptedProvider: no more scripted responses"),
            Mode::Repeat(deltas) => Ok(deltas.clone()),
            Mode::EchoTool(tool) => {
                let last = request.turns.last().expect("request without turns");
                let word = request
                    .turns
                    .iter()
                    .rev()
                    .find(|t| t.role == Role::User)
                    .map(|t| t.content.clone())
                    .unwrap_or_default();
                if last.role == Role::User {
                    Ok(vec![tool_call(
                        0,
                        &format!("call_{word}"),
                        tool,
                        &format!(r#"{{"label":"{word}"}}"#),
                    )])
                } else {
                    Ok(vec![text(&format!("done with {word}"))])
                }
            }
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("scripted provider only streams".into()))
    }

    async fn stream(&self, request: ProviderRequest) -> Result<CompletionStream, ProviderError> {
        let script = self.next_script(&request);
        self.requests.lock().unwrap().push(request);
        let deltas = script?;

        let (tx, stream) = CompletionStream::channel(deltas.len() + 2);
        for delta in deltas {
            tx.try_send(Ok(delta)).unwrap();
        }
        if self.fail_midstream {
            tx.try_send(Err(ProviderError::Network("connection reset".into())))
                .unwrap();
        }
        if self.hang {
            self.open.lock().unwrap().push(tx);
        }
        Ok(stream)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(String),
    Token(String),
    Reasoning(String),
    ToolCall(String, String),
    Thinking,
}

/// A channel that records everything sent to it.
pub struct RecordingChannel {
    name: String,
    streaming: bool,
    outbound: Mutex<Vec<Outbound>>,
}

impl RecordingChannel {
    pub fn new(name: &str, streaming: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            streaming,
            outbound: Mutex::new(Vec::new()),
        })
    }

    pub fn outbound(&self) -> Vec<Outbound> {
        self.outbound.lock().unwrap().clone()
    }

    /// Final messages only.
    pub fn messages(&self) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn record(&self, item: Outbound) {
        self.outbound.lock().unwrap().push(item);
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send_message(&self, content: &str) -> Result<(), ChannelError> {
        self.record(Outbound::Message(content.into()));
        Ok(())
    }

    async fn send_token(&self, token: &str) -> Result<(), ChannelError> {
        self.record(Outbound::Token(token.into()));
        Ok(())
    }

    async fn send_reasoning(&self, fragment: &str) -> Result<(), ChannelError> {
        self.record(Outbound::Reasoning(fragment.into()));
        Ok(())
    }

    async fn send_tool_call(&self, tool_name: &str, arguments: &str) -> Result<(), ChannelError> {
        self.record(Outbound::ToolCall(tool_name.into(), arguments.into()));
        Ok(())
    }

    async fn show_thinking(&self) -> Result<(), ChannelError> {
        self.record(Outbound::Thinking);
        Ok(())
    }
}

/// Sleeps, then reports the `label` argument.
pub struct SlowTool {
    delay: Duration,
}

impl SlowTool {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "Sleep for a while"
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new().optional_property("label", SchemaType::string("Echoed back"))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        tokio::time::sleep(self.delay).await;
        let label = arguments["label"].as_str().unwrap_or_default();
        Ok(format!("slept for {label}"))
    }
}
