//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to send a history to an LLM and get a response back,
//! either as a complete turn or as a stream of incremental deltas.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ProviderError;
use crate::message::{ToolCallRequest, Turn};
use crate::schema::SchemaType;

/// A request for one model completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o", "deepseek-reasoner")
    pub model: String,

    /// The full conversation history
    pub turns: Vec<Turn>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// The function catalogue the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the LLM so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object
    pub parameters: SchemaType,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant turn
    pub turn: Turn,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One incremental piece of a streamed completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StreamDelta {
    /// A fragment of the visible answer.
    Text(String),
    /// A fragment of the model's reasoning trace.
    Reasoning(String),
    /// A fragment of a tool call, addressed by assembly index.
    ToolCall(ToolCallFragment),
    /// Token accounting, usually on the last chunk.
    Usage(Usage),
}

/// A partial tool-call descriptor.
///
/// `id` and `kind` overwrite the slot they address; `name` and `arguments`
/// are appended to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    /// Assembly index. Fragments without one are discarded.
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// An open streaming completion.
///
/// Yields deltas until the backend finishes. [`CompletionStream::close`]
/// stops the background reader; dropping the stream does the same.
pub struct CompletionStream {
    rx: mpsc::Receiver<Result<StreamDelta, ProviderError>>,
    reader: Option<JoinHandle<()>>,
}

impl CompletionStream {
    /// Wrap a receiver fed by someone else.
    pub fn new(rx: mpsc::Receiver<Result<StreamDelta, ProviderError>>) -> Self {
        Self { rx, reader: None }
    }

    /// Wrap a receiver fed by a spawned reader task that is aborted on close.
    pub fn with_reader(
        rx: mpsc::Receiver<Result<StreamDelta, ProviderError>>,
        reader: JoinHandle<()>,
    ) -> Self {
        Self {
            rx,
            reader: Some(reader),
        }
    }

    /// Create a stream together with the sender that feeds it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Result<StreamDelta, ProviderError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }

    /// Await the next delta. `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Result<StreamDelta, ProviderError>> {
        self.rx.recv().await
    }

    /// Stop the stream. Safe to call more than once.
    pub fn close(&mut self) {
        self.rx.close();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl Drop for CompletionStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("has_reader", &self.reader.is_some())
            .finish()
    }
}

/// Split a complete response into the deltas a stream would have carried.
pub fn response_deltas(response: &ProviderResponse) -> Vec<StreamDelta> {
    let mut deltas = Vec::new();
    if !response.turn.content.is_empty() {
        deltas.push(StreamDelta::Text(response.turn.content.clone()));
    }
    for (index, call) in response.turn.tool_calls.iter().enumerate() {
        deltas.push(StreamDelta::ToolCall(fragment_of(index, call)));
    }
    if let Some(usage) = response.usage {
        deltas.push(StreamDelta::Usage(usage));
    }
    deltas
}

fn fragment_of(index: usize, call: &ToolCallRequest) -> ToolCallFragment {
    ToolCallFragment {
        index: Some(index),
        id: Some(call.id.clone()),
        kind: Some(call.kind.clone()),
        name: Some(call.name.clone()),
        arguments: Some(call.arguments.clone()),
    }
}

/// The core Provider trait.
///
/// The orchestrator calls `stream()` without knowing which backend is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "deepseek").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of deltas.
    ///
    /// Default implementation calls `complete()` and replays the result.
    async fn stream(&self, request: ProviderRequest) -> Result<CompletionStream, ProviderError> {
        let response = self.complete(request).await?;
        let deltas = response_deltas(&response);
        let (tx, stream) = CompletionStream::channel(deltas.len());
        for delta in deltas {
            let _ = tx.try_send(Ok(delta));
        }
        Ok(stream)
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
