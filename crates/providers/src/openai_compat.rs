//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, DeepSeek, Ollama, vLLM, and any endpoint
//! exposing `/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Reasoning deltas (`reasoning_content`, DeepSeek R1 style)
//! - Tool use / function calling with fragmented streamed arguments
//! - Health checks

use async_trait::async_trait;
use futures::StreamExt;
use relayclaw_core::error::ProviderError;
use relayclaw_core::message::{Role, ToolCallRequest, Turn};
use relayclaw_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Buffered deltas between the SSE reader and the consumer.
const STREAM_BUFFER: usize = 64;

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    ///
    /// Only the connect phase is bounded here; a streamed response may
    /// legitimately run for minutes, so read deadlines are left to the caller.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Result<Self, ProviderError> {
        Self::new("ollama", base_url.unwrap_or("http://localhost:11434/v1"), "")
    }

    /// Convert our Turn types to OpenAI API format.
    fn to_api_messages(turns: &[Turn]) -> Vec<ApiMessage> {
        turns
            .iter()
            .map(|t| {
                let tool_calls: Option<Vec<ApiToolCall>> = (!t.tool_calls.is_empty()).then(|| {
                    t.tool_calls
                        .iter()
                        .map(|tc| ApiToolCall {
                            id: tc.id.clone(),
                            r#type: if tc.kind.is_empty() {
                                "function".into()
                            } else {
                                tc.kind.clone()
                            },
                            function: ApiFunction {
                                name: tc.name.clone(),
                                arguments: tc.arguments.clone(),
                            },
                        })
                        .collect()
                });

                // An assistant turn that only calls tools carries no content.
                let content = if tool_calls.is_some() && t.content.is_empty() {
                    None
                } else {
                    Some(t.content.clone())
                };

                ApiMessage {
                    role: match t.role {
                        Role::User => "user".into(),
                        Role::Assistant => "assistant".into(),
                        Role::System => "system".into(),
                        Role::Tool => "tool".into(),
                    },
                    content,
                    tool_calls,
                    tool_call_id: t.tool_call_id.clone(),
                }
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.to_json(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.turns),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body);

        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        check_status(response).await
    }
}

/// Map non-success HTTP statuses onto provider errors.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(5);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    if status != 200 {
        let error_body = response.text().await.unwrap_or_default();
        warn!(status, body = %error_body, "Provider returned error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}

#[async_trait]
impl relayclaw_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request, false);
        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self.post(&body, false).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, tc)| ToolCallRequest {
                id: tc.id,
                kind: tc.r#type,
                name: tc.function.name,
                arguments: tc.function.arguments,
                index,
            })
            .collect();

        let usage = api_response.usage.map(ApiUsage::into_usage);

        Ok(ProviderResponse {
            turn: Turn::assistant_with_calls(choice.message.content.unwrap_or_default(), tool_calls),
            usage,
            model: api_response.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<CompletionStream, ProviderError> {
        let body = Self::request_body(&request, true);
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self.post(&body, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(STREAM_BUFFER);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and forward parsed deltas
        let reader = tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLineBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for line in lines.push(&bytes) {
                    match parse_sse_line(&line) {
                        Some(SseEvent::Done) => return,
                        Some(SseEvent::Deltas(deltas)) => {
                            for delta in deltas {
                                if tx.send(Ok(delta)).await.is_err() {
                                    return; // receiver closed
                                }
                            }
                        }
                        None => {
                            trace!(provider = %provider_name, line = %line, "Skipping SSE line");
                        }
                    }
                }
            }
        });

        Ok(CompletionStream::with_reader(rx, reader))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let mut builder = self.client.get(&url);
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }
        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- SSE parsing ---

/// Splits a byte stream into complete lines, keeping any partial tail.
///
/// Bytes are only decoded once a whole line is buffered, so a multi-byte
/// character split across network chunks survives intact.
#[derive(Default)]
struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }
}

/// What one SSE line contributes to the stream.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Deltas(Vec<StreamDelta>),
    Done,
}

/// Parse one SSE line. Blank lines, comments, non-data fields and
/// unparseable payloads yield `None`.
fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let data = line.strip_prefix("data:")?.trim();

    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(chunk) => Some(SseEvent::Deltas(chunk.into_deltas())),
        Err(e) => {
            trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
            None
        }
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl ApiUsage {
    fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

impl StreamResponse {
    /// Split one chunk into tagged deltas, in the order the fields are consumed.
    fn into_deltas(self) -> Vec<StreamDelta> {
        let mut deltas = Vec::new();

        if let Some(choice) = self.choices.into_iter().next() {
            let delta = choice.delta;

            if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
                deltas.push(StreamDelta::Reasoning(reasoning));
            }

            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                deltas.push(StreamDelta::Text(content));
            }

            for tc in delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = match tc.function {
                    Some(f) => (f.name, f.arguments),
                    None => (None, None),
                };
                deltas.push(StreamDelta::ToolCall(ToolCallFragment {
                    index: tc.index,
                    id: tc.id,
                    kind: tc.r#type,
                    name,
                    arguments,
                }));
            }
        }

        if let Some(usage) = self.usage {
            deltas.push(StreamDelta::Usage(usage.into_usage()));
        }

        deltas
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamChoiceDelta,
}

#[derive(Debug, Deserialize)]
struct StreamChoiceDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta: arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    r#type: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayclaw_core::Provider;
    use relayclaw_core::schema::{ObjectSchema, SchemaType};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn deltas(line: &str) -> Vec<StreamDelta> {
        match parse_sse_line(line) {
            Some(SseEvent::Deltas(d)) => d,
            other => panic!("expected deltas, got {other:?}"),
        }
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url.contains("localhost:11434"));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("x", "https://api.example.com/v1/", "k").unwrap();
        assert_eq!(provider.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn turn_conversion() {
        let turns = vec![Turn::system("You are helpful"), Turn::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&turns);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn turn_conversion_with_tool_calls() {
        let turn = Turn::assistant_with_calls(
            "",
            vec![ToolCallRequest::new("call_1", "shell_run", r#"{"command":"ls"}"#)],
        );
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[turn]);
        assert!(api_msgs[0].content.is_none());
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "shell_run");
        assert_eq!(tc[0].r#type, "function");
    }

    #[test]
    fn turn_conversion_tool_response() {
        let turn = Turn::tool_result("call_1", "result data");
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[turn]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![ToolDefinition {
            name: "shell_run".into(),
            description: "Run a shell command".into(),
            parameters: SchemaType::Object(
                ObjectSchema::new().required_property("command", SchemaType::string("cmd")),
            ),
        }];
        let api_tools = OpenAiCompatProvider::to_api_tools(&tools);
        assert_eq!(api_tools[0].function.name, "shell_run");
        assert_eq!(api_tools[0].function.parameters["type"], "object");
    }

    #[test]
    fn streaming_body_requests_usage() {
        let request = ProviderRequest {
            model: "gpt-4o".into(),
            turns: vec![Turn::user("hi")],
            temperature: 0.2,
            max_tokens: Some(64),
            tools: vec![],
        };
        let body = OpenAiCompatProvider::request_body(&request, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 64);
        assert!(body.get("tools").is_none());
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_content_delta() {
        let d = deltas(r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#);
        assert_eq!(d, vec![StreamDelta::Text("Hello".into())]);
    }

    #[test]
    fn parse_reasoning_delta() {
        let d = deltas(r#"data: {"choices":[{"delta":{"reasoning_content":"Let me think"}}]}"#);
        assert_eq!(d, vec![StreamDelta::Reasoning("Let me think".into())]);
    }

    #[test]
    fn parse_data_without_space() {
        let d = deltas(r#"data:{"choices":[{"delta":{"content":"x"}}]}"#);
        assert_eq!(d, vec![StreamDelta::Text("x".into())]);
    }

    #[test]
    fn parse_finish_chunk_is_empty() {
        let d = deltas(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#);
        assert!(d.is_empty());
    }

    #[test]
    fn parse_tool_call_fragments() {
        let d = deltas(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","type":"function","function":{"name":"file_read","arguments":""}},{"index":1,"function":{"arguments":"{\"pa"}}]}}]}"#,
        );
        assert_eq!(d.len(), 2);
        let StreamDelta::ToolCall(first) = &d[0] else {
            panic!("expected tool call");
        };
        assert_eq!(first.index, Some(0));
        assert_eq!(first.id.as_deref(), Some("call_a"));
        assert_eq!(first.kind.as_deref(), Some("function"));
        assert_eq!(first.name.as_deref(), Some("file_read"));
        let StreamDelta::ToolCall(second) = &d[1] else {
            panic!("expected tool call");
        };
        assert_eq!(second.index, Some(1));
        assert!(second.id.is_none());
        assert_eq!(second.arguments.as_deref(), Some("{\"pa"));
    }

    #[test]
    fn parse_tool_call_without_index() {
        let d = deltas(r#"data: {"choices":[{"delta":{"tool_calls":[{"function":{"name":"x"}}]}}]}"#);
        let StreamDelta::ToolCall(frag) = &d[0] else {
            panic!("expected tool call");
        };
        assert_eq!(frag.index, None);
    }

    #[test]
    fn parse_usage_chunk() {
        let d = deltas(
            r#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        );
        assert_eq!(
            d,
            vec![StreamDelta::Usage(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15
            })]
        );
    }

    #[test]
    fn done_comments_and_garbage() {
        assert_eq!(parse_sse_line("data: [DONE]"), Some(SseEvent::Done));
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line("event: ping"), None);
        assert_eq!(parse_sse_line("data: {not json"), None);
    }

    #[test]
    fn line_buffer_keeps_partial_tail() {
        let mut buf = SseLineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        let lines = buf.push(b":1}\r\n\r\ndata: [DO");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string(), String::new()]);
        assert_eq!(buf.push(b"NE]\n"), vec!["data: [DONE]".to_string()]);
    }

    #[test]
    fn line_buffer_joins_split_multibyte_char() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"你好\"}}]}\n".as_bytes();
        let cut = line.iter().position(|&b| b >= 0x80).unwrap() + 1;

        let mut buf = SseLineBuffer::default();
        assert!(buf.push(&line[..cut]).is_empty());
        let lines = buf.push(&line[cut..]);

        assert_eq!(lines.len(), 1);
        assert_eq!(deltas(&lines[0]), vec![StreamDelta::Text("你好".into())]);
    }

    /// Serve one canned HTTP response on a local port.
    async fn serve_once(status_line: &'static str, body: String) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "{status_line}\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{body}"
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}/v1")
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "test-model".into(),
            turns: vec![Turn::user("what time is it?")],
            temperature: 0.7,
            max_tokens: None,
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn stream_reads_sse_until_done() {
        let body = [
            r#"data: {"choices":[{"delta":{"reasoning_content":"hm"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"It is "}}]}"#,
            ": keep-alive",
            r#"data: {"choices":[{"delta":{"content":"noon."}}]}"#,
            "data: [DONE]",
            r#"data: {"choices":[{"delta":{"content":"ignored"}}]}"#,
        ]
        .join("\n\n");
        let base_url = serve_once("HTTP/1.1 200 OK", body).await;

        let provider = OpenAiCompatProvider::new("local", base_url, "").unwrap();
        let mut stream = provider.stream(request()).await.unwrap();

        let mut collected = Vec::new();
        while let Some(delta) = stream.next().await {
            collected.push(delta.unwrap());
        }
        assert_eq!(
            collected,
            vec![
                StreamDelta::Reasoning("hm".into()),
                StreamDelta::Text("It is ".into()),
                StreamDelta::Text("noon.".into()),
            ]
        );
    }

    #[tokio::test]
    async fn auth_failure_maps_to_error() {
        let base_url = serve_once("HTTP/1.1 401 Unauthorized", String::new()).await;
        let provider = OpenAiCompatProvider::new("local", base_url, "bad").unwrap();
        let err = provider.stream(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = OpenAiCompatProvider::new("local", format!("http://{addr}/v1"), "").unwrap();
        let err = provider.stream(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
    }
}
