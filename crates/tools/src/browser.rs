//! Browser tool: fetch a page and hand the model its readable text.
//!
//! Pages are fetched over plain HTTP, so no script runs. Text inside
//! `<script>`, `<style>`, `<noscript>` and `<template>` is skipped.

use std::time::Duration;

use async_trait::async_trait;
use relayclaw_core::error::ToolError;
use relayclaw_core::schema::{ObjectSchema, SchemaType};
use relayclaw_core::tool::Tool;
use scraper::{Html, Selector};
use tracing::debug;

use crate::string_arg;

/// Longest page text returned, in characters.
pub const MAX_PAGE_CHARS: usize = 2000;

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

pub struct BrowserOpenTool {
    client: reqwest::Client,
    timeout: Duration,
}

impl BrowserOpenTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(60),
        }
    }

    fn failed(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: reason.into(),
        }
    }
}

impl Default for BrowserOpenTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for BrowserOpenTool {
    fn name(&self) -> &str {
        "browser_open"
    }

    fn description(&self) -> &str {
        "Open a URL and return the text content of the page."
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new().required_property("url", SchemaType::string("The URL to visit"))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let url = string_arg(&arguments, "url")?.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        debug!(url = %url, "Fetching page");
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.failed(format!("browser error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.failed(format!("{url} returned HTTP {status}")));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_none_or(|v| v.contains("html"));
        let body = response
            .text()
            .await
            .map_err(|e| self.failed(format!("browser error: {e}")))?;

        let text = if is_html {
            page_text(&body)
        } else {
            body.trim().to_string()
        };
        Ok(truncate(text))
    }
}

/// Visible text of the page body, one text run per line.
fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());

    let mut lines = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let run = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !run.is_empty() {
            lines.push(run);
        }
    }
    lines.join("\n")
}

fn truncate(text: String) -> String {
    match text.char_indices().nth(MAX_PAGE_CHARS) {
        Some((cut, _)) => format!("{}...(truncated)", &text[..cut]),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Serve one canned response on a local port and return its URL.
    async fn serve_once(status_line: &'static str, content_type: &'static str, body: String) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let mut request = Vec::new();
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/page")
    }

    #[test]
    fn tool_definition() {
        let tool = BrowserOpenTool::new();
        assert_eq!(tool.name(), "browser_open");
        assert_eq!(tool.parameters().required, vec!["url"]);
    }

    #[test]
    fn extracts_visible_body_text() {
        let html = r#"<html><head><title>Weather</title><style>p { color: red }</style></head>
            <body><h1>Paris</h1><script>var tracking = 1;</script>
            <p>Sunny,   22 °C</p><noscript>enable js</noscript></body></html>"#;
        assert_eq!(page_text(html), "Paris\nSunny, 22 °C");
    }

    #[test]
    fn long_text_is_truncated_on_char_boundary() {
        let text = truncate("ü".repeat(MAX_PAGE_CHARS + 5));
        assert!(text.ends_with("...(truncated)"));
        assert_eq!(text.chars().count(), MAX_PAGE_CHARS + "...(truncated)".len());
        assert_eq!(truncate("short".into()), "short");
    }

    #[tokio::test]
    async fn fetches_page_text() {
        let url = serve_once(
            "HTTP/1.1 200 OK",
            "text/html; charset=utf-8",
            "<html><body><p>Hello from the page</p></body></html>".into(),
        )
        .await;
        let out = BrowserOpenTool::new()
            .execute(serde_json::json!({ "url": format!("  {url} ") }))
            .await
            .unwrap();
        assert_eq!(out, "Hello from the page");
    }

    #[tokio::test]
    async fn plain_text_is_returned_as_is() {
        let url = serve_once("HTTP/1.1 200 OK", "text/plain", "  just text \n".into()).await;
        let out = BrowserOpenTool::new()
            .execute(serde_json::json!({ "url": url }))
            .await
            .unwrap();
        assert_eq!(out, "just text");
    }

    #[tokio::test]
    async fn error_status_is_execution_failure() {
        let url = serve_once("HTTP/1.1 404 Not Found", "text/html", "<p>nope</p>".into()).await;
        let err = BrowserOpenTool::new()
            .execute(serde_json::json!({ "url": url }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn non_http_url_rejected() {
        let result = BrowserOpenTool::new()
            .execute(serde_json::json!({ "url": "file:///etc/passwd" }))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
