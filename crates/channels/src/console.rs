//! Console channel: interactive terminal-based chat.
//!
//! This is the simplest channel: reads lines from stdin, writes to stdout.
//! It streams, so replies appear token by token.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use relayclaw_core::channel::{Channel, ChannelMessage};
use relayclaw_core::error::ChannelError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Input = Box<dyn AsyncBufRead + Send + Unpin>;
type Output = Box<dyn Write + Send>;

/// Interactive console channel.
pub struct ConsoleChannel {
    input: Mutex<Option<Input>>,
    output: Mutex<Output>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ConsoleChannel {
    /// A console bound to the process's stdin and stdout.
    pub fn new() -> Self {
        Self::with_io(BufReader::new(tokio::io::stdin()), std::io::stdout())
    }

    /// A console reading from `input` and writing to `output`.
    pub fn with_io(
        input: impl AsyncBufRead + Send + Unpin + 'static,
        output: impl Write + Send + 'static,
    ) -> Self {
        Self {
            input: Mutex::new(Some(Box::new(input))),
            output: Mutex::new(Box::new(output)),
            reader: Mutex::new(None),
        }
    }

    fn write(&self, text: &str) -> Result<(), ChannelError> {
        let mut out = self
            .output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        out.write_all(text.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "console".into(),
                reason: e.to_string(),
            })
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn is_exit_command(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    fn is_streaming(&self) -> bool {
        true
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let input = self
            .input
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| ChannelError::ConnectionLost("console already started".into()))?;

        // The receiver closes once the user leaves (EOF or an exit command).
        let (tx, rx) = mpsc::channel(32);

        self.write("Console channel started. Type a message and press Enter.\n")?;

        let handle = tokio::spawn(async move {
            let mut lines = input.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if is_exit_command(line) {
                            break;
                        }

                        let msg = ChannelMessage::new("console", "user", line);
                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        *self
            .reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);

        Ok(rx)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(reader) = reader {
            reader.abort();
        }
        Ok(())
    }

    async fn send_message(&self, content: &str) -> Result<(), ChannelError> {
        self.write(&format!("[Agent]: {content}\n"))
    }

    async fn send_token(&self, token: &str) -> Result<(), ChannelError> {
        self.write(token)
    }

    async fn send_reasoning(&self, fragment: &str) -> Result<(), ChannelError> {
        self.write(fragment)
    }

    async fn send_tool_call(&self, tool_name: &str, arguments: &str) -> Result<(), ChannelError> {
        self.write(&format!("\n[Tool Call] {tool_name}({arguments})\n"))
    }

    async fn show_thinking(&self) -> Result<(), ChannelError> {
        self.write("Thinking...\r")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// A `Write` sink tests can read back.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn console(input: &'static str) -> (ConsoleChannel, SharedBuf) {
        let out = SharedBuf::default();
        let ch = ConsoleChannel::with_io(BufReader::new(input.as_bytes()), out.clone());
        (ch, out)
    }

    #[test]
    fn console_channel_properties() {
        let (ch, _) = console("");
        assert_eq!(ch.name(), "console");
        assert!(ch.is_streaming());
    }

    #[tokio::test]
    async fn reads_lines_until_exit() {
        let (ch, _) = console("hello\n\n  what time is it?  \nexit\nignored\n");
        let mut rx = ch.start().await.unwrap();

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.content, "hello");
        assert_eq!(first.channel, "console");
        assert_eq!(first.sender_id, "user");
        let second = rx.recv().await.unwrap().unwrap();
        assert_eq!(second.content, "what time is it?");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn eof_closes_input_after_last_line() {
        let (ch, _) = console("only line");
        let mut rx = ch.start().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap().content, "only line");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn second_start_fails() {
        let (ch, _) = console("");
        let _rx = ch.start().await.unwrap();
        assert!(ch.start().await.is_err());
    }

    #[tokio::test]
    async fn renders_outbound_operations() {
        let (ch, out) = console("");
        ch.send_token("It is ").await.unwrap();
        ch.send_token("noon").await.unwrap();
        ch.send_tool_call("clock_current", "{}").await.unwrap();
        ch.send_message("done").await.unwrap();

        assert_eq!(
            out.text(),
            "It is noon\n[Tool Call] clock_current({})\n[Agent]: done\n"
        );
    }
}
