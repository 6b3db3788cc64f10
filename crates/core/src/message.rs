//! Turn and History domain types.
//!
//! These are the value objects that make up a conversation:
//! a Channel delivers a message → the orchestrator appends a user Turn →
//! the Provider answers with an assistant Turn → tools answer with tool Turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// The role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (set once at startup)
    System,
    /// The end user (or a synthetic injector)
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

/// A tool invocation requested by the model.
///
/// Built up incrementally while a response streams in, then finalized
/// once the stream ends and consumed by a single dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call ID assigned by the backend (echoed back in the tool Turn)
    pub id: String,

    /// Call type as reported by the backend (normally "function")
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Raw argument payload, expected to parse as a JSON object
    pub arguments: String,

    /// Assembly index; only meaningful during stream reconstruction
    #[serde(skip)]
    pub index: usize,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "function".into(),
            name: name.into(),
            arguments: arguments.into(),
            index: 0,
        }
    }

    /// True when the backend reserved the slot but never filled it.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.name.is_empty() && self.arguments.is_empty()
    }
}

/// A single role-tagged unit of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// If this is a tool result, which tool call it answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// An assistant turn that carries tool calls.
    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        let mut turn = Self::with_role(Role::Assistant, content);
        turn.tool_calls = tool_calls;
        turn
    }

    /// A tool result answering the call with `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut turn = Self::with_role(Role::Tool, content);
        turn.tool_call_id = Some(tool_call_id.into());
        turn
    }
}

/// An append-only, ordered sequence of turns.
///
/// The first turn, if it is a system turn, is set exactly once through
/// [`History::set_system_prompt`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl History {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A history seeded with a single system turn.
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut history = Self::new();
        history.turns.push(Turn::system(prompt));
        history
    }

    /// Replace an empty history with a single system turn.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) -> Result<(), Error> {
        if !self.turns.is_empty() {
            return Err(Error::Config {
                message: "system prompt can only be set on an empty history".into(),
            });
        }
        self.push(Turn::system(prompt));
        Ok(())
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.turns
            .first()
            .filter(|t| t.role == Role::System)
            .map(|t| t.content.as_str())
    }

    /// Rough token estimate (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.turns.iter().map(|t| t.content.len() / 4).sum()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
