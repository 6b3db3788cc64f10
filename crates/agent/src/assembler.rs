//! Delta assembly: rebuilds one assistant turn from streamed fragments.
//!
//! Text and reasoning are concatenated in arrival order. Tool calls live in
//! slots addressed by assembly index; a fragment for an unseen index grows
//! the slot list, leaving any skipped slots empty.

use relayclaw_core::message::ToolCallRequest;
use relayclaw_core::provider::{StreamDelta, ToolCallFragment, Usage};
use tracing::{debug, warn};

/// Upper bound on tool-call slots per turn. Fragments addressed past it are
/// dropped rather than growing the slot list.
pub const MAX_TOOL_CALL_SLOTS: usize = 128;

/// The finalized content of one streamed response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledTurn {
    pub text: String,
    pub reasoning: String,
    /// Every slot in index order, including empty ones.
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<Usage>,
}

impl AssembledTurn {
    /// The calls worth dispatching.
    ///
    /// Empty slots are dropped. A call without an id gets `call_<index>` and
    /// one without a type gets `function`.
    pub fn dispatchable_calls(&self) -> Vec<ToolCallRequest> {
        self.tool_calls
            .iter()
            .filter(|call| {
                if call.is_empty() {
                    debug!(index = call.index, "Dropping empty tool call slot");
                    false
                } else {
                    true
                }
            })
            .cloned()
            .map(|mut call| {
                if call.id.is_empty() {
                    call.id = format!("call_{}", call.index);
                }
                if call.kind.is_empty() {
                    call.kind = "function".into();
                }
                call
            })
            .collect()
    }
}

/// Accumulates deltas until the stream ends.
#[derive(Debug, Default)]
pub struct DeltaAssembler {
    turn: AssembledTurn,
}

impl DeltaAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: &StreamDelta) {
        match delta {
            StreamDelta::Text(fragment) => self.turn.text.push_str(fragment),
            StreamDelta::Reasoning(fragment) => self.turn.reasoning.push_str(fragment),
            StreamDelta::ToolCall(fragment) => self.push_tool_call(fragment),
            StreamDelta::Usage(usage) => self.turn.usage = Some(*usage),
        }
    }

    fn push_tool_call(&mut self, fragment: &ToolCallFragment) {
        let Some(index) = fragment.index else {
            debug!("Ignoring tool call fragment without an index");
            return;
        };
        if index >= MAX_TOOL_CALL_SLOTS {
            warn!(index, "Ignoring tool call fragment with out-of-range index");
            return;
        }

        let slots = &mut self.turn.tool_calls;
        while slots.len() <= index {
            let next = slots.len();
            slots.push(ToolCallRequest {
                index: next,
                ..ToolCallRequest::default()
            });
        }

        let slot = &mut slots[index];
        if let Some(id) = fragment.id.as_deref().filter(|id| !id.is_empty()) {
            slot.id = id.to_string();
        }
        if let Some(kind) = fragment.kind.as_deref().filter(|k| !k.is_empty()) {
            slot.kind = kind.to_string();
        }
        if let Some(name) = &fragment.name {
            slot.name.push_str(name);
        }
        if let Some(arguments) = &fragment.arguments {
            slot.arguments.push_str(arguments);
        }
    }

    /// Text assembled so far.
    pub fn text(&self) -> &str {
        &self.turn.text
    }

    pub fn finish(self) -> AssembledTurn {
        self.turn
    }
}
