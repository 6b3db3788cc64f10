//! Conversation orchestration for RelayClaw.
//!
//! - [`assembler`] rebuilds assistant turns from streamed deltas
//! - [`store`] owns the history partitions and serializes exchanges
//! - [`orchestrator`] runs the bounded model/tool loop per message

pub mod assembler;
pub mod orchestrator;
pub mod store;

#[cfg(test)]
mod testing;

pub use assembler::{AssembledTurn, DeltaAssembler};
pub use orchestrator::{ExchangeOutcome, Orchestrator, OrchestratorSettings, PROVIDER_ERROR_NOTICE};
pub use store::ConversationStore;
