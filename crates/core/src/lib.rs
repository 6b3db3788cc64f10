//! # RelayClaw Core
//!
//! Domain types, traits, and error definitions for the RelayClaw runtime.
//! This crate has **no framework dependencies**: it defines the model every
//! other crate implements against.
//!
//! ## Seams
//!
//! The runtime talks to three kinds of collaborators, each defined here as a
//! trait:
//! - [`Channel`]: an addressable message endpoint (console, chat bridge, ...)
//! - [`Provider`]: a language-model backend that can stream completions
//! - [`Tool`]: a named, schema-described capability the model may invoke

pub mod channel;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelMessage};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{History, Role, ToolCallRequest, Turn};
pub use provider::{CompletionStream, Provider, ProviderRequest, StreamDelta, ToolCallFragment};
pub use schema::{ObjectSchema, SchemaType};
pub use tool::{Tool, ToolCallResult, ToolRegistry};
