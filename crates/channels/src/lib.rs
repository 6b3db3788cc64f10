//! Channel implementations for RelayClaw.
//!
//! Each channel connects an endpoint to the agent. Channels are trait-based
//! and endpoint-agnostic.
//!
//! Available pieces:
//! - **Console**: Interactive terminal chat (stdin/stdout), streaming
//! - **Telegram**: Bot API long polling, whole replies only
//! - **Multiplexer**: Merged inbound queue and name-addressed outbound routing

pub mod console;
pub mod multiplexer;
pub mod telegram;

pub use console::ConsoleChannel;
pub use multiplexer::{ChannelMultiplexer, MessageInjector};
pub use telegram::TelegramChannel;
