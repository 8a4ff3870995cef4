//! Conversational turns against a flow backend.
//!
//! This module provides the chat core on top of the flowchat transport:
//!
//! - One turn at a time, streamed token by token or as a full response
//! - A thinking placeholder that becomes the reply or an error in place
//! - Session identity tracking and history replay
//! - Slash commands for the bundled REPL
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`processor`]: The per-turn message state machine
//! - [`session`]: Session identity, history replay, and the chat façade
//! - [`commands`]: Slash command parsing and handling

mod commands;
mod config;
mod lifecycle;
pub mod processor;
pub mod session;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use lifecycle::TeardownHandle;
pub use processor::{
    ChatMessageProcessor, NO_CONTENT_STREAMED, NO_VALID_RESPONSE, TurnOutcome, TurnState,
};
pub use session::{ChatSession, Session, SessionCoordinator, SessionStats};
