//! Chat application module for interactive conversations.
//!
//! This module provides a streaming REPL chat interface built on top of
//! the colloquy client library. It supports:
//!
//! - Streaming responses with real-time token display
//! - Pause/resume of the display without stopping the transfer
//! - Ctrl+C cancellation that keeps the partial reply
//! - Slash commands for session control
//! - Token and cost estimates for the conversation
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`host`]: Conversation state and session lifecycle ownership
//! - [`commands`]: Slash command parsing and handling

mod commands;
mod config;
mod host;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use host::{ChatHost, SessionStats};
