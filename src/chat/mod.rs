//! The chat application: one conversation with a model, driven from a REPL.
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: the conversation, its turns and the UI affordances around it
//! - [`persistence`]: the stored user and saved conversation
//! - [`commands`]: slash command parsing

mod commands;
mod config;
mod persistence;
mod session;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, ConfigFile, DEFAULT_SYSTEM_INSTRUCTION};
pub use persistence::{CONVERSATION_KEY, SessionPersistence, USER_KEY};
pub use session::{
    CANCELLED_TEXT, ChatSession, ERROR_TEXT, LoadOutcome, PLACEHOLDER_TEXT, SaveOutcome,
    SessionStats, TurnOutcome, TurnPhase,
};
