//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the flow.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Switch to a session and replay its history.
    /// `None` shows the current session id.
    Session(Option<String>),

    /// Start a fresh conversation with no session.
    New,

    /// Enable or disable streaming.
    Stream(bool),

    /// Send subsequent turns to another flow.
    Flow(String),

    /// Display session statistics.
    Status,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use flowchat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/session 5d1c").is_some());
/// assert!(parse_command("Hello!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "session" => ChatCommand::Session(argument.map(|s| s.to_string())),
        "new" | "clear" => ChatCommand::New,
        "stream" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::Stream(value),
            None => ChatCommand::Invalid("/stream expects 'on' or 'off'".to_string()),
        },
        "flow" => match argument {
            Some(flow) => ChatCommand::Flow(flow.to_string()),
            None => ChatCommand::Invalid("/flow requires a flow id or name".to_string()),
        },
        "status" | "stats" => ChatCommand::Status,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /session [id]          Resume a session and load its history (no argument shows it)
  /new                   Start a new conversation
  /stream on|off         Stream replies token by token, or wait for them
  /flow <id>             Send messages to another flow (id, alias, or name)
  /status                Show session status
  /help                  Show this help message
  /quit                  Exit the chat"#
}
