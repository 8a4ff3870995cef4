//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::time::Duration;

use arrrg_derive::CommandLine;

/// Default label for messages typed by the user.
const DEFAULT_USER_LABEL: &str = "You";

/// Default label for messages produced by the flow.
const DEFAULT_BOT_LABEL: &str = "Bot";

/// Default text of the pending-reply placeholder.
const DEFAULT_PLACEHOLDER: &str = "Thinking...";

/// Default deadline for a non-streaming request or for opening a stream.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default deadline between two items of a stream.
const DEFAULT_STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Command-line arguments for the flowchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the backend.
    #[arrrg(optional, "Backend base URL (default: $FLOWCHAT_BASE_URL or local)", "URL")]
    pub base_url: Option<String>,

    /// Flow to chat with, by canonical ID, endpoint alias, or name.
    #[arrrg(optional, "Flow ID, endpoint alias, or name", "FLOW")]
    pub flow: Option<String>,

    /// Session to resume.
    #[arrrg(optional, "Session ID to resume (loads its history)", "SESSION")]
    pub session: Option<String>,

    /// Label for the user's messages.
    #[arrrg(optional, "Label for your messages (default: You)", "LABEL")]
    pub user_label: Option<String>,

    /// Label for the flow's messages.
    #[arrrg(optional, "Label for flow messages (default: Bot)", "LABEL")]
    pub bot_label: Option<String>,

    /// Message shown when a conversation has no history.
    #[arrrg(optional, "Welcome message for empty conversations", "TEXT")]
    pub welcome: Option<String>,

    /// Wait for complete responses instead of streaming.
    #[arrrg(flag, "Disable streaming responses")]
    pub no_stream: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Flow identifier requests are sent to.
    pub flow_id: String,

    /// Whether turns use the streaming path.
    pub streaming: bool,

    /// Display name of the user; also matched against history entries.
    pub user_label: String,

    /// Display name of the flow; also matched against history entries.
    pub bot_label: String,

    /// Text shown in the placeholder while a reply is pending.
    pub placeholder_text: String,

    /// Message shown when a conversation is empty.
    pub welcome_message: Option<String>,

    /// Deadline for a full response, or for a stream to open.
    pub request_timeout: Duration,

    /// Deadline between consecutive stream items.
    pub stream_idle_timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Streaming: enabled
    /// - Labels: `You` / `Bot`
    /// - Placeholder: `Thinking...`
    /// - Welcome message: none
    /// - Request timeout: 60 seconds
    /// - Stream idle timeout: 120 seconds
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            flow_id: String::new(),
            streaming: true,
            user_label: DEFAULT_USER_LABEL.to_string(),
            bot_label: DEFAULT_BOT_LABEL.to_string(),
            placeholder_text: DEFAULT_PLACEHOLDER.to_string(),
            welcome_message: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_idle_timeout: DEFAULT_STREAM_IDLE_TIMEOUT,
            use_color: true,
        }
    }

    /// Sets the flow identifier.
    pub fn with_flow_id(mut self, flow_id: impl Into<String>) -> Self {
        self.flow_id = flow_id.into();
        self
    }

    /// Sets whether turns are streamed.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Sets the user and bot labels.
    pub fn with_labels(mut self, user_label: impl Into<String>, bot_label: impl Into<String>) -> Self {
        self.user_label = user_label.into();
        self.bot_label = bot_label.into();
        self
    }

    /// Sets the placeholder text.
    pub fn with_placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.placeholder_text = text.into();
        self
    }

    /// Sets or clears the welcome message.
    pub fn with_welcome_message(mut self, message: Option<String>) -> Self {
        self.welcome_message = message.filter(|m| !m.trim().is_empty());
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the stream idle timeout.
    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        ChatConfig {
            flow_id: args.flow.unwrap_or_default(),
            streaming: !args.no_stream,
            user_label: args.user_label.unwrap_or(defaults.user_label.clone()),
            bot_label: args.bot_label.unwrap_or(defaults.bot_label.clone()),
            use_color: !args.no_color,
            ..defaults.with_welcome_message(args.welcome)
        }
    }
}
