//! The UI boundary of the chat core.
//!
//! The chat processor and session coordinator never touch a UI directly; they
//! drive a [`ChatDisplay`]. This module provides the trait plus two
//! implementations: [`PlainTextDisplay`] for terminals and [`MemoryDisplay`]
//! for headless embedding and tests.

use std::io::{self, Write};

use time::OffsetDateTime;
use time::macros::format_description;

use crate::types::Sender;

/// ANSI escape code for dim text (used for the thinking placeholder).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for system messages).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for sender labels).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for error messages).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape sequence that returns to column zero and erases the line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

/// Opaque reference to one displayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(u64);

impl MessageHandle {
    /// Creates a handle from a display-assigned id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The display-assigned id.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Capabilities the chat core needs from a UI.
///
/// One implementation exists per UI technology. Handles are only meaningful
/// to the display that issued them; a display that has been cleared reports
/// its old handles as unknown through [`has_message`](Self::has_message).
pub trait ChatDisplay: Send {
    /// Shows a new message and returns its handle.
    fn add_message(
        &mut self,
        sender: &Sender,
        text: &str,
        is_thinking: bool,
        timestamp: Option<OffsetDateTime>,
    ) -> MessageHandle;

    /// Replaces a message's content.
    fn update_message_content(&mut self, handle: MessageHandle, text: &str);

    /// Appends to a message's content.
    fn append_message_content(&mut self, handle: MessageHandle, chunk: &str);

    /// Shows or hides a message's pending indicator.
    fn set_thinking(&mut self, handle: MessageHandle, thinking: bool);

    /// Converts a message in place into an error message with the given text.
    fn fail_message(&mut self, handle: MessageHandle, text: &str);

    /// Returns true if the handle still refers to a displayed message.
    fn has_message(&self, handle: MessageHandle) -> bool;

    /// Removes a message.
    fn remove_message(&mut self, handle: MessageHandle);

    /// Removes every message.
    fn clear_messages(&mut self);

    /// Scrolls so the newest content is visible.
    fn scroll_to_bottom(&mut self) {}

    /// Enables or disables user input.
    fn set_input_disabled(&mut self, disabled: bool) {
        _ = disabled;
    }

    /// Called whenever the conversation's session id changes.
    fn notify_session_id_changed(&mut self, session_id: Option<&str>) {
        _ = session_id;
    }
}

///////////////////////////////////////// Terminal /////////////////////////////////////////

#[derive(Debug)]
struct TerminalMessage {
    handle: MessageHandle,
    sender: Sender,
    text: String,
    thinking: bool,
    empty: bool,
}

/// Plain text display with optional ANSI styling.
///
/// Messages are written to stdout as they arrive. A terminal cannot rewrite
/// earlier lines, so only the message on the current line (normally the
/// streaming reply) can be updated in place; updates to older messages are
/// printed as new lines.
///
/// Only messages of the turn in flight are tracked. Once input is re-enabled
/// they are forgotten and their handles report as unknown.
pub struct PlainTextDisplay {
    out: Box<dyn Write + Send>,
    use_color: bool,
    user_label: String,
    bot_label: String,
    next_handle: u64,
    messages: Vec<TerminalMessage>,
    // Message whose text is on the current, unterminated line.
    open: Option<MessageHandle>,
    input_disabled: bool,
}

impl PlainTextDisplay {
    /// Creates a new PlainTextDisplay with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextDisplay with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            out: Box::new(io::stdout()),
            use_color,
            user_label: "You".to_string(),
            bot_label: "Bot".to_string(),
            next_handle: 0,
            messages: Vec::new(),
            open: None,
            input_disabled: false,
        }
    }

    /// Sets the labels printed for user and bot messages.
    pub fn with_labels(mut self, user_label: impl Into<String>, bot_label: impl Into<String>) -> Self {
        self.user_label = user_label.into();
        self.bot_label = bot_label.into();
        self
    }

    /// Sends output somewhere other than stdout.
    pub fn with_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.out = Box::new(writer);
        self
    }

    /// Prints an informational line outside of the conversation.
    ///
    /// A message still being written on the current line is erased, and
    /// redrawn below the info line so it can keep updating in place.
    pub fn print_info(&mut self, info: &str) {
        let interrupted = self.open.take();
        if interrupted.is_some() {
            self.emit(ANSI_CLEAR_LINE);
        }
        let line = if self.use_color {
            format!("{ANSI_DIM}{info}{ANSI_RESET}\n")
        } else {
            format!("{info}\n")
        };
        self.emit(&line);
        if let Some(handle) = interrupted {
            self.redraw(handle);
        }
        self.flush();
    }

    fn emit(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
    }

    /// Flushes output to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn close_open_line(&mut self) {
        if self.open.take().is_some() {
            self.emit("\n");
        }
    }

    fn label(&self, sender: &Sender) -> String {
        match sender {
            Sender::User => self.user_label.clone(),
            Sender::Bot => self.bot_label.clone(),
            Sender::System => "System".to_string(),
            Sender::Error => "Error".to_string(),
            Sender::Named(name) => name.clone(),
        }
    }

    fn prefix(&self, sender: &Sender, timestamp: Option<OffsetDateTime>) -> String {
        let stamp = timestamp
            .and_then(|t| t.format(format_description!("[hour]:[minute]")).ok())
            .map(|t| format!("[{t}] "))
            .unwrap_or_default();
        let label = self.label(sender);
        if self.use_color {
            let color = if sender.is_error() { ANSI_RED } else { ANSI_CYAN };
            format!("{stamp}{color}{label}:{ANSI_RESET} ")
        } else {
            format!("{stamp}{label}: ")
        }
    }

    fn styled(&self, sender: &Sender, text: &str) -> String {
        if !self.use_color {
            return text.to_string();
        }
        match sender {
            Sender::Error => format!("{ANSI_RED}{text}{ANSI_RESET}"),
            Sender::System => format!("{ANSI_ITALIC}{text}{ANSI_RESET}"),
            _ => text.to_string(),
        }
    }

    fn thinking_text(&self, text: &str) -> String {
        if self.use_color {
            format!("{ANSI_DIM}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn find(&self, handle: MessageHandle) -> Option<&TerminalMessage> {
        self.messages.iter().find(|m| m.handle == handle)
    }

    fn find_mut(&mut self, handle: MessageHandle) -> Option<&mut TerminalMessage> {
        self.messages.iter_mut().find(|m| m.handle == handle)
    }

    fn render(&self, message: &TerminalMessage, timestamp: Option<OffsetDateTime>) -> String {
        let body = if message.thinking {
            self.thinking_text(&message.text)
        } else {
            self.styled(&message.sender, &message.text)
        };
        format!("{}{body}", self.prefix(&message.sender, timestamp))
    }

    // Prints a tracked message on a fresh current line.
    fn redraw(&mut self, handle: MessageHandle) {
        let Some(line) = self.find(handle).map(|m| self.render(m, None)) else {
            return;
        };
        self.emit(&line);
        self.open = Some(handle);
    }

    fn rewrite_open(&mut self, handle: MessageHandle) {
        if self.open == Some(handle) {
            self.emit(ANSI_CLEAR_LINE);
        } else {
            self.close_open_line();
        }
        self.redraw(handle);
        self.flush();
    }
}

impl Default for PlainTextDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatDisplay for PlainTextDisplay {
    fn add_message(
        &mut self,
        sender: &Sender,
        text: &str,
        is_thinking: bool,
        timestamp: Option<OffsetDateTime>,
    ) -> MessageHandle {
        self.next_handle += 1;
        let handle = MessageHandle(self.next_handle);
        self.close_open_line();
        if !self.input_disabled {
            // Nothing outside a turn updates a message after the next one.
            self.messages.clear();
        }
        let message = TerminalMessage {
            handle,
            sender: sender.clone(),
            text: text.to_string(),
            thinking: is_thinking,
            empty: text.is_empty(),
        };
        let line = self.render(&message, timestamp);
        self.messages.push(message);
        self.emit(&line);
        self.open = Some(handle);
        self.flush();
        handle
    }

    fn update_message_content(&mut self, handle: MessageHandle, text: &str) {
        let Some(message) = self.find_mut(handle) else {
            return;
        };
        message.text = text.to_string();
        message.empty = text.is_empty();
        if message.thinking {
            // The pending indicator is still showing; it is replaced when
            // `set_thinking(false)` rewrites the line.
            return;
        }
        self.rewrite_open(handle);
    }

    fn append_message_content(&mut self, handle: MessageHandle, chunk: &str) {
        let Some(message) = self.find_mut(handle) else {
            return;
        };
        message.text.push_str(chunk);
        message.empty &= chunk.is_empty();
        if self.open != Some(handle) {
            self.rewrite_open(handle);
            return;
        }
        self.emit(chunk);
        self.flush();
    }

    fn set_thinking(&mut self, handle: MessageHandle, thinking: bool) {
        let Some(message) = self.find_mut(handle) else {
            return;
        };
        let was_thinking = message.thinking;
        message.thinking = thinking;
        if was_thinking && !thinking && self.open == Some(handle) {
            let prefix = self.prefix(&Sender::Bot, None);
            self.emit(&format!("{ANSI_CLEAR_LINE}{prefix}"));
            self.flush();
        }
    }

    fn fail_message(&mut self, handle: MessageHandle, text: &str) {
        let Some(message) = self.find_mut(handle) else {
            return;
        };
        let replace_line = message.thinking || message.empty;
        message.sender = Sender::Error;
        message.text = text.to_string();
        message.thinking = false;
        message.empty = false;
        if replace_line && self.open == Some(handle) {
            self.emit(ANSI_CLEAR_LINE);
            self.open = None;
        } else {
            self.close_open_line();
        }
        let line = format!(
            "{}{}\n",
            self.prefix(&Sender::Error, None),
            self.styled(&Sender::Error, text)
        );
        self.emit(&line);
        self.flush();
    }

    fn has_message(&self, handle: MessageHandle) -> bool {
        self.find(handle).is_some()
    }

    fn remove_message(&mut self, handle: MessageHandle) {
        self.messages.retain(|m| m.handle != handle);
        if self.open == Some(handle) {
            self.emit(ANSI_CLEAR_LINE);
            self.open = None;
            self.flush();
        }
    }

    fn clear_messages(&mut self) {
        self.close_open_line();
        self.messages.clear();
    }

    fn scroll_to_bottom(&mut self) {
        self.flush();
    }

    fn set_input_disabled(&mut self, disabled: bool) {
        self.input_disabled = disabled;
        if !disabled {
            self.close_open_line();
            self.messages.clear();
            self.flush();
        }
    }

    fn notify_session_id_changed(&mut self, session_id: Option<&str>) {
        let info = match session_id {
            Some(id) => format!("[session: {id}]"),
            None => "[session cleared]".to_string(),
        };
        self.print_info(&info);
    }
}

///////////////////////////////////////// Memory /////////////////////////////////////////

/// A message held by a [`MemoryDisplay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedMessage {
    /// Handle issued for this message.
    pub handle: MessageHandle,
    /// Who the message is attributed to.
    pub sender: Sender,
    /// Current content.
    pub text: String,
    /// Whether the pending indicator is showing.
    pub thinking: bool,
    /// Whether the message was converted into an error in place.
    pub failed: bool,
    /// Timestamp supplied when the message was added.
    pub timestamp: Option<OffsetDateTime>,
}

impl DisplayedMessage {
    /// Returns true for messages shown as errors.
    pub fn is_error(&self) -> bool {
        self.failed || self.sender.is_error()
    }
}

/// A headless display that records every message and side effect.
#[derive(Debug, Default)]
pub struct MemoryDisplay {
    messages: Vec<DisplayedMessage>,
    next_handle: u64,
    input_disabled: bool,
    session_changes: Vec<Option<String>>,
    scrolls: usize,
    clears: usize,
}

impl MemoryDisplay {
    /// Creates an empty display.
    pub fn new() -> Self {
        Self::default()
    }

    /// The messages currently displayed, in display order.
    pub fn messages(&self) -> &[DisplayedMessage] {
        &self.messages
    }

    /// The messages currently shown as errors.
    pub fn errors(&self) -> Vec<&DisplayedMessage> {
        self.messages.iter().filter(|m| m.is_error()).collect()
    }

    /// The most recent message, if any.
    pub fn last(&self) -> Option<&DisplayedMessage> {
        self.messages.last()
    }

    /// Whether input is currently disabled.
    pub fn input_disabled(&self) -> bool {
        self.input_disabled
    }

    /// Every session id reported through `notify_session_id_changed`, in order.
    pub fn session_changes(&self) -> &[Option<String>] {
        &self.session_changes
    }

    /// How many times the display was scrolled to the bottom.
    pub fn scroll_count(&self) -> usize {
        self.scrolls
    }

    /// How many times the display was cleared.
    pub fn clear_count(&self) -> usize {
        self.clears
    }

    fn find_mut(&mut self, handle: MessageHandle) -> Option<&mut DisplayedMessage> {
        self.messages.iter_mut().find(|m| m.handle == handle)
    }
}

impl ChatDisplay for MemoryDisplay {
    fn add_message(
        &mut self,
        sender: &Sender,
        text: &str,
        is_thinking: bool,
        timestamp: Option<OffsetDateTime>,
    ) -> MessageHandle {
        self.next_handle += 1;
        let handle = MessageHandle(self.next_handle);
        self.messages.push(DisplayedMessage {
            handle,
            sender: sender.clone(),
            text: text.to_string(),
            thinking: is_thinking,
            failed: false,
            timestamp,
        });
        handle
    }

    fn update_message_content(&mut self, handle: MessageHandle, text: &str) {
        if let Some(message) = self.find_mut(handle) {
            message.text = text.to_string();
        }
    }

    fn append_message_content(&mut self, handle: MessageHandle, chunk: &str) {
        if let Some(message) = self.find_mut(handle) {
            message.text.push_str(chunk);
        }
    }

    fn set_thinking(&mut self, handle: MessageHandle, thinking: bool) {
        if let Some(message) = self.find_mut(handle) {
            message.thinking = thinking;
        }
    }

    fn fail_message(&mut self, handle: MessageHandle, text: &str) {
        if let Some(message) = self.find_mut(handle) {
            message.text = text.to_string();
            message.thinking = false;
            message.failed = true;
        }
    }

    fn has_message(&self, handle: MessageHandle) -> bool {
        self.messages.iter().any(|m| m.handle == handle)
    }

    fn remove_message(&mut self, handle: MessageHandle) {
        self.messages.retain(|m| m.handle != handle);
    }

    fn clear_messages(&mut self) {
        self.clears += 1;
        self.messages.clear();
    }

    fn scroll_to_bottom(&mut self) {
        self.scrolls += 1;
    }

    fn set_input_disabled(&mut self, disabled: bool) {
        self.input_disabled = disabled;
    }

    fn notify_session_id_changed(&mut self, session_id: Option<&str>) {
        self.session_changes.push(session_id.map(str::to_string));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        // What a terminal would show: each line after its last erase.
        fn visible_lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .split('\n')
                .map(|line| line.rsplit(ANSI_CLEAR_LINE).next().unwrap_or("").to_string())
                .filter(|line| !line.is_empty())
                .collect()
        }
    }

    #[test]
    fn display_default_has_color() {
        let display = PlainTextDisplay::new();
        assert!(display.use_color);
    }

    #[test]
    fn display_without_color() {
        let display = PlainTextDisplay::with_color(false).with_labels("Me", "Flow");
        assert!(!display.use_color);
        assert_eq!(display.prefix(&Sender::User, None), "Me: ");
        assert_eq!(display.prefix(&Sender::Bot, None), "Flow: ");
        assert_eq!(
            display.prefix(&Sender::Named("Ada".to_string()), None),
            "Ada: "
        );
    }

    #[test]
    fn terminal_handles_survive_until_cleared() {
        let mut display = PlainTextDisplay::with_color(false).with_writer(Captured::default());
        let handle = display.add_message(&Sender::User, "hi", false, None);
        assert!(display.has_message(handle));
        display.remove_message(handle);
        assert!(!display.has_message(handle));

        let handle = display.add_message(&Sender::Bot, "Thinking...", true, None);
        display.clear_messages();
        assert!(!display.has_message(handle));
    }

    #[test]
    fn session_notice_mid_turn_redraws_the_placeholder() {
        let out = Captured::default();
        let mut display = PlainTextDisplay::with_color(false).with_writer(out.clone());
        display.add_message(&Sender::User, "hi", false, None);
        display.set_input_disabled(true);
        let handle = display.add_message(&Sender::Bot, "Thinking...", true, None);

        display.notify_session_id_changed(Some("s1"));
        display.set_thinking(handle, false);
        display.update_message_content(handle, "Hel");
        display.append_message_content(handle, "lo");
        display.set_input_disabled(false);

        assert_eq!(
            out.visible_lines(),
            vec!["You: hi", "[session: s1]", "Bot: Hello"]
        );
    }

    #[test]
    fn info_between_chunks_keeps_the_reply_on_one_line() {
        let out = Captured::default();
        let mut display = PlainTextDisplay::with_color(false).with_writer(out.clone());
        display.set_input_disabled(true);
        let handle = display.add_message(&Sender::Bot, "Thinking...", true, None);
        display.set_thinking(handle, false);
        display.update_message_content(handle, "Hel");
        display.print_info("[session: s2]");
        display.append_message_content(handle, "lo");
        display.set_input_disabled(false);

        assert_eq!(out.visible_lines(), vec!["[session: s2]", "Bot: Hello"]);
    }

    #[test]
    fn terminal_forgets_settled_messages() {
        let mut display = PlainTextDisplay::with_color(false).with_writer(Captured::default());
        for i in 0..100 {
            display.add_message(&Sender::System, &format!("line {i}"), false, None);
        }
        assert_eq!(display.messages.len(), 1);

        let user = display.add_message(&Sender::User, "hi", false, None);
        display.set_input_disabled(true);
        let placeholder = display.add_message(&Sender::Bot, "Thinking...", true, None);
        assert!(display.has_message(user));
        assert!(display.has_message(placeholder));

        display.set_input_disabled(false);
        assert!(display.messages.is_empty());
        assert!(!display.has_message(placeholder));
    }

    #[test]
    fn memory_display_records_mutations() {
        let mut display = MemoryDisplay::new();
        let handle = display.add_message(&Sender::Bot, "Thinking...", true, None);
        display.set_thinking(handle, false);
        display.update_message_content(handle, "Hel");
        display.append_message_content(handle, "lo");
        assert_eq!(display.last().unwrap().text, "Hello");
        assert!(!display.last().unwrap().thinking);

        display.fail_message(handle, "Stream Error: reset");
        assert_eq!(display.errors().len(), 1);

        display.remove_message(handle);
        assert!(display.messages().is_empty());
        assert!(!display.has_message(handle));
    }

    #[test]
    fn memory_display_ignores_stale_handles() {
        let mut display = MemoryDisplay::new();
        let stale = display.add_message(&Sender::Bot, "old", false, None);
        display.clear_messages();
        display.update_message_content(stale, "new");
        display.fail_message(stale, "boom");
        assert!(display.messages().is_empty());
        assert_eq!(display.clear_count(), 1);
    }
}
