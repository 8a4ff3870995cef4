//! The per-turn message state machine.
//!
//! A [`ChatMessageProcessor`] drives one user turn at a time: it shows a
//! placeholder, feeds streamed tokens (or one full response) into it, turns
//! every failure into exactly one visible error message, and reports session
//! ids the backend hands back to the [`SessionCoordinator`].

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::Error;
use crate::chat::config::ChatConfig;
use crate::chat::lifecycle::{TeardownHandle, with_deadline};
use crate::chat::session::SessionCoordinator;
use crate::display::{ChatDisplay, MessageHandle};
use crate::observability::{TURN_DURATION, TURN_ERRORS, TURNS};
use crate::transport::{EventStream, Transport};
use crate::types::{ChatRequest, EndEvent, FlowResponse, Sender, StreamEvent};

/// Final text of a streamed turn that produced no content.
pub const NO_CONTENT_STREAMED: &str = "(no content streamed)";

/// Final text of a full response with neither a reply nor an error.
pub const NO_VALID_RESPONSE: &str = "(no valid response received)";

/// Where the processor is within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Waiting for user input.
    Idle,
    /// The request is being sent.
    Sending,
    /// Consuming a streamed reply.
    Streaming,
    /// Waiting for a complete reply.
    AwaitingFullResponse,
    /// The reply (or its error) is on screen; input is about to be re-enabled.
    Settled,
}

/// How a call to [`ChatMessageProcessor::process`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply was displayed.
    Completed,
    /// The turn ended with the contained error message on screen.
    Failed(String),
    /// Blank input, or a turn was already in progress.
    Ignored,
    /// The session was torn down before the turn settled.
    Aborted,
}

// Per-call state; lives on the stack of one `process` call.
struct TurnContext {
    placeholder: Option<MessageHandle>,
    accumulated: String,
    pending_cleared: bool,
}

impl TurnContext {
    fn new(placeholder: MessageHandle) -> Self {
        Self {
            placeholder: Some(placeholder),
            accumulated: String::new(),
            pending_cleared: false,
        }
    }

    fn apply_token(&mut self, chunk: &str, display: &mut dyn ChatDisplay) {
        self.accumulated.push_str(chunk);
        if let Some(handle) = self.placeholder
            && !chunk.is_empty()
        {
            if self.pending_cleared {
                display.append_message_content(handle, chunk);
            } else {
                display.set_thinking(handle, false);
                display.update_message_content(handle, chunk);
                self.pending_cleared = true;
            }
        }
        display.scroll_to_bottom();
    }

    fn finalize(&mut self, text: &str, display: &mut dyn ChatDisplay) {
        match self.placeholder.take() {
            Some(handle) if display.has_message(handle) => {
                display.set_thinking(handle, false);
                if !(self.pending_cleared && self.accumulated == text) {
                    display.update_message_content(handle, text);
                }
            }
            _ => {
                display.add_message(&Sender::Bot, text, false, None);
            }
        }
        self.pending_cleared = true;
    }

    fn fail(&mut self, text: String, display: &mut dyn ChatDisplay) -> TurnOutcome {
        match self.placeholder.take() {
            Some(handle) if display.has_message(handle) => display.fail_message(handle, &text),
            _ => {
                display.add_message(&Sender::Error, &text, false, None);
            }
        }
        TurnOutcome::Failed(text)
    }
}

/// Drives conversational turns against a [`Transport`].
pub struct ChatMessageProcessor {
    transport: Arc<dyn Transport>,
    config: ChatConfig,
    state: TurnState,
    teardown: TeardownHandle,
}

impl ChatMessageProcessor {
    /// Creates an idle processor.
    pub fn new(transport: Arc<dyn Transport>, config: ChatConfig) -> Self {
        Self {
            transport,
            config,
            state: TurnState::Idle,
            teardown: TeardownHandle::new(),
        }
    }

    /// Shares a teardown flag with this processor.
    pub fn with_teardown(mut self, teardown: TeardownHandle) -> Self {
        self.teardown = teardown;
        self
    }

    /// The current turn state.
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the active configuration for mutation.
    pub fn config_mut(&mut self) -> &mut ChatConfig {
        &mut self.config
    }

    /// Runs one turn for `text`.
    ///
    /// Never fails: transport, protocol, and application errors end up as a
    /// single error message on `display`. Session ids reported by the backend
    /// are handed to `session`.
    pub async fn process(
        &mut self,
        text: &str,
        session: &mut SessionCoordinator,
        display: &mut dyn ChatDisplay,
    ) -> TurnOutcome {
        if self.state != TurnState::Idle {
            warn!(state = ?self.state, "turn already in progress; ignoring input");
            return TurnOutcome::Ignored;
        }
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Ignored;
        }
        if self.teardown.is_torn_down() {
            return TurnOutcome::Aborted;
        }

        let start = Instant::now();
        TURNS.click();
        self.state = TurnState::Sending;
        display.add_message(&Sender::User, text, false, None);
        display.set_input_disabled(true);
        let placeholder =
            display.add_message(&Sender::Bot, &self.config.placeholder_text, true, None);
        display.scroll_to_bottom();

        let mut turn = TurnContext::new(placeholder);
        let request = ChatRequest::new(text, self.config.flow_id.clone())
            .with_session_id(session.current_session_id().map(str::to_string))
            .with_stream(self.config.streaming);
        debug!(
            flow_id = %request.flow_id,
            session_id = request.session_id.as_deref().unwrap_or(""),
            stream = request.stream,
            "sending turn"
        );

        let outcome = if self.config.streaming {
            self.state = TurnState::Streaming;
            self.run_streaming(&request, &mut turn, session, display)
                .await
        } else {
            self.state = TurnState::AwaitingFullResponse;
            self.run_full_response(&request, &mut turn, session, display)
                .await
        };

        self.state = TurnState::Settled;
        if outcome != TurnOutcome::Aborted {
            display.set_input_disabled(false);
            display.scroll_to_bottom();
        }
        TURN_DURATION.add(start.elapsed().as_secs_f64());
        match &outcome {
            TurnOutcome::Failed(message) => {
                TURN_ERRORS.click();
                info!(error = %message, "turn failed");
            }
            TurnOutcome::Aborted => debug!("turn abandoned after teardown"),
            _ => {}
        }
        self.state = TurnState::Idle;
        outcome
    }

    async fn run_streaming(
        &self,
        request: &ChatRequest,
        turn: &mut TurnContext,
        session: &mut SessionCoordinator,
        display: &mut dyn ChatDisplay,
    ) -> TurnOutcome {
        let opened = self
            .teardown
            .run_unless_torn_down(with_deadline(
                self.config.request_timeout,
                "opening the stream",
                self.transport.send_streaming(request),
            ))
            .await;
        let mut stream: EventStream = match opened {
            Err(_) => return TurnOutcome::Aborted,
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return turn.fail(format!("Stream Error: {err}"), display),
        };

        let idle = self.config.stream_idle_timeout;
        loop {
            let next = self
                .teardown
                .run_unless_torn_down(tokio::time::timeout(idle, stream.next()))
                .await;
            let event = match next {
                Err(_) => return TurnOutcome::Aborted,
                Ok(Err(_)) => {
                    let err = Error::timeout(
                        format!("no stream data for {}s", idle.as_secs_f64()),
                        Some(idle.as_secs_f64()),
                    );
                    return turn.fail(format!("Stream Error: {err}"), display);
                }
                Ok(Ok(None)) => {
                    warn!("stream ended without an end event");
                    Self::settle_end(turn, &EndEvent::default(), session, display);
                    return TurnOutcome::Completed;
                }
                Ok(Ok(Some(Err(err)))) => {
                    return turn.fail(format!("Stream Error: {err}"), display);
                }
                Ok(Ok(Some(Ok(event)))) => event,
            };
            match event {
                StreamEvent::StreamStarted(started) => {
                    session.process_session_id_update_from_flow(Some(&started.session_id), display);
                }
                StreamEvent::Token(token) => turn.apply_token(&token.chunk, display),
                StreamEvent::AddMessage(payload) => {
                    debug!(payload = %payload, "ignoring add_message event");
                }
                StreamEvent::Error(error) => return turn.fail(error.display_text(), display),
                StreamEvent::End(end) => {
                    Self::settle_end(turn, &end, session, display);
                    return TurnOutcome::Completed;
                }
                StreamEvent::Other { event, .. } => {
                    debug!(event = %event, "ignoring unknown stream event");
                }
            }
        }
    }

    fn settle_end(
        turn: &mut TurnContext,
        end: &EndEvent,
        session: &mut SessionCoordinator,
        display: &mut dyn ChatDisplay,
    ) {
        let text = match end.reply.as_deref().filter(|reply| !reply.is_empty()) {
            Some(reply) => reply.to_string(),
            None if !turn.accumulated.is_empty() => turn.accumulated.clone(),
            None => NO_CONTENT_STREAMED.to_string(),
        };
        turn.finalize(&text, display);
        session.process_session_id_update_from_flow(end.session_id.as_deref(), display);
    }

    async fn run_full_response(
        &self,
        request: &ChatRequest,
        turn: &mut TurnContext,
        session: &mut SessionCoordinator,
        display: &mut dyn ChatDisplay,
    ) -> TurnOutcome {
        let response = self
            .teardown
            .run_unless_torn_down(with_deadline(
                self.config.request_timeout,
                "waiting for a response",
                self.transport.send(request),
            ))
            .await;
        let response: FlowResponse = match response {
            Err(_) => return TurnOutcome::Aborted,
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return turn.fail(format!("Error: {err}"), display),
        };

        let outcome = if let Some(error) = response.error_text() {
            turn.fail(error, display)
        } else if let Some(reply) = response.reply_text() {
            turn.finalize(reply, display);
            TurnOutcome::Completed
        } else {
            warn!("response carried neither a reply nor an error");
            turn.finalize(NO_VALID_RESPONSE, display);
            TurnOutcome::Completed
        };
        session.process_session_id_update_from_flow(response.session_id.as_deref(), display);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::display::MemoryDisplay;

    #[test]
    fn first_token_replaces_placeholder() {
        let mut display = MemoryDisplay::new();
        let handle = display.add_message(&Sender::Bot, "Thinking...", true, None);
        let mut turn = TurnContext::new(handle);

        turn.apply_token("", &mut display);
        assert_eq!(display.last().unwrap().text, "Thinking...");
        assert!(display.last().unwrap().thinking);

        turn.apply_token("Hel", &mut display);
        turn.apply_token("lo", &mut display);
        let message = display.last().unwrap();
        assert_eq!(message.text, "Hello");
        assert!(!message.thinking);
        assert_eq!(turn.accumulated, "Hello");
        assert_eq!(display.scroll_count(), 3);
    }

    #[test]
    fn finalize_overwrites_with_authoritative_reply() {
        let mut display = MemoryDisplay::new();
        let handle = display.add_message(&Sender::Bot, "Thinking...", true, None);
        let mut turn = TurnContext::new(handle);
        turn.apply_token("Hel", &mut display);
        turn.finalize("Hello there", &mut display);
        assert_eq!(display.last().unwrap().text, "Hello there");
        assert!(turn.placeholder.is_none());
    }

    #[test]
    fn finalize_appends_when_placeholder_is_gone() {
        let mut display = MemoryDisplay::new();
        let handle = display.add_message(&Sender::Bot, "Thinking...", true, None);
        display.clear_messages();
        let mut turn = TurnContext::new(handle);
        turn.finalize("late reply", &mut display);
        assert_eq!(display.messages().len(), 1);
        assert_eq!(display.last().unwrap().text, "late reply");
        assert_eq!(display.last().unwrap().sender, Sender::Bot);
    }

    #[test]
    fn fail_converts_placeholder_in_place() {
        let mut display = MemoryDisplay::new();
        let handle = display.add_message(&Sender::Bot, "Thinking...", true, None);
        let mut turn = TurnContext::new(handle);
        let outcome = turn.fail("Bad input: too long".to_string(), &mut display);
        assert_eq!(outcome, TurnOutcome::Failed("Bad input: too long".to_string()));
        assert_eq!(display.messages().len(), 1);
        assert!(display.last().unwrap().is_error());

        // A second failure has no placeholder left and appends instead.
        turn.fail("again".to_string(), &mut display);
        assert_eq!(display.errors().len(), 2);
        assert_eq!(display.last().unwrap().sender, Sender::Error);
    }
}
