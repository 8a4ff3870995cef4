//! Conversation identity and the per-widget chat façade.
//!
//! [`SessionCoordinator`] owns the current session id and decides when history
//! must be fetched and replayed. [`ChatSession`] bundles one coordinator with
//! one [`ChatMessageProcessor`] over a shared [`Transport`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chat::config::ChatConfig;
use crate::chat::lifecycle::{TeardownHandle, with_deadline};
use crate::chat::processor::{ChatMessageProcessor, TurnOutcome, TurnState};
use crate::display::ChatDisplay;
use crate::observability::{HISTORY_FETCH_ERRORS, HISTORY_FETCHES};
use crate::transport::Transport;
use crate::types::{HistoryEntry, Sender};

/// The conversation identity shared by every turn of a chat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    id: Option<String>,
    history_loaded: bool,
}

impl Session {
    /// The current session id, if one is established.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether the history of the current session has been loaded.
    pub fn history_loaded(&self) -> bool {
        self.history_loaded
    }
}

fn normalize(id: Option<&str>) -> Option<&str> {
    id.map(str::trim).filter(|id| !id.is_empty())
}

/// Owns the session identity and history replay for one chat.
pub struct SessionCoordinator {
    transport: Arc<dyn Transport>,
    config: ChatConfig,
    session: Session,
    teardown: TeardownHandle,
}

impl SessionCoordinator {
    /// Creates a coordinator with no session.
    pub fn new(transport: Arc<dyn Transport>, config: ChatConfig) -> Self {
        Self {
            transport,
            config,
            session: Session::default(),
            teardown: TeardownHandle::new(),
        }
    }

    /// Shares a teardown flag with this coordinator.
    pub fn with_teardown(mut self, teardown: TeardownHandle) -> Self {
        self.teardown = teardown;
        self
    }

    /// The current session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The current session id, if any.
    pub fn current_session_id(&self) -> Option<&str> {
        self.session.id()
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the active configuration for mutation.
    pub fn config_mut(&mut self) -> &mut ChatConfig {
        &mut self.config
    }

    /// Adopts `id` as the current session.
    ///
    /// Blank ids mean "no session". Returns false and does nothing when the id
    /// is unchanged; otherwise resets the history-loaded flag, notifies the
    /// display once, and returns true.
    pub fn update_current_session_id(
        &mut self,
        id: Option<&str>,
        display: &mut dyn ChatDisplay,
    ) -> bool {
        let id = normalize(id);
        if self.session.id.as_deref() == id {
            return false;
        }
        debug!(
            previous = self.session.id.as_deref().unwrap_or(""),
            session_id = id.unwrap_or(""),
            "session id changed"
        );
        self.session.id = id.map(str::to_string);
        self.session.history_loaded = false;
        display.notify_session_id_changed(id);
        true
    }

    /// Applies a session id reported by the backend during a turn.
    ///
    /// The history of a session the backend just created or continued is
    /// already on screen, so nothing is fetched.
    pub fn process_session_id_update_from_flow(
        &mut self,
        id: Option<&str>,
        display: &mut dyn ChatDisplay,
    ) -> bool {
        if normalize(id).is_none() {
            return false;
        }
        self.update_current_session_id(id, display)
    }

    /// Switches to `id` and replays its history.
    ///
    /// A blank or absent id starts a fresh conversation. Switching to the
    /// current session is a no-op once its history is loaded. Failures are
    /// shown on the display and never returned.
    pub async fn set_session_id_and_load_history(
        &mut self,
        id: Option<&str>,
        display: &mut dyn ChatDisplay,
    ) {
        if self.teardown.is_torn_down() {
            debug!("session torn down; ignoring session switch");
            return;
        }
        let Some(id) = normalize(id) else {
            self.update_current_session_id(None, display);
            display.clear_messages();
            self.show_welcome(display);
            self.session.history_loaded = true;
            return;
        };
        if self.session.id.as_deref() == Some(id) && self.session.history_loaded {
            debug!(session_id = id, "history already loaded");
            return;
        }
        self.update_current_session_id(Some(id), display);

        HISTORY_FETCHES.click();
        let fetched = self
            .teardown
            .run_unless_torn_down(with_deadline(
                self.config.request_timeout,
                "history fetch",
                self.transport.fetch_history(id),
            ))
            .await;
        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(abort) => {
                debug!(session_id = id, error = %abort, "history fetch abandoned");
                return;
            }
        };
        match fetched {
            Ok(entries) if entries.is_empty() => {
                debug!(session_id = id, "session has no history");
                display.clear_messages();
                self.show_welcome(display);
            }
            Ok(entries) => {
                info!(session_id = id, count = entries.len(), "replaying history");
                display.clear_messages();
                for entry in &entries {
                    let sender = self.sender_for(entry);
                    display.add_message(
                        &sender,
                        entry.text.as_deref().unwrap_or_default(),
                        false,
                        entry.timestamp,
                    );
                }
                display.scroll_to_bottom();
            }
            Err(err) => {
                HISTORY_FETCH_ERRORS.click();
                warn!(session_id = id, error = %err, "failed to load history");
                display.add_message(
                    &Sender::Error,
                    &format!("Failed to load history: {err}"),
                    false,
                    None,
                );
            }
        }
        self.session.history_loaded = true;
    }

    /// Decides who a stored history entry is attributed to.
    ///
    /// A display name equal to a configured label wins over the raw role.
    pub fn sender_for(&self, entry: &HistoryEntry) -> Sender {
        let name = entry
            .sender_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        if let Some(name) = name {
            if name == self.config.user_label {
                return Sender::User;
            }
            if name == self.config.bot_label {
                return Sender::Bot;
            }
        }
        let role = entry.sender.as_deref().map(str::trim).unwrap_or_default();
        if role.eq_ignore_ascii_case("user") {
            Sender::User
        } else if role.eq_ignore_ascii_case("bot") || role.eq_ignore_ascii_case("machine") {
            Sender::Bot
        } else if let Some(name) = name {
            Sender::Named(name.to_string())
        } else {
            Sender::System
        }
    }

    fn show_welcome(&self, display: &mut dyn ChatDisplay) {
        if let Some(welcome) = &self.config.welcome_message {
            display.add_message(&Sender::System, welcome, false, None);
        }
    }
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The flow requests are sent to.
    pub flow_id: String,
    /// The current session id, if any.
    pub session_id: Option<String>,
    /// Whether the current session's history is loaded.
    pub history_loaded: bool,
    /// Whether turns are streamed.
    pub streaming: bool,
    /// Turns processed so far.
    pub turns: u64,
    /// Turns that ended with an error message.
    pub failed_turns: u64,
    /// Whether the session has been torn down.
    pub torn_down: bool,
}

/// One chat conversation: a processor and a coordinator sharing a transport.
///
/// Instances share no mutable state with each other; several can run side by
/// side over one transport.
pub struct ChatSession {
    processor: ChatMessageProcessor,
    coordinator: SessionCoordinator,
    teardown: TeardownHandle,
    turns: u64,
    failed_turns: u64,
}

impl ChatSession {
    /// Creates a new chat session over `transport`.
    pub fn new(transport: Arc<dyn Transport>, config: ChatConfig) -> Self {
        let teardown = TeardownHandle::new();
        let processor = ChatMessageProcessor::new(Arc::clone(&transport), config.clone())
            .with_teardown(teardown.clone());
        let coordinator = SessionCoordinator::new(transport, config).with_teardown(teardown.clone());
        Self {
            processor,
            coordinator,
            teardown,
            turns: 0,
            failed_turns: 0,
        }
    }

    /// Sends one user message and drives the turn to completion.
    pub async fn send(&mut self, text: &str, display: &mut dyn ChatDisplay) -> TurnOutcome {
        let outcome = self
            .processor
            .process(text, &mut self.coordinator, display)
            .await;
        match outcome {
            TurnOutcome::Completed => self.turns += 1,
            TurnOutcome::Failed(_) => {
                self.turns += 1;
                self.failed_turns += 1;
            }
            TurnOutcome::Ignored | TurnOutcome::Aborted => {}
        }
        outcome
    }

    /// Switches to a session and replays its history.
    pub async fn set_session_id_and_load_history(
        &mut self,
        id: Option<&str>,
        display: &mut dyn ChatDisplay,
    ) {
        self.coordinator
            .set_session_id_and_load_history(id, display)
            .await;
    }

    /// Tears the session down; pending network results are discarded.
    pub fn teardown(&self) {
        self.teardown.tear_down();
    }

    /// Returns true once the session has been torn down.
    pub fn is_torn_down(&self) -> bool {
        self.teardown.is_torn_down()
    }

    /// A handle that tears this session down from elsewhere, e.g. a signal handler.
    pub fn teardown_handle(&self) -> TeardownHandle {
        self.teardown.clone()
    }

    /// The current session id, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.coordinator.current_session_id()
    }

    /// The current session state.
    pub fn session(&self) -> &Session {
        self.coordinator.session()
    }

    /// The processor's turn state.
    pub fn state(&self) -> TurnState {
        self.processor.state()
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ChatConfig {
        self.processor.config()
    }

    /// Enables or disables streaming for subsequent turns.
    pub fn set_streaming(&mut self, streaming: bool) {
        self.processor.config_mut().streaming = streaming;
        self.coordinator.config_mut().streaming = streaming;
    }

    /// Returns true if turns are streamed.
    pub fn streaming(&self) -> bool {
        self.processor.config().streaming
    }

    /// Changes the flow subsequent turns are sent to.
    pub fn set_flow_id(&mut self, flow_id: impl Into<String>) {
        let flow_id = flow_id.into();
        self.coordinator.config_mut().flow_id = flow_id.clone();
        self.processor.config_mut().flow_id = flow_id;
    }

    /// Returns the flow turns are sent to.
    pub fn flow_id(&self) -> &str {
        &self.processor.config().flow_id
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            flow_id: self.flow_id().to_string(),
            session_id: self.session_id().map(str::to_string),
            history_loaded: self.session().history_loaded(),
            streaming: self.streaming(),
            turns: self.turns,
            failed_turns: self.failed_turns,
            torn_down: self.is_torn_down(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use crate::display::MemoryDisplay;
    use crate::transport::EventStream;
    use crate::types::{ChatRequest, FlowListing, FlowResponse};
    use crate::{Error, Result};

    #[derive(Default)]
    struct HistoryOnly {
        history: Mutex<Vec<Result<Vec<HistoryEntry>>>>,
        fetches: Mutex<Vec<String>>,
    }

    impl HistoryOnly {
        fn with(responses: Vec<Result<Vec<HistoryEntry>>>) -> Arc<Self> {
            Arc::new(Self {
                history: Mutex::new(responses),
                fetches: Mutex::new(Vec::new()),
            })
        }

        fn fetches(&self) -> Vec<String> {
            self.fetches.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Transport for HistoryOnly {
        async fn send(&self, _: &ChatRequest) -> Result<FlowResponse> {
            Err(Error::unknown("not used"))
        }

        async fn send_streaming(&self, _: &ChatRequest) -> Result<EventStream> {
            Err(Error::unknown("not used"))
        }

        async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>> {
            self.fetches.lock().unwrap().push(session_id.to_string());
            let mut history = self.history.lock().unwrap();
            if history.is_empty() {
                Ok(Vec::new())
            } else {
                history.remove(0)
            }
        }

        async fn list_flows(&self) -> Result<FlowListing> {
            Err(Error::unknown("not used"))
        }
    }

    fn coordinator(transport: Arc<HistoryOnly>) -> SessionCoordinator {
        SessionCoordinator::new(transport, ChatConfig::new())
    }

    #[test]
    fn blank_ids_normalize_to_none() {
        let mut coordinator = coordinator(HistoryOnly::with(vec![]));
        let mut display = MemoryDisplay::new();
        assert!(!coordinator.update_current_session_id(Some("   "), &mut display));
        assert!(display.session_changes().is_empty());

        assert!(coordinator.update_current_session_id(Some(" s1 "), &mut display));
        assert_eq!(coordinator.current_session_id(), Some("s1"));
        assert!(!coordinator.update_current_session_id(Some("s1"), &mut display));
        assert!(coordinator.update_current_session_id(Some(""), &mut display));
        assert_eq!(coordinator.current_session_id(), None);
        assert_eq!(
            display.session_changes(),
            &[Some("s1".to_string()), None]
        );
    }

    #[test]
    fn flow_updates_never_clear_the_session() {
        let mut coordinator = coordinator(HistoryOnly::with(vec![]));
        let mut display = MemoryDisplay::new();
        assert!(coordinator.process_session_id_update_from_flow(Some("s1"), &mut display));
        assert!(!coordinator.process_session_id_update_from_flow(None, &mut display));
        assert!(!coordinator.process_session_id_update_from_flow(Some(""), &mut display));
        assert_eq!(coordinator.current_session_id(), Some("s1"));
        assert!(!coordinator.session().history_loaded());
    }

    #[test]
    fn sender_reconciliation_precedence() {
        let config = ChatConfig::new().with_labels("Ada", "Helper");
        let coordinator = SessionCoordinator::new(HistoryOnly::with(vec![]), config);

        let entry = HistoryEntry::new("Machine", "x").with_sender_name("Ada");
        assert_eq!(coordinator.sender_for(&entry), Sender::User);
        let entry = HistoryEntry::new("User", "x").with_sender_name("Helper");
        assert_eq!(coordinator.sender_for(&entry), Sender::Bot);
        let entry = HistoryEntry::new("USER", "x").with_sender_name("Grace");
        assert_eq!(coordinator.sender_for(&entry), Sender::User);
        let entry = HistoryEntry::new("machine", "x");
        assert_eq!(coordinator.sender_for(&entry), Sender::Bot);
        let entry = HistoryEntry::new("Bot", "x");
        assert_eq!(coordinator.sender_for(&entry), Sender::Bot);
        let entry = HistoryEntry::new("agent", "x").with_sender_name("Grace");
        assert_eq!(
            coordinator.sender_for(&entry),
            Sender::Named("Grace".to_string())
        );
        assert_eq!(coordinator.sender_for(&HistoryEntry::default()), Sender::System);
    }

    #[tokio::test]
    async fn replays_history_once() {
        let transport = HistoryOnly::with(vec![Ok(vec![
            HistoryEntry::new("User", "hi"),
            HistoryEntry::new("Machine", "hello"),
        ])]);
        let mut coordinator = coordinator(Arc::clone(&transport));
        let mut display = MemoryDisplay::new();
        display.add_message(&Sender::System, "stale", false, None);

        coordinator
            .set_session_id_and_load_history(Some("s1"), &mut display)
            .await;
        let texts: Vec<_> = display.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hi", "hello"]);
        assert_eq!(display.messages()[0].sender, Sender::User);
        assert_eq!(display.messages()[1].sender, Sender::Bot);
        assert_eq!(display.clear_count(), 1);
        assert_eq!(display.scroll_count(), 1);
        assert!(coordinator.session().history_loaded());

        coordinator
            .set_session_id_and_load_history(Some("s1"), &mut display)
            .await;
        assert_eq!(transport.fetches(), vec!["s1".to_string()]);
        assert_eq!(display.clear_count(), 1);
    }

    #[tokio::test]
    async fn empty_history_shows_welcome() {
        let config = ChatConfig::new().with_welcome_message(Some("Welcome!".to_string()));
        let mut coordinator = SessionCoordinator::new(HistoryOnly::with(vec![Ok(vec![])]), config);
        let mut display = MemoryDisplay::new();
        coordinator
            .set_session_id_and_load_history(Some("s1"), &mut display)
            .await;
        assert_eq!(display.messages().len(), 1);
        assert_eq!(display.messages()[0].sender, Sender::System);
        assert_eq!(display.messages()[0].text, "Welcome!");
        assert!(coordinator.session().history_loaded());
    }

    #[tokio::test]
    async fn blank_id_starts_fresh_without_fetching() {
        let transport = HistoryOnly::with(vec![]);
        let mut coordinator = coordinator(Arc::clone(&transport));
        let mut display = MemoryDisplay::new();
        coordinator.update_current_session_id(Some("s1"), &mut display);
        display.add_message(&Sender::Bot, "old", false, None);

        coordinator
            .set_session_id_and_load_history(Some("  "), &mut display)
            .await;
        assert!(transport.fetches().is_empty());
        assert_eq!(coordinator.current_session_id(), None);
        assert!(coordinator.session().history_loaded());
        assert!(display.messages().is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_shows_one_error_and_marks_loaded() {
        let transport = HistoryOnly::with(vec![Err(Error::connection("refused", None))]);
        let mut coordinator = coordinator(Arc::clone(&transport));
        let mut display = MemoryDisplay::new();
        coordinator
            .set_session_id_and_load_history(Some("s1"), &mut display)
            .await;
        assert_eq!(display.errors().len(), 1);
        assert!(display.errors()[0].text.starts_with("Failed to load history: "));
        assert!(coordinator.session().history_loaded());

        coordinator
            .set_session_id_and_load_history(Some("s1"), &mut display)
            .await;
        assert_eq!(transport.fetches().len(), 1);
    }

    #[tokio::test]
    async fn torn_down_coordinator_does_nothing() {
        let transport = HistoryOnly::with(vec![]);
        let teardown = TeardownHandle::new();
        let mut coordinator = coordinator(Arc::clone(&transport)).with_teardown(teardown.clone());
        let mut display = MemoryDisplay::new();
        teardown.tear_down();
        coordinator
            .set_session_id_and_load_history(Some("s1"), &mut display)
            .await;
        assert!(transport.fetches().is_empty());
        assert!(display.session_changes().is_empty());
    }
}
