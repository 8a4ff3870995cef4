use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One stored message of a session's history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Message text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Raw role recorded by the backend, e.g. `"User"` or `"Machine"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// Display name recorded by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// When the message was stored.
    #[serde(
        default,
        deserialize_with = "crate::utils::time::deserialize_lenient",
        serialize_with = "crate::utils::time::serialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<OffsetDateTime>,
}

impl HistoryEntry {
    /// Creates an entry with a raw sender role and text.
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            sender: Some(sender.into()),
            ..Self::default()
        }
    }

    /// Sets the display name.
    pub fn with_sender_name(mut self, sender_name: impl Into<String>) -> Self {
        self.sender_name = Some(sender_name.into());
        self
    }
}

/// A history response: either a bare array or wrapped under `history`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HistoryListing {
    /// `[...]`
    Entries(Vec<HistoryEntry>),
    /// `{"history": [...]}`
    Wrapped {
        /// The wrapped entries; `null` counts as empty.
        #[serde(default)]
        history: Option<Vec<HistoryEntry>>,
    },
}

impl HistoryListing {
    /// Unwraps the listing into its entries.
    pub fn into_entries(self) -> Vec<HistoryEntry> {
        match self {
            HistoryListing::Entries(entries) => entries,
            HistoryListing::Wrapped { history } => history.unwrap_or_default(),
        }
    }
}
