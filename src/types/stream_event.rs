use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::FlowResponse;

/// Payload of a `stream_started` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStartedEvent {
    /// The session the backend attached this turn to.
    #[serde(rename = "sessionId", alias = "session_id")]
    pub session_id: String,
}

/// Payload of a `token` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEvent {
    /// The incremental piece of response text.
    pub chunk: String,
}

/// Payload of an `end` record, lifted out of its `flowResponse` envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndEvent {
    /// Authoritative final reply, when the backend sends one.
    pub reply: Option<String>,
    /// Session id reported with the final reply.
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
struct EndData {
    #[serde(rename = "flowResponse", alias = "flow_response", default)]
    flow_response: Option<FlowResponse>,
}

impl EndEvent {
    fn from_data(data: Value) -> serde_json::Result<Self> {
        if data.is_null() {
            return Ok(Self::default());
        }
        let data: EndData = serde_json::from_value(data)?;
        Ok(match data.flow_response {
            Some(response) => Self {
                reply: response.reply,
                session_id: response.session_id,
            },
            None => Self::default(),
        })
    }
}

/// Payload of an `error` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Human-readable error message.
    #[serde(default)]
    pub message: String,
    /// Optional elaboration of the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Optional numeric error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

impl ErrorEvent {
    /// Creates an error event with no detail or code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
            code: None,
        }
    }

    /// Attaches a detail string.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The text shown to the user: `message` or `message: detail`.
    pub fn display_text(&self) -> String {
        let message = if self.message.trim().is_empty() {
            "Unknown error"
        } else {
            self.message.as_str()
        };
        match self.detail.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(detail) => format!("{message}: {detail}"),
            None => message.to_string(),
        }
    }
}

/// One decoded record from a flow's NDJSON stream.
///
/// Records arrive as `{"event": <name>, "data": <payload>}`, one per line.
/// Events are delivered in wire order: usually `stream_started`, any number of
/// `token` and `add_message` records, and finally `end` or `error`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The backend accepted the turn and names its session.
    StreamStarted(StreamStartedEvent),

    /// An incremental piece of the reply.
    Token(TokenEvent),

    /// An auxiliary message emitted by a flow component.
    ///
    /// The payload is kept verbatim; consumers currently only log it.
    AddMessage(Value),

    /// The turn finished.
    End(EndEvent),

    /// The backend reported an error, or a record could not be decoded.
    Error(ErrorEvent),

    /// A well-formed record with an event name this crate does not know.
    Other {
        /// The record's event name.
        event: String,
        /// The record's raw data.
        data: Value,
    },
}

#[derive(Deserialize)]
struct RawRecord {
    event: String,
    #[serde(default)]
    data: Value,
}

impl StreamEvent {
    /// Parses one complete record.
    pub fn from_record(record: &str) -> serde_json::Result<Self> {
        let raw: RawRecord = serde_json::from_str(record)?;
        Self::from_parts(raw.event, raw.data)
    }

    fn from_parts(event: String, data: Value) -> serde_json::Result<Self> {
        match event.as_str() {
            "stream_started" => Ok(StreamEvent::StreamStarted(serde_json::from_value(data)?)),
            "token" => Ok(StreamEvent::Token(serde_json::from_value(data)?)),
            "add_message" => Ok(StreamEvent::AddMessage(data)),
            "end" => Ok(StreamEvent::End(EndEvent::from_data(data)?)),
            "error" => {
                if data.is_null() {
                    Ok(StreamEvent::Error(ErrorEvent::new("")))
                } else {
                    Ok(StreamEvent::Error(serde_json::from_value(data)?))
                }
            }
            _ => Ok(StreamEvent::Other { event, data }),
        }
    }

    /// The wire name of this event.
    pub fn name(&self) -> &str {
        match self {
            StreamEvent::StreamStarted(_) => "stream_started",
            StreamEvent::Token(_) => "token",
            StreamEvent::AddMessage(_) => "add_message",
            StreamEvent::End(_) => "end",
            StreamEvent::Error(_) => "error",
            StreamEvent::Other { event, .. } => event,
        }
    }

    /// Returns true for `error` events.
    pub fn is_error(&self) -> bool {
        matches!(self, StreamEvent::Error(_))
    }
}
