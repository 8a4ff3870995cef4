use serde::{Deserialize, Serialize};

/// A single user turn sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,

    /// Canonical ID (or still-unresolved alias) of the flow to run.
    #[serde(rename = "flowId")]
    pub flow_id: String,

    /// Session to continue, if one is established.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Whether the response should be streamed as NDJSON.
    pub stream: bool,
}

impl ChatRequest {
    /// Creates a non-streaming request with no session.
    pub fn new(message: impl Into<String>, flow_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            flow_id: flow_id.into(),
            session_id: None,
            stream: false,
        }
    }

    /// Sets the session to continue.
    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Sets whether the response is streamed.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_wire_names() {
        let request = ChatRequest::new("hi", "flow-1")
            .with_session_id(Some("s1".to_string()))
            .with_stream(true);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"message": "hi", "flowId": "flow-1", "sessionId": "s1", "stream": true})
        );
    }

    #[test]
    fn omits_absent_session() {
        let request = ChatRequest::new("hi", "flow-1");
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("sessionId").is_none());
    }
}
