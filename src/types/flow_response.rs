use serde::{Deserialize, Serialize};

/// The backend's answer to a non-streaming chat request.
///
/// Exactly one of `reply` or `error` is normally present; a response carrying
/// neither is treated as invalid by the chat processor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowResponse {
    /// The flow's reply text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,

    /// Session the reply belongs to.
    #[serde(
        rename = "sessionId",
        alias = "session_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,

    /// Application-level error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Elaboration of `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FlowResponse {
    /// Creates a successful response.
    pub fn reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::default()
        }
    }

    /// Creates an error response.
    pub fn error(error: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            error: Some(error.into()),
            detail,
            ..Self::default()
        }
    }

    /// Sets the session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// The error text shown to the user, if this response is an error.
    ///
    /// Renders as `error` or `error: detail`.
    pub fn error_text(&self) -> Option<String> {
        let error = self.error.as_deref().filter(|e| !e.trim().is_empty())?;
        match self.detail.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(detail) => Some(format!("{error}: {detail}")),
            None => Some(error.to_string()),
        }
    }

    /// The reply text, if non-empty.
    pub fn reply_text(&self) -> Option<&str> {
        self.reply.as_deref().filter(|r| !r.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_camel_case_session() {
        let response: FlowResponse =
            serde_json::from_str(r#"{"reply":"hi","sessionId":"abc"}"#).unwrap();
        assert_eq!(response, FlowResponse::reply("hi").with_session_id("abc"));
    }

    #[test]
    fn error_text_joins_detail() {
        let response: FlowResponse =
            serde_json::from_str(r#"{"error":"Bad input","detail":"too long"}"#).unwrap();
        assert_eq!(response.error_text().as_deref(), Some("Bad input: too long"));
        assert!(response.reply_text().is_none());
    }

    #[test]
    fn empty_fields_are_not_answers() {
        let response: FlowResponse = serde_json::from_str(r#"{"reply":"","error":" "}"#).unwrap();
        assert!(response.reply_text().is_none());
        assert!(response.error_text().is_none());
    }
}
