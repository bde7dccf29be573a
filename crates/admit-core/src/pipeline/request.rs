use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("malformed JSON body: {0}")]
    Malformed(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("message {0} has no content object")]
    MissingContent(usize),
}

/// One chat message. Only `content` is inspected.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub content: Option<Map<String, Value>>,
}

/// Body of an audit request.
///
/// ```json
/// {"action": "next", "model": "gpt-4", "messages": [{"content": {"parts": ["hi"]}}]}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AuditRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
}

impl AuditRequest {
    /// Decodes and validates a request body.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if the body is not a JSON object of the expected shape, a
    /// required field is missing or empty, or a message lacks a `content` object.
    pub fn from_slice(body: &[u8]) -> Result<Self, RequestError> {
        let request: Self =
            serde_json::from_slice(body).map_err(|e| RequestError::Malformed(e.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    /// # Errors
    ///
    /// See [`AuditRequest::from_slice`].
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.action.is_empty() {
            return Err(RequestError::MissingField("action"));
        }
        if self.model.is_empty() {
            return Err(RequestError::MissingField("model"));
        }

        let messages = self.messages.as_ref().ok_or(RequestError::MissingField("messages"))?;
        if let Some(index) = messages.iter().position(|m| m.content.is_none()) {
            return Err(RequestError::MissingContent(index));
        }

        Ok(())
    }

    /// Text subject to content audit: the first string part of the first message, or
    /// empty when there is none.
    #[must_use]
    pub fn prompt(&self) -> &str {
        self.messages
            .as_deref()
            .and_then(<[Message]>::first)
            .and_then(|message| message.content.as_ref())
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .and_then(|parts| parts.first())
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}
