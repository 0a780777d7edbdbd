// API models - Chat
use serde::{Deserialize, Deserializer, Serialize};

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A tool invocation reported by the assistant while it works
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolAction {
    pub tool: String,
    #[serde(default)]
    pub query: String,
}

/// A chat message. Assistant messages accept streamed updates only while
/// `streaming` is set; once frozen every mutator is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Client-side key for the rendering layer
    #[serde(skip_serializing, default = "new_local_id")]
    pub local_id: String,
    pub role: ChatRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub thoughts: Vec<String>,
    #[serde(default)]
    pub actions: Vec<ToolAction>,
    #[serde(skip)]
    pub streaming: bool,
}

fn new_local_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            local_id: new_local_id(),
            role: ChatRole::User,
            content: content.into(),
            thoughts: Vec::new(),
            actions: Vec::new(),
            streaming: false,
        }
    }

    /// Empty assistant placeholder that receives streamed events
    pub fn assistant_streaming() -> Self {
        Self {
            local_id: new_local_id(),
            role: ChatRole::Assistant,
            content: String::new(),
            thoughts: Vec::new(),
            actions: Vec::new(),
            streaming: true,
        }
    }

    pub fn push_thought(&mut self, thought: impl Into<String>) {
        if self.streaming {
            self.thoughts.push(thought.into());
        }
    }

    pub fn push_action(&mut self, action: ToolAction) {
        if self.streaming {
            self.actions.push(action);
        }
    }

    /// Answer text arrives incrementally and is always appended
    pub fn append_content(&mut self, chunk: &str) {
        if self.streaming {
            self.content.push_str(chunk);
        }
    }

    /// Visible error annotation; streaming continues afterwards
    pub fn append_error(&mut self, message: &str) {
        if self.streaming {
            if !self.content.is_empty() && !self.content.ends_with('\n') {
                self.content.push('\n');
            }
            self.content.push_str(&format!("\n> **Error:** {}\n", message));
        }
    }

    pub fn freeze(&mut self) {
        self.streaming = false;
    }
}

/// A chat session scoped to a project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    #[serde(deserialize_with = "de_id_string")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Body for `POST /projects/{id}/chat`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub query: String,
    pub session_id: Option<String>,
}

/// Session ids are integers on some deployments and strings on others
pub(crate) fn de_id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frozen_message_ignores_updates() {
        let mut msg = ChatMessage::assistant_streaming();
        msg.append_content("Hel");
        msg.append_content("lo");
        msg.push_thought("checking minutes");
        msg.freeze();
        msg.append_content(" world");
        msg.push_action(ToolAction { tool: "search".into(), query: "q".into() });
        assert_eq!(msg.content, "Hello");
        assert_eq!(msg.thoughts, vec!["checking minutes".to_string()]);
        assert!(msg.actions.is_empty());
    }

    #[test]
    fn test_error_annotation_keeps_partial_content() {
        let mut msg = ChatMessage::assistant_streaming();
        msg.append_content("Partial answer");
        msg.append_error("Agent step limit reached");
        assert!(msg.content.starts_with("Partial answer\n"));
        assert!(msg.content.contains("**Error:** Agent step limit reached"));
    }

    #[test]
    fn test_session_id_accepts_numbers() {
        let session: ChatSession = serde_json::from_str(r#"{"id": 12, "title": "Budget"}"#).unwrap();
        assert_eq!(session.id, "12");
        let session: ChatSession = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(session.id, "abc");
        assert_eq!(session.title, None);
    }

    #[test]
    fn test_history_message_is_not_streaming() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role": "assistant", "content": "Done"}"#).unwrap();
        assert!(!msg.streaming);
        assert!(!msg.local_id.is_empty());
    }
}
