//! Typed events of the assistant and knowledge-base SSE streams
//!
//! Payloads are JSON. Text events carry `{"content": ...}`; `status` and
//! `error` also accept `message` or `detail`, and a bare JSON string works
//! anywhere text is expected.

use serde_json::Value;

use super::sse::SseEvent;
use crate::models::{KnowledgeBaseContent, ToolAction};

#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Reasoning step shown above the answer
    Thought(String),
    /// Tool invocation `{tool, query}`
    Action(ToolAction),
    /// Incremental answer text
    Answer(String),
    /// Session created server-side for a session-less request
    SessionId(String),
    Error(String),
    /// Knowledge-base progress message
    Status(String),
    /// Knowledge-base run finished; carries the new content when the server
    /// sends it inline
    Done(Option<KnowledgeBaseContent>),
    Unknown(String),
}

/// Keys that may hold the text of a text-like event, in lookup order
const TEXT_KEYS: [&str; 4] = ["content", "message", "detail", "status"];

impl AgentEvent {
    /// Parse one SSE block. Fails only on malformed JSON.
    pub fn parse(raw: &SseEvent) -> Result<Self, serde_json::Error> {
        let name = raw.event.as_str();
        if name == "done" && raw.data.trim().is_empty() {
            return Ok(AgentEvent::Done(None));
        }
        let payload: Value = serde_json::from_str(&raw.data)?;

        let event = match name {
            "thought" => AgentEvent::Thought(text_of(&payload)),
            "action" => AgentEvent::Action(serde_json::from_value(payload)?),
            "answer" => AgentEvent::Answer(text_of(&payload)),
            "session_id" => AgentEvent::SessionId(session_id_of(&payload)),
            "error" => AgentEvent::Error(text_of(&payload)),
            "status" => AgentEvent::Status(text_of(&payload)),
            "done" => AgentEvent::Done(knowledge_base_of(payload)),
            other => AgentEvent::Unknown(other.to_string()),
        };
        Ok(event)
    }

    /// Like [`AgentEvent::parse`] but logs and skips malformed payloads
    pub fn decode(raw: &SseEvent) -> Option<Self> {
        match Self::parse(raw) {
            Ok(event) => Some(event),
            Err(e) => {
                log::warn!("Skipping malformed '{}' event: {}", raw.event, e);
                None
            }
        }
    }
}

fn text_of(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => TEXT_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn session_id_of(payload: &Value) -> String {
    let value = match payload {
        Value::Object(map) => map
            .get("session_id")
            .or_else(|| map.get("id"))
            .unwrap_or(&Value::Null),
        other => other,
    };
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn knowledge_base_of(payload: Value) -> Option<KnowledgeBaseContent> {
    let content = match payload {
        Value::Object(mut map) => match map.remove("content") {
            Some(inner @ Value::Object(_)) => inner,
            _ => Value::Object(map),
        },
        _ => return None,
    };
    serde_json::from_value::<KnowledgeBaseContent>(content)
        .ok()
        .filter(|kb| !kb.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(event: &str, data: &str) -> SseEvent {
        SseEvent {
            event: event.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_chat_events() {
        assert_eq!(
            AgentEvent::parse(&raw("thought", r#"{"content":"searching"}"#)).unwrap(),
            AgentEvent::Thought("searching".to_string())
        );
        assert_eq!(
            AgentEvent::parse(&raw("action", r#"{"tool":"Knowledge Base","query":"budget"}"#)).unwrap(),
            AgentEvent::Action(ToolAction {
                tool: "Knowledge Base".to_string(),
                query: "budget".to_string(),
            })
        );
        assert_eq!(
            AgentEvent::parse(&raw("answer", r#"{"content":"Hi"}"#)).unwrap(),
            AgentEvent::Answer("Hi".to_string())
        );
        assert_eq!(
            AgentEvent::parse(&raw("error", r#"{"content":"Agent step limit reached"}"#)).unwrap(),
            AgentEvent::Error("Agent step limit reached".to_string())
        );
    }

    #[test]
    fn test_session_id_shapes() {
        for data in [r#"{"session_id":"s-1"}"#, r#""s-1""#, r#"{"id":"s-1"}"#] {
            assert_eq!(
                AgentEvent::parse(&raw("session_id", data)).unwrap(),
                AgentEvent::SessionId("s-1".to_string())
            );
        }
        assert_eq!(
            AgentEvent::parse(&raw("session_id", r#"{"session_id":17}"#)).unwrap(),
            AgentEvent::SessionId("17".to_string())
        );
    }

    #[test]
    fn test_knowledge_base_events() {
        assert_eq!(
            AgentEvent::parse(&raw("status", r#"{"message":"Reading minutes"}"#)).unwrap(),
            AgentEvent::Status("Reading minutes".to_string())
        );

        let nested = AgentEvent::parse(&raw("done", r##"{"content":{"prd":"# PRD","timeline":"- Q1"}}"##)).unwrap();
        let AgentEvent::Done(Some(kb)) = nested else {
            panic!("expected inline content");
        };
        assert_eq!(kb.prd, "# PRD");
        assert_eq!(kb.glossary, "");

        let flat = AgentEvent::parse(&raw("done", r#"{"specs":"S"}"#)).unwrap();
        assert!(matches!(flat, AgentEvent::Done(Some(ref kb)) if kb.specs == "S"));

        assert_eq!(AgentEvent::parse(&raw("done", "")).unwrap(), AgentEvent::Done(None));
        assert_eq!(
            AgentEvent::parse(&raw("done", r#"{"status":"completed"}"#)).unwrap(),
            AgentEvent::Done(None)
        );
    }

    #[test]
    fn test_malformed_payload_is_skipped() {
        assert!(AgentEvent::parse(&raw("answer", "{not json")).is_err());
        assert_eq!(AgentEvent::decode(&raw("answer", "{not json")), None);
        assert!(AgentEvent::decode(&raw("action", r#"{"query":"missing tool"}"#)).is_none());
    }

    #[test]
    fn test_unknown_event() {
        assert_eq!(
            AgentEvent::parse(&raw("heartbeat", "{}")).unwrap(),
            AgentEvent::Unknown("heartbeat".to_string())
        );
    }
}
