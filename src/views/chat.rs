//! Project assistant chat
//!
//! One question at a time: a busy flag refuses a new question while an answer
//! is still streaming. The answer message accepts streamed thoughts, actions
//! and text until the stream ends, then it is frozen.

use std::ops::ControlFlow;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::events::{EventBus, UiEvent};
use crate::models::{ChatMessage, ChatRequest, ChatSession, ProjectId};
use crate::state::BusyFlag;
use crate::streaming::{consume_sse, AgentEvent};

pub struct ProjectChat {
    api: ApiClient,
    project_id: ProjectId,
    session_id: Option<String>,
    sessions: Vec<ChatSession>,
    messages_tx: watch::Sender<Vec<ChatMessage>>,
    busy: BusyFlag,
    token: CancellationToken,
    events: EventBus,
}

impl ProjectChat {
    pub fn new(api: ApiClient, project_id: ProjectId, events: EventBus, token: CancellationToken) -> Self {
        let (messages_tx, _) = watch::channel(Vec::new());
        Self {
            api,
            project_id,
            session_id: None,
            sessions: Vec::new(),
            messages_tx,
            busy: BusyFlag::new(),
            token,
            events,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages_tx.borrow().clone()
    }

    pub fn subscribe_messages(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages_tx.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn subscribe_busy(&self) -> watch::Receiver<bool> {
        self.busy.subscribe()
    }

    pub async fn refresh_sessions(&mut self) {
        match self.api.list_chat_sessions(self.project_id).await {
            Ok(sessions) => {
                self.sessions = sessions;
                self.events.emit(UiEvent::SessionsChanged { project_id: self.project_id });
            }
            Err(e) => log::error!("Failed to load chat sessions: {}", e),
        }
    }

    /// Start over; the server creates a session with the next question
    pub fn new_conversation(&mut self) {
        self.session_id = None;
        self.messages_tx.send_replace(Vec::new());
    }

    /// Create an empty session up front and make it current
    pub async fn create_session(&mut self) -> Result<ChatSession> {
        let session = self.api.create_chat_session(self.project_id).await?;
        self.session_id = Some(session.id.clone());
        self.messages_tx.send_replace(Vec::new());
        self.refresh_sessions().await;
        Ok(session)
    }

    /// Switch to an existing session and load its history
    pub async fn open_session(&mut self, session_id: &str) -> Result<()> {
        let mut history = match self.api.get_chat_messages(session_id).await {
            Ok(history) => history,
            Err(e) => {
                self.events.error("Failed to load chat history");
                return Err(e);
            }
        };
        history.iter_mut().for_each(ChatMessage::freeze);
        self.session_id = Some(session_id.to_string());
        self.messages_tx.send_replace(history);
        Ok(())
    }

    /// Ask a question and stream the answer into the message list
    pub async fn ask(&mut self, query: &str) -> Result<()> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ClientError::Rejected("Question cannot be empty".to_string()));
        }
        let _busy = self.busy.acquire()?;

        self.messages_tx.send_modify(|messages| {
            messages.push(ChatMessage::user(query));
            messages.push(ChatMessage::assistant_streaming());
        });

        let request = ChatRequest {
            query: query.to_string(),
            session_id: self.session_id.clone(),
        };
        log::info!(
            "Asking project {} assistant (session {:?})",
            self.project_id,
            request.session_id
        );

        let result = match self.api.chat_stream(self.project_id, &request).await {
            Ok(response) => {
                let messages_tx = &self.messages_tx;
                let session_id = &mut self.session_id;
                let token = self.token.clone();
                tokio::select! {
                    result = consume_sse(response.bytes_stream(), |raw| {
                        if let Some(event) = AgentEvent::decode(&raw) {
                            apply_agent_event(messages_tx, session_id, event);
                        }
                        ControlFlow::Continue(())
                    }) => result.map(|_| ()),
                    _ = token.cancelled() => Err(ClientError::Stream("view closed".to_string())),
                }
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            log::error!("Chat stream failed: {}", e);
            let message = e.detail();
            update_answer(&self.messages_tx, |answer| answer.append_error(&message));
            self.events.error(format!("Assistant failed: {}", message));
        }
        update_answer(&self.messages_tx, ChatMessage::freeze);

        // Titles are assigned server-side after each turn
        if !self.token.is_cancelled() {
            self.refresh_sessions().await;
        }
        result
    }
}

/// Apply one agent event to the streaming answer
fn apply_agent_event(
    messages_tx: &watch::Sender<Vec<ChatMessage>>,
    session_id: &mut Option<String>,
    event: AgentEvent,
) {
    match event {
        AgentEvent::Thought(thought) => update_answer(messages_tx, |m| m.push_thought(thought)),
        AgentEvent::Action(action) => update_answer(messages_tx, |m| m.push_action(action)),
        AgentEvent::Answer(chunk) => update_answer(messages_tx, |m| m.append_content(&chunk)),
        AgentEvent::Error(message) => {
            log::warn!("Assistant reported an error: {}", message);
            update_answer(messages_tx, |m| m.append_error(&message));
        }
        AgentEvent::SessionId(id) => {
            if session_id.is_none() && !id.is_empty() {
                log::info!("Adopting chat session {}", id);
                *session_id = Some(id);
            }
        }
        AgentEvent::Status(_) | AgentEvent::Done(_) => {}
        AgentEvent::Unknown(name) => log::debug!("Ignoring chat event '{}'", name),
    }
}

/// Mutate the last message if it is a streaming answer
fn update_answer(messages_tx: &watch::Sender<Vec<ChatMessage>>, f: impl FnOnce(&mut ChatMessage)) {
    messages_tx.send_if_modified(|messages| match messages.last_mut() {
        Some(last) if last.streaming => {
            f(last);
            true
        }
        _ => false,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatRole, ToolAction};

    fn streaming_list() -> watch::Sender<Vec<ChatMessage>> {
        let (tx, _) = watch::channel(vec![ChatMessage::user("q"), ChatMessage::assistant_streaming()]);
        tx
    }

    #[test]
    fn test_events_accumulate_on_answer() {
        let tx = streaming_list();
        let mut session = None;
        apply_agent_event(&tx, &mut session, AgentEvent::Thought("look up".to_string()));
        apply_agent_event(
            &tx,
            &mut session,
            AgentEvent::Action(ToolAction { tool: "Minutes".to_string(), query: "budget".to_string() }),
        );
        apply_agent_event(&tx, &mut session, AgentEvent::Answer("Hel".to_string()));
        apply_agent_event(&tx, &mut session, AgentEvent::Answer("lo".to_string()));
        apply_agent_event(&tx, &mut session, AgentEvent::Error("Agent step limit reached".to_string()));
        apply_agent_event(&tx, &mut session, AgentEvent::Answer("!".to_string()));

        let messages = tx.borrow();
        let answer = messages.last().unwrap();
        assert_eq!(answer.role, ChatRole::Assistant);
        assert_eq!(answer.thoughts, vec!["look up"]);
        assert_eq!(answer.actions.len(), 1);
        assert!(answer.content.starts_with("Hello"));
        assert!(answer.content.contains("Agent step limit reached"));
        assert!(answer.content.ends_with('!'));
    }

    #[test]
    fn test_session_id_only_adopted_when_unset() {
        let tx = streaming_list();
        let mut session = None;
        apply_agent_event(&tx, &mut session, AgentEvent::SessionId("s-1".to_string()));
        assert_eq!(session.as_deref(), Some("s-1"));
        apply_agent_event(&tx, &mut session, AgentEvent::SessionId("s-2".to_string()));
        assert_eq!(session.as_deref(), Some("s-1"));
    }

    #[test]
    fn test_frozen_answer_ignores_late_events() {
        let tx = streaming_list();
        let mut session = None;
        update_answer(&tx, ChatMessage::freeze);
        apply_agent_event(&tx, &mut session, AgentEvent::Answer("late".to_string()));
        assert_eq!(tx.borrow().last().unwrap().content, "");
    }
}
