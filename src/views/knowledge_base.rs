//! Knowledge-base generation
//!
//! A generation run streams `status` events while it works and ends with
//! `done` (new content) or `error`. The content is replaced wholesale; a run
//! that fails leaves the previous knowledge base in place.

use serde::Serialize;
use std::ops::ControlFlow;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::events::{EventBus, UiEvent};
use crate::models::{KnowledgeBase, KnowledgeBaseContent, KnowledgeBaseRequest, ProjectId};
use crate::state::BusyFlag;
use crate::streaming::{consume_sse, AgentEvent};

/// Progress of the current (or last) generation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KbProgress {
    pub generating: bool,
    pub status: Option<String>,
    pub error: Option<String>,
}

/// How a run ended, as seen from the event stream
#[derive(Debug, Clone, PartialEq)]
enum RunEnd {
    Done(Option<KnowledgeBaseContent>),
    Failed(String),
}

pub struct KnowledgeBaseGenerator {
    api: ApiClient,
    project_id: ProjectId,
    content: Option<KnowledgeBase>,
    progress_tx: watch::Sender<KbProgress>,
    busy: BusyFlag,
    token: CancellationToken,
    events: EventBus,
}

impl KnowledgeBaseGenerator {
    pub fn new(api: ApiClient, project_id: ProjectId, events: EventBus, token: CancellationToken) -> Self {
        let (progress_tx, _) = watch::channel(KbProgress::default());
        Self {
            api,
            project_id,
            content: None,
            progress_tx,
            busy: BusyFlag::new(),
            token,
            events,
        }
    }

    pub fn content(&self) -> Option<&KnowledgeBase> {
        self.content.as_ref()
    }

    pub fn progress(&self) -> KbProgress {
        self.progress_tx.borrow().clone()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<KbProgress> {
        self.progress_tx.subscribe()
    }

    /// Load the stored knowledge base; absent is not an error
    pub async fn load(&mut self) -> Result<()> {
        self.content = self.api.get_knowledge_base(self.project_id).await?;
        Ok(())
    }

    /// Run a generation; on success the content is replaced, on failure it is kept
    pub async fn generate(&mut self, request: &KnowledgeBaseRequest) -> Result<()> {
        let _busy = self.busy.acquire()?;
        self.progress_tx.send_replace(KbProgress {
            generating: true,
            status: Some("Starting knowledge base generation...".to_string()),
            error: None,
        });
        log::info!(
            "Generating knowledge base for project {} from {} minutes and {} documents",
            self.project_id,
            request.minutes_ids.len(),
            request.document_ids.len()
        );

        let end = self.run(request).await;

        let result = match end {
            Ok(RunEnd::Done(content)) => {
                match content {
                    Some(content) => {
                        self.content = Some(KnowledgeBase {
                            content,
                            updated_at: None,
                        });
                    }
                    None => {
                        if let Err(e) = self.load().await {
                            log::error!("Failed to reload knowledge base: {}", e);
                        }
                    }
                }
                self.progress_tx.send_replace(KbProgress::default());
                self.events.success("Knowledge base generated");
                self.events.emit(UiEvent::KnowledgeBaseChanged { project_id: self.project_id });
                Ok(())
            }
            Ok(RunEnd::Failed(message)) => Err(ClientError::Stream(message)),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            let message = match e {
                ClientError::Stream(message) => message.clone(),
                other => other.detail(),
            };
            log::error!("Knowledge base generation failed: {}", message);
            self.progress_tx.send_replace(KbProgress {
                generating: false,
                status: None,
                error: Some(message.clone()),
            });
            self.events.error(format!("Knowledge base generation failed: {}", message));
        }
        result
    }

    async fn run(&self, request: &KnowledgeBaseRequest) -> Result<RunEnd> {
        let response = self
            .api
            .generate_knowledge_base_stream(self.project_id, request)
            .await?;

        let progress_tx = &self.progress_tx;
        let mut end: Option<RunEnd> = None;
        let consumed = tokio::select! {
            result = consume_sse(response.bytes_stream(), |raw| {
                let Some(event) = AgentEvent::decode(&raw) else {
                    return ControlFlow::Continue(());
                };
                match apply_kb_event(progress_tx, event) {
                    Some(run_end) => {
                        end = Some(run_end);
                        ControlFlow::Break(())
                    }
                    None => ControlFlow::Continue(()),
                }
            }) => result,
            _ = self.token.cancelled() => Err(ClientError::Stream("view closed".to_string())),
        };
        consumed?;

        Ok(end.unwrap_or_else(|| {
            RunEnd::Failed("Knowledge base generation ended without a result".to_string())
        }))
    }
}

/// Status events update progress; `done` and `error` end the run
fn apply_kb_event(progress_tx: &watch::Sender<KbProgress>, event: AgentEvent) -> Option<RunEnd> {
    match event {
        AgentEvent::Status(status) => {
            crate::hot_debug!("Knowledge base status: {}", status);
            progress_tx.send_modify(|p| p.status = Some(status));
            None
        }
        AgentEvent::Done(content) => Some(RunEnd::Done(content)),
        AgentEvent::Error(message) => Some(RunEnd::Failed(message)),
        AgentEvent::Thought(text) => {
            progress_tx.send_modify(|p| p.status = Some(text));
            None
        }
        other => {
            log::debug!("Ignoring knowledge base event {:?}", other);
            None
        }
    }
}
