//! Project view
//!
//! Lists a project's recordings and reference documents, edits its hotwords,
//! and owns the project assistant chat and the knowledge-base generator.

use crate::api::{ApiClient, ExportFormat, ExportTarget};
use crate::error::{ClientError, Result};
use crate::events::EventBus;
use crate::models::{Document, Hotword, KnowledgeBaseRequest, Project, ProjectId, Recording, RecordingId};
use crate::state::TaskScope;
use crate::views::chat::ProjectChat;
use crate::views::knowledge_base::KnowledgeBaseGenerator;

pub struct ProjectView {
    api: ApiClient,
    project_id: ProjectId,
    project: Option<Project>,
    recordings: Vec<Recording>,
    documents: Vec<Document>,
    chat: ProjectChat,
    kb: KnowledgeBaseGenerator,
    events: EventBus,
    scope: TaskScope,
}

impl ProjectView {
    pub fn new(api: ApiClient, project_id: ProjectId, events: EventBus) -> Self {
        let scope = TaskScope::new();
        let chat = ProjectChat::new(api.clone(), project_id, events.clone(), scope.token().child_token());
        let kb = KnowledgeBaseGenerator::new(api.clone(), project_id, events.clone(), scope.token().child_token());
        Self {
            api,
            project_id,
            project: None,
            recordings: Vec::new(),
            documents: Vec::new(),
            chat,
            kb,
            events,
            scope,
        }
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn chat(&self) -> &ProjectChat {
        &self.chat
    }

    pub fn chat_mut(&mut self) -> &mut ProjectChat {
        &mut self.chat
    }

    pub fn knowledge_base(&self) -> &KnowledgeBaseGenerator {
        &self.kb
    }

    pub fn knowledge_base_mut(&mut self) -> &mut KnowledgeBaseGenerator {
        &mut self.kb
    }

    /// Load the project itself; the secondary lists degrade to toasts
    pub async fn load(&mut self) -> Result<()> {
        let project = match self.api.get_project(self.project_id).await {
            Ok(project) => project,
            Err(e) => {
                log::error!("Failed to load project {}: {}", self.project_id, e);
                self.events.error(format!("Failed to load project: {}", e.detail()));
                return Err(e);
            }
        };
        log::info!("Loaded project {} '{}'", project.id, project.name);
        self.project = Some(project);

        self.refresh_recordings().await;
        self.refresh_documents().await;
        self.chat.refresh_sessions().await;
        if let Err(e) = self.kb.load().await {
            log::error!("Failed to load knowledge base: {}", e);
            self.events.error("Failed to load knowledge base");
        }
        Ok(())
    }

    pub async fn refresh_recordings(&mut self) {
        match self.api.list_recordings(self.project_id).await {
            Ok(recordings) => self.recordings = recordings,
            Err(e) => {
                log::error!("Failed to load recordings: {}", e);
                self.events.error("Failed to load recordings");
            }
        }
    }

    pub async fn refresh_documents(&mut self) {
        match self.api.list_documents(self.project_id).await {
            Ok(documents) => self.documents = documents,
            Err(e) => {
                log::error!("Failed to load documents: {}", e);
                self.events.error("Failed to load documents");
            }
        }
    }

    pub async fn upload_document(&mut self, filename: &str, bytes: Vec<u8>) -> Result<Document> {
        if filename.trim().is_empty() {
            return Err(ClientError::Rejected("Document needs a file name".to_string()));
        }
        log::info!("Uploading document '{}' ({} bytes)", filename, bytes.len());
        match self.api.upload_document(self.project_id, filename, bytes).await {
            Ok(document) => {
                self.documents.push(document.clone());
                self.events.success(format!("Uploaded {}", document.filename));
                Ok(document)
            }
            Err(e) => {
                self.events.error(format!("Upload failed: {}", e.detail()));
                Err(e)
            }
        }
    }

    pub async fn delete_document(&mut self, document_id: i64) -> Result<()> {
        match self.api.delete_document(self.project_id, document_id).await {
            Ok(()) => {
                self.documents.retain(|d| d.id != document_id);
                self.events.success("Document deleted");
                Ok(())
            }
            Err(e) => {
                self.events.error(format!("Delete failed: {}", e.detail()));
                Err(e)
            }
        }
    }

    pub async fn delete_recording(&mut self, recording_id: RecordingId) -> Result<()> {
        match self.api.delete_recording(recording_id).await {
            Ok(()) => {
                self.recordings.retain(|r| r.id != recording_id);
                self.events.success("Recording deleted");
                Ok(())
            }
            Err(e) => {
                self.events.error(format!("Delete failed: {}", e.detail()));
                Err(e)
            }
        }
    }

    /// Save the hotword list, then refetch the project so the list matches the server
    pub async fn update_hotwords(&mut self, hotwords: Vec<Hotword>) -> Result<()> {
        if let Err(e) = self.api.update_hotwords(self.project_id, hotwords).await {
            self.events.error(format!("Failed to save hotwords: {}", e.detail()));
            return Err(e);
        }
        match self.api.get_project(self.project_id).await {
            Ok(project) => self.project = Some(project),
            Err(e) => log::error!("Failed to reload project after hotword update: {}", e),
        }
        self.events.success("Hotwords saved");
        Ok(())
    }

    /// Every recording with minutes plus every document
    pub fn default_kb_request(&self) -> KnowledgeBaseRequest {
        KnowledgeBaseRequest {
            minutes_ids: self.recordings.iter().filter_map(|r| r.minutes_id).collect(),
            document_ids: self.documents.iter().map(|d| d.id).collect(),
        }
    }

    pub async fn generate_knowledge_base(&mut self) -> Result<()> {
        let request = self.default_kb_request();
        if request.minutes_ids.is_empty() && request.document_ids.is_empty() {
            self.events.info("Nothing to build a knowledge base from yet");
            return Err(ClientError::Rejected(
                "Project has no minutes or documents".to_string(),
            ));
        }
        self.kb.generate(&request).await
    }

    pub fn export_url(&self, recording_id: RecordingId, target: ExportTarget, format: ExportFormat) -> String {
        self.api.export_url(recording_id, target, format)
    }

    /// Cancel the chat and knowledge-base streams
    pub fn close(&self) {
        log::debug!("Closing project view {}", self.project_id);
        self.scope.close();
    }
}

impl Drop for ProjectView {
    fn drop(&mut self) {
        self.scope.close();
    }
}
