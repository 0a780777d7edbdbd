//! MeetMind API client
//!
//! Thin typed wrapper over the backend's HTTP contract. Every non-success
//! response becomes a [`ClientError`] carrying the server's `detail`; callers
//! decide whether that means "not ready yet", "failed", or "unexpected".

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{
    ChatMessage, ChatRequest, ChatSession, Document, Hotword, HotwordsUpdate, KnowledgeBase,
    KnowledgeBaseRequest, Minutes, MinutesUpdate, Project, ProjectId, Recording, RecordingId,
    RecordingUpdate, SpeakerRename, SpeakerRenameResponse, Transcript,
};

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Exportable artifacts of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    Transcript,
    Minutes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Docx,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Docx => "docx",
            ExportFormat::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    /// JSON calls, bounded by the request timeout
    client: Client,
    /// Long-lived body streams; only the connect phase is bounded
    stream_client: Client,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(config.request_timeout())
            .build()?;
        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            config,
            client,
            stream_client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_root(), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send and turn a non-success status into a [`ClientError`]
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        ensure_success(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Like [`Self::send_json`] but a 404 means "nothing there yet"
    async fn send_optional<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        match self.send(request).await {
            Ok(response) => {
                let body = response.text().await?;
                if body.trim().is_empty() || body.trim() == "null" {
                    return Ok(None);
                }
                Ok(Some(serde_json::from_str(&body)?))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send_json(self.client.put(self.url(path)).json(body)).await
    }

    // ===== Recordings =====

    pub async fn get_recording(&self, id: RecordingId) -> Result<Recording> {
        self.send_json(self.client.get(self.url(&format!("/recordings/{}", id)))).await
    }

    pub async fn list_recordings(&self, project_id: ProjectId) -> Result<Vec<Recording>> {
        self.send_json(self.client.get(self.url(&format!("/recordings/project/{}", project_id))))
            .await
    }

    pub async fn update_recording(&self, id: RecordingId, update: &RecordingUpdate) -> Result<Recording> {
        self.put_json(&format!("/recordings/{}", id), update).await
    }

    pub async fn delete_recording(&self, id: RecordingId) -> Result<()> {
        self.send(self.client.delete(self.url(&format!("/recordings/{}", id)))).await?;
        Ok(())
    }

    // ===== Transcripts =====

    /// 404 while transcription runs; 404 with a failure detail once it failed
    pub async fn get_transcript(&self, id: RecordingId) -> Result<Transcript> {
        self.send_json(self.client.get(self.url(&format!("/recordings/{}/transcript", id)))).await
    }

    /// Trigger (or retry) the transcription job
    pub async fn start_transcription(&self, id: RecordingId) -> Result<()> {
        self.send(self.client.post(self.url(&format!("/recordings/{}/transcribe", id)))).await?;
        Ok(())
    }

    pub async fn rename_speaker(
        &self,
        id: RecordingId,
        rename: &SpeakerRename,
    ) -> Result<SpeakerRenameResponse> {
        self.put_json(&format!("/recordings/{}/speakers", id), rename).await
    }

    // ===== Minutes =====

    pub async fn get_minutes(&self, id: RecordingId) -> Result<Option<Minutes>> {
        self.send_optional(self.client.get(self.url(&format!("/recordings/{}/minutes", id)))).await
    }

    pub async fn update_minutes(&self, id: RecordingId, content: &str) -> Result<Minutes> {
        let body = MinutesUpdate {
            content: content.to_string(),
        };
        self.put_json(&format!("/recordings/{}/minutes", id), &body).await
    }

    /// Open the chunked plain-text minutes draft stream
    pub async fn stream_minutes(&self, id: RecordingId, context: &str) -> Result<Response> {
        let request = self
            .stream_client
            .get(self.url(&format!("/recordings/{}/minutes/stream", id)))
            .query(&[("context", context)]);
        self.send(request).await
    }

    /// Download URL, opened by the host in a new browsing context
    pub fn export_url(&self, id: RecordingId, target: ExportTarget, format: ExportFormat) -> String {
        let kind = match target {
            ExportTarget::Transcript => "transcript",
            ExportTarget::Minutes => "minutes",
        };
        self.url(&format!(
            "/recordings/{}/{}/export?format={}",
            id,
            kind,
            format.as_str()
        ))
    }

    // ===== Projects =====

    pub async fn get_project(&self, id: ProjectId) -> Result<Project> {
        self.send_json(self.client.get(self.url(&format!("/projects/{}", id)))).await
    }

    pub async fn update_hotwords(&self, id: ProjectId, hotwords: Vec<Hotword>) -> Result<()> {
        let body = HotwordsUpdate::sanitized(hotwords);
        let request = self
            .client
            .patch(self.url(&format!("/projects/{}/hotwords", id)))
            .json(&body);
        self.send(request).await?;
        Ok(())
    }

    pub async fn list_documents(&self, id: ProjectId) -> Result<Vec<Document>> {
        self.send_json(self.client.get(self.url(&format!("/projects/{}/documents", id)))).await
    }

    pub async fn upload_document(
        &self,
        id: ProjectId,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Document> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self
            .client
            .post(self.url(&format!("/projects/{}/documents", id)))
            .multipart(form);
        self.send_json(request).await
    }

    pub async fn delete_document(&self, id: ProjectId, document_id: i64) -> Result<()> {
        let url = self.url(&format!("/projects/{}/documents/{}", id, document_id));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    // ===== Knowledge base =====

    pub async fn get_knowledge_base(&self, id: ProjectId) -> Result<Option<KnowledgeBase>> {
        self.send_optional(self.client.get(self.url(&format!("/projects/{}/knowledge-base", id))))
            .await
    }

    /// Open the SSE stream of a knowledge-base generation run
    pub async fn generate_knowledge_base_stream(
        &self,
        id: ProjectId,
        request: &KnowledgeBaseRequest,
    ) -> Result<Response> {
        let request = self
            .stream_client
            .post(self.url(&format!("/projects/{}/knowledge-base/generate/stream", id)))
            .json(request);
        self.send(request).await
    }

    // ===== Chat =====

    pub async fn list_chat_sessions(&self, id: ProjectId) -> Result<Vec<ChatSession>> {
        self.send_json(self.client.get(self.url(&format!("/projects/{}/chat/sessions", id)))).await
    }

    pub async fn create_chat_session(&self, id: ProjectId) -> Result<ChatSession> {
        let request = self
            .client
            .post(self.url(&format!("/projects/{}/chat/sessions", id)))
            .json(&serde_json::json!({}));
        self.send_json(request).await
    }

    pub async fn get_chat_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let url = self.url(&format!("/projects/chat/sessions/{}/messages", session_id));
        self.send_json(self.client.get(url)).await
    }

    /// Open the agent's SSE answer stream
    pub async fn chat_stream(&self, id: ProjectId, request: &ChatRequest) -> Result<Response> {
        let request = self
            .stream_client
            .post(self.url(&format!("/projects/{}/chat", id)))
            .json(request);
        self.send(request).await
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::from_response(status, &body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_url() {
        let api = ApiClient::new(ClientConfig::default().with_base_url("http://api:8000/")).unwrap();
        assert_eq!(
            api.export_url(42, ExportTarget::Minutes, ExportFormat::Pdf),
            "http://api:8000/recordings/42/minutes/export?format=pdf"
        );
        assert_eq!(
            api.export_url(7, ExportTarget::Transcript, ExportFormat::Docx),
            "http://api:8000/recordings/7/transcript/export?format=docx"
        );
    }
}
