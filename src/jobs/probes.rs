//! Probes for the two jobs a recording view watches

use async_trait::async_trait;

use super::watcher::JobProbe;
use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::models::{Recording, RecordingId, RecordingStatus, Transcript};

/// Waits for `GET /recordings/{id}/transcript` to stop answering 404
pub struct TranscriptProbe {
    api: ApiClient,
    recording_id: RecordingId,
}

impl TranscriptProbe {
    pub fn new(api: ApiClient, recording_id: RecordingId) -> Self {
        Self { api, recording_id }
    }
}

#[async_trait]
impl JobProbe<Transcript> for TranscriptProbe {
    fn name(&self) -> String {
        format!("transcript {}", self.recording_id)
    }

    async fn fetch(&self) -> Result<Transcript> {
        self.api.get_transcript(self.recording_id).await
    }

    async fn restart(&self) -> Result<()> {
        self.api.start_transcription(self.recording_id).await
    }
}

/// Waits for a recording's status to leave `pending`/`transcribing`.
///
/// Status responses are always 200, so in-progress and failed states are
/// mapped onto the same not-found taxonomy the transcript endpoint uses.
pub struct RecordingStatusProbe {
    api: ApiClient,
    recording_id: RecordingId,
}

impl RecordingStatusProbe {
    pub fn new(api: ApiClient, recording_id: RecordingId) -> Self {
        Self { api, recording_id }
    }
}

#[async_trait]
impl JobProbe<Recording> for RecordingStatusProbe {
    fn name(&self) -> String {
        format!("recording {}", self.recording_id)
    }

    async fn fetch(&self) -> Result<Recording> {
        let recording = self.api.get_recording(self.recording_id).await?;
        status_outcome(recording)
    }

    async fn restart(&self) -> Result<()> {
        self.api.start_transcription(self.recording_id).await
    }
}

fn status_outcome(recording: Recording) -> Result<Recording> {
    match recording.status {
        RecordingStatus::Completed => Ok(recording),
        RecordingStatus::Failed => Err(ClientError::NotFound {
            detail: format!(
                "Transcription failed: {}",
                recording.error_message.as_deref().unwrap_or("unknown error")
            ),
        }),
        status => Err(ClientError::NotFound {
            detail: format!("Recording is {}", status.as_str()),
        }),
    }
}
