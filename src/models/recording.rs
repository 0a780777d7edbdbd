// API models - Recording
use serde::{Deserialize, Serialize};

pub type RecordingId = i64;

/// Lifecycle of a recording's transcription job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    Pending,
    Transcribing,
    Completed,
    /// The server reports this state as `error`
    #[serde(alias = "error")]
    Failed,
}

impl RecordingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingStatus::Pending => "pending",
            RecordingStatus::Transcribing => "transcribing",
            RecordingStatus::Completed => "completed",
            RecordingStatus::Failed => "failed",
        }
    }

    /// True while the backend may still make progress on its own
    pub fn is_in_progress(&self) -> bool {
        matches!(self, RecordingStatus::Pending | RecordingStatus::Transcribing)
    }
}

/// A recording (meeting) as returned by `GET /recordings/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recording {
    pub id: RecordingId,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub project_name: Option<String>,
    pub filename: String,
    pub status: RecordingStatus,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub minutes_id: Option<i64>,
}

impl Recording {
    /// Which kind of element should play this recording, if it has media at all
    pub fn media_kind(&self) -> Option<MediaKind> {
        self.media_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(MediaKind::from_url)
    }
}

/// Partial update body for `PUT /recordings/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RecordingUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Element type used to play a recording, inferred from the URL suffix only
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "webm", "mkv", "ogv", "avi"];

impl MediaKind {
    pub fn from_url(url: &str) -> Self {
        // Ignore query string and fragment before looking at the suffix
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file = path.rsplit('/').next().unwrap_or(path);
        let ext = file
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Audio
        }
    }
}
