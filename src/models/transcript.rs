// API models - Transcript
use serde::{Deserialize, Deserializer, Serialize};

/// One timed utterance. The speaker label is free text, not a foreign key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    #[serde(rename = "speaker_id", default)]
    pub speaker: String,
    /// Start offset in milliseconds
    #[serde(deserialize_with = "de_millis")]
    pub start: u64,
    /// End offset in milliseconds
    #[serde(deserialize_with = "de_millis")]
    pub end: u64,
    pub text: String,
}

impl Segment {
    pub fn new(speaker: impl Into<String>, start: u64, end: u64, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, time_ms: u64) -> bool {
        self.start <= time_ms && time_ms <= self.end
    }
}

/// Offsets come back as integers from the transcription engine but may be floats
fn de_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() && value > 0.0 {
        Ok(value.round() as u64)
    } else {
        Ok(0)
    }
}

/// A completed transcript (`GET /recordings/{id}/transcript`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "content", default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub plain_text: String,
}

impl Transcript {
    /// Rewrite `"<old>:"` line prefixes in the flattened text
    pub fn rename_in_plain_text(&mut self, old_label: &str, new_label: &str) {
        self.plain_text = rename_speaker_lines(&self.plain_text, old_label, new_label);
    }
}

/// `plain_text` holds one `"<speaker>: <text>"` line per segment
pub(crate) fn rename_speaker_lines(text: &str, old_label: &str, new_label: &str) -> String {
    let old_prefix = format!("{}:", old_label);
    let new_prefix = format!("{}:", new_label);
    text.lines()
        .map(|line| match line.strip_prefix(&old_prefix) {
            Some(rest) => format!("{}{}", new_prefix, rest),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Body for `PUT /recordings/{id}/speakers`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeakerRename {
    pub original_speaker_id: String,
    pub new_speaker_id: String,
}

/// Response of a speaker rename; `content` is the authoritative segment list
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpeakerRenameResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub updated_count: usize,
    #[serde(default)]
    pub content: Option<Vec<Segment>>,
}
