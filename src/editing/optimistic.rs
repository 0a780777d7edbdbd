//! Apply locally, commit remotely, reconcile on rejection
//!
//! Each edited field implements [`OptimisticEdit`] over borrowed view state;
//! [`commit_optimistic`] drives the sequence. Only the speaker rename mutates
//! local state before the request and therefore needs a reconcile step.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::models::{Minutes, Recording, RecordingId, RecordingUpdate, SpeakerRename, SpeakerRenameResponse};
use crate::speakers::SpeakerPalette;
use crate::transcript::SegmentStore;

/// Wire format of `created_at` edits
const DATE_WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Accepted input formats for a date edit, tried in order
const DATE_INPUT_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// How a commit trigger ended, as reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Still editing (multiline Enter, or nothing to commit)
    Ignored,
    /// Same value as before; no request made
    Unchanged,
    /// Refused locally (blank or unparsable); no request made
    Rejected,
    Saved,
    /// Server refused or the request failed
    Failed,
}

#[async_trait]
pub trait OptimisticEdit: Send + Sync {
    /// What the server returns on success
    type Confirmed: Send;

    /// Field name for logs and notifications
    fn field(&self) -> &'static str;

    /// Local mutation made before the request
    fn apply(&mut self) {}

    async fn commit(&self) -> Result<Self::Confirmed>;

    /// Replace local state with the confirmed value
    fn accept(&mut self, confirmed: Self::Confirmed);

    /// Restore authoritative state after the server refused the change
    async fn reconcile(&mut self) {}
}

/// Run one optimistic edit. Last writer wins: a reconcile overwrites any
/// local change made while the request was in flight.
pub async fn commit_optimistic<E: OptimisticEdit>(edit: &mut E) -> Result<()> {
    edit.apply();
    match edit.commit().await {
        Ok(confirmed) => {
            edit.accept(confirmed);
            log::info!("Saved {}", edit.field());
            Ok(())
        }
        Err(e) => {
            log::warn!("Saving {} failed: {}", edit.field(), e);
            edit.reconcile().await;
            Err(e)
        }
    }
}

/// Bulk speaker relabel across every segment of a transcript
pub struct SpeakerRenameEdit<'a> {
    api: &'a ApiClient,
    recording_id: RecordingId,
    old_label: String,
    new_label: String,
    store: &'a mut SegmentStore,
    palette: &'a mut SpeakerPalette,
}

impl<'a> SpeakerRenameEdit<'a> {
    pub fn new(
        api: &'a ApiClient,
        recording_id: RecordingId,
        old_label: impl Into<String>,
        new_label: impl Into<String>,
        store: &'a mut SegmentStore,
        palette: &'a mut SpeakerPalette,
    ) -> Self {
        Self {
            api,
            recording_id,
            old_label: old_label.into(),
            new_label: new_label.into(),
            store,
            palette,
        }
    }
}

#[async_trait]
impl<'a> OptimisticEdit for SpeakerRenameEdit<'a> {
    type Confirmed = SpeakerRenameResponse;

    fn field(&self) -> &'static str {
        "speaker name"
    }

    fn apply(&mut self) {
        // Copy the color before any lookup can hash the new label
        self.palette.rename(&self.old_label, &self.new_label);
        let changed = self.store.rename_speaker(&self.old_label, &self.new_label);
        log::debug!(
            "Renamed '{}' to '{}' locally in {} segments",
            self.old_label,
            self.new_label,
            changed
        );
    }

    async fn commit(&self) -> Result<SpeakerRenameResponse> {
        let body = SpeakerRename {
            original_speaker_id: self.old_label.clone(),
            new_speaker_id: self.new_label.clone(),
        };
        self.api.rename_speaker(self.recording_id, &body).await
    }

    fn accept(&mut self, confirmed: SpeakerRenameResponse) {
        if let Some(segments) = confirmed.content {
            self.store.set_segments(segments);
        }
    }

    async fn reconcile(&mut self) {
        match self.api.get_transcript(self.recording_id).await {
            Ok(transcript) => self.store.load(transcript),
            Err(e) => log::error!("Failed to reload transcript after rejected rename: {}", e),
        }
    }
}

/// Recording title (`filename`)
pub struct TitleEdit<'a> {
    api: &'a ApiClient,
    recording: &'a mut Recording,
    title: String,
}

impl<'a> TitleEdit<'a> {
    pub fn new(api: &'a ApiClient, recording: &'a mut Recording, title: impl Into<String>) -> Result<Self> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(ClientError::Rejected("Title cannot be empty".to_string()));
        }
        Ok(Self { api, recording, title })
    }
}

#[async_trait]
impl<'a> OptimisticEdit for TitleEdit<'a> {
    type Confirmed = Recording;

    fn field(&self) -> &'static str {
        "title"
    }

    async fn commit(&self) -> Result<Recording> {
        let update = RecordingUpdate {
            filename: Some(self.title.clone()),
            ..Default::default()
        };
        self.api.update_recording(self.recording.id, &update).await
    }

    fn accept(&mut self, confirmed: Recording) {
        *self.recording = confirmed;
    }
}

/// Recording date (`created_at`)
pub struct DateEdit<'a> {
    api: &'a ApiClient,
    recording: &'a mut Recording,
    created_at: NaiveDateTime,
}

impl<'a> DateEdit<'a> {
    /// Fails with [`ClientError::Rejected`] when `input` is not a date
    pub fn new(api: &'a ApiClient, recording: &'a mut Recording, input: &str) -> Result<Self> {
        let created_at = parse_recording_date(input)?;
        Ok(Self { api, recording, created_at })
    }
}

#[async_trait]
impl<'a> OptimisticEdit for DateEdit<'a> {
    type Confirmed = Recording;

    fn field(&self) -> &'static str {
        "date"
    }

    async fn commit(&self) -> Result<Recording> {
        let update = RecordingUpdate {
            created_at: Some(self.created_at.format(DATE_WIRE_FORMAT).to_string()),
            ..Default::default()
        };
        self.api.update_recording(self.recording.id, &update).await
    }

    fn accept(&mut self, confirmed: Recording) {
        *self.recording = confirmed;
    }
}

/// Markdown body of the minutes
pub struct MinutesBodyEdit<'a> {
    api: &'a ApiClient,
    recording_id: RecordingId,
    minutes: &'a mut Option<Minutes>,
    content: String,
}

impl<'a> MinutesBodyEdit<'a> {
    pub fn new(
        api: &'a ApiClient,
        recording_id: RecordingId,
        minutes: &'a mut Option<Minutes>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            api,
            recording_id,
            minutes,
            content: content.into(),
        }
    }
}

#[async_trait]
impl<'a> OptimisticEdit for MinutesBodyEdit<'a> {
    type Confirmed = Minutes;

    fn field(&self) -> &'static str {
        "minutes"
    }

    async fn commit(&self) -> Result<Minutes> {
        self.api.update_minutes(self.recording_id, &self.content).await
    }

    fn accept(&mut self, confirmed: Minutes) {
        *self.minutes = Some(confirmed);
    }
}

/// Parse a user-entered recording date. A bare date means midnight; an
/// RFC 3339 timestamp keeps its wall-clock time.
pub fn parse_recording_date(input: &str) -> Result<NaiveDateTime> {
    let input = input.trim();
    for format in DATE_INPUT_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Ok(parsed.naive_local());
    }
    if let Some(midnight) = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight);
    }
    Err(ClientError::Rejected(format!("Invalid date: {}", input)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counter-backed edit: `value` is the local copy, `server` the source of truth
    struct CounterEdit<'a> {
        value: &'a mut i32,
        server: i32,
        next: i32,
        accept: bool,
        reconciles: &'a AtomicUsize,
    }

    #[async_trait]
    impl<'a> OptimisticEdit for CounterEdit<'a> {
        type Confirmed = i32;

        fn field(&self) -> &'static str {
            "counter"
        }

        fn apply(&mut self) {
            *self.value = self.next;
        }

        async fn commit(&self) -> Result<i32> {
            if self.accept {
                Ok(self.next)
            } else {
                Err(ClientError::Rejected("no".to_string()))
            }
        }

        fn accept(&mut self, confirmed: i32) {
            *self.value = confirmed;
        }

        async fn reconcile(&mut self) {
            self.reconciles.fetch_add(1, Ordering::SeqCst);
            *self.value = self.server;
        }
    }

    #[tokio::test]
    async fn test_success_keeps_optimistic_value() {
        let reconciles = AtomicUsize::new(0);
        let mut value = 1;
        let mut edit = CounterEdit {
            value: &mut value,
            server: 1,
            next: 2,
            accept: true,
            reconciles: &reconciles,
        };
        commit_optimistic(&mut edit).await.unwrap();
        assert_eq!(value, 2);
        assert_eq!(reconciles.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejection_reconciles_from_source() {
        let reconciles = AtomicUsize::new(0);
        let mut value = 1;
        let mut edit = CounterEdit {
            value: &mut value,
            server: 1,
            next: 2,
            accept: false,
            reconciles: &reconciles,
        };
        assert!(commit_optimistic(&mut edit).await.is_err());
        assert_eq!(value, 1);
        assert_eq!(reconciles.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_recording_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_recording_date("2024-03-05 14:30").unwrap(), expected);
        assert_eq!(parse_recording_date("2024-03-05T14:30").unwrap(), expected);
        assert_eq!(parse_recording_date("2024-03-05T14:30:00+08:00").unwrap(), expected);
        assert_eq!(
            parse_recording_date(" 2024-03-05 ").unwrap().format(DATE_WIRE_FORMAT).to_string(),
            "2024-03-05T00:00:00"
        );
        assert!(matches!(parse_recording_date("next tuesday"), Err(ClientError::Rejected(_))));
    }

    #[test]
    fn test_blank_title_is_rejected_before_any_request() {
        let api = ApiClient::new(Default::default()).unwrap();
        let mut recording: Recording = serde_json::from_str(
            r#"{"id": 1, "filename": "a.mp3", "status": "completed"}"#,
        )
        .unwrap();
        assert!(matches!(
            TitleEdit::new(&api, &mut recording, "   "),
            Err(ClientError::Rejected(_))
        ));
    }
}
