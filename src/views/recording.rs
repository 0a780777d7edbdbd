//! Recording view
//!
//! Binds the playback controller and the transcript store both ways: media
//! time drives the active segment, and clicking a segment seeks (optionally
//! bounded to that segment) and plays. Also owns the two job watchers, the
//! minutes panel and the inline edits for this recording.

use bytes::Bytes;
use futures_util::Stream;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::watch;

use crate::api::ApiClient;
use crate::editing::{
    commit_optimistic, CommitDecision, DateEdit, EditOutcome, EditTrigger, InlineEdit,
    MinutesBodyEdit, SpeakerRenameEdit, TitleEdit,
};
use crate::error::{ClientError, Result};
use crate::events::{EventBus, UiEvent};
use crate::jobs::{JobWatcher, RecordingStatusProbe, TranscriptProbe, WatchState};
use crate::models::{MediaKind, Minutes, Recording, RecordingId, Transcript};
use crate::playback::{MediaElement, MediaEvent, PlaybackController};
use crate::speakers::{initials_for, SpeakerPalette};
use crate::state::{BusyFlag, TaskScope};
use crate::streaming::{consume_text, StreamBuffer};
use crate::transcript::{SegmentFilter, SegmentStore, SpeakerShare};

/// Appended to a minutes draft when its stream breaks
const STREAM_ERROR_MARKER: &str = "\n\n> **Error:** minutes generation was interrupted.";

/// Persisted minutes plus an in-flight streamed draft
pub struct MinutesPanel {
    persisted: Option<Minutes>,
    draft: StreamBuffer,
    /// While set, the draft is shown instead of the persisted minutes
    show_draft: bool,
    generating: BusyFlag,
}

impl MinutesPanel {
    fn new() -> Self {
        Self {
            persisted: None,
            draft: StreamBuffer::new(),
            show_draft: false,
            generating: BusyFlag::new(),
        }
    }

    /// Markdown to render: the streamed draft wins until it is reconciled
    pub fn content(&self) -> Option<String> {
        if self.show_draft {
            return Some(self.draft.text());
        }
        self.persisted.as_ref().map(|m| m.content.clone())
    }

    pub fn persisted(&self) -> Option<&Minutes> {
        self.persisted.as_ref()
    }

    pub fn is_generating(&self) -> bool {
        self.generating.is_busy()
    }

    /// Text of the last streamed draft, kept until the next generation starts
    pub fn draft(&self) -> String {
        self.draft.text()
    }

    pub fn subscribe_draft(&self) -> watch::Receiver<String> {
        self.draft.subscribe()
    }

    pub fn subscribe_generating(&self) -> watch::Receiver<bool> {
        self.generating.subscribe()
    }
}

/// Speaker label currently being renamed
struct SpeakerEditState {
    label: String,
    edit: InlineEdit,
}

pub struct RecordingView<E: MediaElement> {
    api: ApiClient,
    recording_id: RecordingId,
    recording: Option<Recording>,
    playback: PlaybackController<E>,
    store: SegmentStore,
    palette: SpeakerPalette,
    search: String,
    active_tx: watch::Sender<Option<usize>>,
    transcript_loaded: bool,
    status_watcher: JobWatcher<Recording>,
    transcript_watcher: JobWatcher<Transcript>,
    minutes: MinutesPanel,
    title_edit: InlineEdit,
    date_edit: InlineEdit,
    minutes_edit: InlineEdit,
    speaker_edit: Option<SpeakerEditState>,
    events: EventBus,
    scope: TaskScope,
}

impl<E: MediaElement> RecordingView<E> {
    pub fn new(api: ApiClient, recording_id: RecordingId, events: EventBus) -> Self {
        let scope = TaskScope::new();
        let interval = api.config().poll_interval();
        let keyword = api.config().failure_keyword.clone();

        let status_watcher = JobWatcher::new(
            Arc::new(RecordingStatusProbe::new(api.clone(), recording_id)),
            interval,
            keyword.clone(),
            events.clone(),
        )
        .with_scope(scope.token());
        let transcript_watcher = JobWatcher::new(
            Arc::new(TranscriptProbe::new(api.clone(), recording_id)),
            interval,
            keyword,
            events.clone(),
        )
        .with_scope(scope.token());
        let (active_tx, _) = watch::channel(None);

        Self {
            api,
            recording_id,
            recording: None,
            playback: PlaybackController::new(),
            store: SegmentStore::new(),
            palette: SpeakerPalette::new(),
            search: String::new(),
            active_tx,
            transcript_loaded: false,
            status_watcher,
            transcript_watcher,
            minutes: MinutesPanel::new(),
            title_edit: InlineEdit::single_line(),
            date_edit: InlineEdit::single_line(),
            minutes_edit: InlineEdit::multiline(),
            speaker_edit: None,
            events,
            scope,
        }
    }

    // ===== Loading and jobs =====

    /// Fetch the recording, start whichever watchers are needed and load the
    /// minutes. Only a failure to load the recording itself is returned.
    pub async fn load(&mut self) -> Result<()> {
        let recording = match self.api.get_recording(self.recording_id).await {
            Ok(recording) => recording,
            Err(e) => {
                log::error!("Failed to load recording {}: {}", self.recording_id, e);
                self.events.error(format!("Failed to load recording: {}", e.detail()));
                return Err(e);
            }
        };
        let in_progress = recording.status.is_in_progress();
        self.recording = Some(recording);

        if in_progress {
            self.status_watcher.check().await;
            self.forward_when_resolved(
                "status",
                self.status_watcher.subscribe(),
                UiEvent::RecordingChanged { recording_id: self.recording_id },
            );
        }
        self.transcript_watcher.check().await;
        self.forward_when_resolved(
            "transcript",
            self.transcript_watcher.subscribe(),
            UiEvent::TranscriptChanged { recording_id: self.recording_id },
        );
        self.sync_jobs();

        self.load_minutes().await;
        Ok(())
    }

    /// Emit `event` once the watched job resolves, so the host knows to call
    /// [`Self::sync_jobs`]
    fn forward_when_resolved<T>(&self, name: &str, mut rx: watch::Receiver<WatchState<T>>, event: UiEvent)
    where
        T: Clone + Send + Sync + 'static,
    {
        let events = self.events.clone();
        self.scope.spawn(format!("forward-{}", name), async move {
            loop {
                if rx.borrow_and_update().resolved().is_some() {
                    events.emit(event);
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        });
    }

    /// Pull resolved watcher results into view state. Returns true when the
    /// transcript was loaded by this call.
    pub fn sync_jobs(&mut self) -> bool {
        if let WatchState::Resolved(recording) = self.status_watcher.state() {
            if self.recording.as_ref() != Some(&recording) {
                self.recording = Some(recording);
            }
        }
        if self.transcript_loaded {
            return false;
        }
        let WatchState::Resolved(transcript) = self.transcript_watcher.state() else {
            return false;
        };
        log::info!(
            "Transcript for recording {} loaded: {} segments",
            self.recording_id,
            transcript.segments.len()
        );
        self.store.load(transcript);
        self.transcript_loaded = true;
        self.refresh_active_segment();
        true
    }

    /// Wait until the transcript is available or its job has failed
    pub async fn wait_for_transcript(&mut self) -> Result<&SegmentStore> {
        let mut rx = self.transcript_watcher.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                WatchState::Resolved(_) => {
                    self.sync_jobs();
                    return Ok(&self.store);
                }
                WatchState::Failed(detail) => return Err(ClientError::NotFound { detail }),
                WatchState::Idle if !self.transcript_watcher.is_polling() => {
                    return Err(ClientError::Stream("Transcript is not available".to_string()));
                }
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Err(ClientError::Stream("Transcript watcher closed".to_string()));
            }
        }
    }

    /// Re-run transcription after a failure and poll for the result again.
    /// The `TranscriptChanged` forward is re-armed, so the new transcript is
    /// picked up by [`Self::sync_jobs`] or an awaited [`Self::wait_for_transcript`].
    pub async fn retry_transcription(&mut self) -> Result<()> {
        self.transcript_watcher.retry().await?;
        self.transcript_loaded = false;
        self.events.info("Transcription restarted");
        self.forward_when_resolved(
            "transcript",
            self.transcript_watcher.subscribe(),
            UiEvent::TranscriptChanged { recording_id: self.recording_id },
        );
        Ok(())
    }

    pub fn transcript_state(&self) -> WatchState<Transcript> {
        self.transcript_watcher.state()
    }

    pub fn subscribe_transcript_state(&self) -> watch::Receiver<WatchState<Transcript>> {
        self.transcript_watcher.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<WatchState<Recording>> {
        self.status_watcher.subscribe()
    }

    pub fn recording(&self) -> Option<&Recording> {
        self.recording.as_ref()
    }

    /// Full URL of the recording's media, if it has any
    pub fn media_url(&self) -> Option<String> {
        let path = self.recording.as_ref()?.media_url.as_deref()?;
        Some(self.api.config().resolve_media_url(path))
    }

    // ===== Playback binding =====

    /// Bind the host's element. Its kind follows the media URL suffix.
    pub fn attach_media(&mut self, element: E) {
        let kind = self
            .recording
            .as_ref()
            .and_then(Recording::media_kind)
            .unwrap_or(MediaKind::Audio);
        self.playback.attach(element, kind);
    }

    pub fn playback(&self) -> &PlaybackController<E> {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackController<E> {
        &mut self.playback
    }

    /// Feed an element event; time updates move the active segment
    pub fn handle_media_event(&mut self, event: MediaEvent) {
        let is_tick = matches!(event, MediaEvent::TimeUpdate | MediaEvent::LoadedMetadata);
        self.playback.handle_event(event);
        if is_tick {
            self.refresh_active_segment();
        }
    }

    /// Seek to a segment and play it, stopping at its end when `bounded`
    pub fn play_segment(&mut self, index: usize, bounded: bool) {
        let Some(segment) = self.store.get(index) else {
            return;
        };
        let end = bounded.then_some(segment.end);
        self.playback.seek_to(segment.start, end);
        self.refresh_active_segment();
    }

    pub fn active_segment(&self) -> Option<usize> {
        *self.active_tx.borrow()
    }

    pub fn subscribe_active_segment(&self) -> watch::Receiver<Option<usize>> {
        self.active_tx.subscribe()
    }

    fn refresh_active_segment(&mut self) {
        let index = self.store.active_segment_index(self.playback.current_time_ms());
        self.active_tx.send_if_modified(|current| {
            if *current == index {
                false
            } else {
                *current = index;
                true
            }
        });
    }

    // ===== Transcript =====

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
    }

    pub fn visible_segments(&self) -> SegmentFilter<'_> {
        self.store.filter(&self.search)
    }

    pub fn speaker_stats(&self) -> Vec<SpeakerShare> {
        self.store.speaker_stats()
    }

    pub fn speaker_color(&mut self, label: &str) -> &'static str {
        self.palette.color_for(label)
    }

    pub fn speaker_initials(&self, label: &str) -> String {
        initials_for(label)
    }

    // ===== Minutes =====

    pub fn minutes(&self) -> &MinutesPanel {
        &self.minutes
    }

    /// Load persisted minutes. None yet is not an error.
    pub async fn load_minutes(&mut self) {
        match self.api.get_minutes(self.recording_id).await {
            Ok(minutes) => self.minutes.persisted = minutes,
            Err(e) => {
                log::error!("Failed to load minutes for {}: {}", self.recording_id, e);
                self.events.error("Failed to load minutes");
            }
        }
    }

    /// Stream a new minutes draft, then reconcile with the stored minutes.
    /// On failure the partial draft stays visible with an error marker.
    pub async fn generate_minutes(&mut self, context: &str) -> Result<()> {
        let _generating = self.minutes.generating.acquire()?;
        self.minutes.draft.clear();
        self.minutes.show_draft = true;
        log::info!("Generating minutes for recording {}", self.recording_id);

        let streamed = match self.api.stream_minutes(self.recording_id, context).await {
            Ok(response) => self.stream_draft(response.bytes_stream()).await,
            Err(e) => Err(e),
        };
        self.finish_minutes(streamed).await
    }

    /// Append streamed text to the draft until the stream ends or the view closes
    async fn stream_draft<S, B>(&self, stream: S) -> Result<usize>
    where
        S: Stream<Item = std::result::Result<Bytes, B>> + Unpin,
        B: Display,
    {
        let token = self.scope.token().clone();
        tokio::select! {
            result = consume_text(stream, &self.minutes.draft) => result,
            _ = token.cancelled() => Err(ClientError::Stream("view closed".to_string())),
        }
    }

    async fn finish_minutes(&mut self, streamed: Result<usize>) -> Result<()> {
        match streamed {
            Ok(_) => {
                self.load_minutes().await;
                self.minutes.show_draft = false;
                self.events.success("Minutes generated");
                self.events.emit(UiEvent::MinutesChanged { recording_id: self.recording_id });
                Ok(())
            }
            Err(e) => {
                log::error!("Minutes generation failed for {}: {}", self.recording_id, e);
                self.minutes.draft.append(STREAM_ERROR_MARKER);
                self.events.error(format!("Failed to generate minutes: {}", e.detail()));
                Err(e)
            }
        }
    }

    // ===== Inline edits =====

    pub fn title_edit(&mut self) -> &mut InlineEdit {
        &mut self.title_edit
    }

    pub fn date_edit(&mut self) -> &mut InlineEdit {
        &mut self.date_edit
    }

    pub fn minutes_edit(&mut self) -> &mut InlineEdit {
        &mut self.minutes_edit
    }

    pub fn begin_title_edit(&mut self) {
        if let Some(recording) = &self.recording {
            self.title_edit.begin(&recording.filename);
        }
    }

    pub fn begin_date_edit(&mut self) {
        if let Some(recording) = &self.recording {
            self.date_edit.begin(recording.created_at.as_deref().unwrap_or_default());
        }
    }

    pub fn begin_minutes_edit(&mut self) {
        let current = self.minutes.content().unwrap_or_default();
        self.minutes_edit.begin(&current);
    }

    pub fn begin_speaker_edit(&mut self, label: &str) {
        let mut edit = InlineEdit::single_line();
        edit.begin(label);
        self.speaker_edit = Some(SpeakerEditState {
            label: label.to_string(),
            edit,
        });
    }

    pub fn speaker_edit(&mut self) -> Option<&mut InlineEdit> {
        self.speaker_edit.as_mut().map(|s| &mut s.edit)
    }

    pub async fn commit_title(&mut self, trigger: EditTrigger) -> EditOutcome {
        let value = match self.title_edit.commit(trigger) {
            CommitDecision::Submit(value) => value,
            other => return decision_outcome(other),
        };
        let outcome = match self.recording.as_mut() {
            Some(recording) => match TitleEdit::new(&self.api, recording, value) {
                Ok(mut edit) => finish_edit(commit_optimistic(&mut edit).await, &self.events, "title"),
                Err(e) => reject_edit(e, &self.events),
            },
            None => EditOutcome::Rejected,
        };
        self.title_edit.finish();
        self.notify_recording_changed(outcome);
        outcome
    }

    pub async fn commit_date(&mut self, trigger: EditTrigger) -> EditOutcome {
        let value = match self.date_edit.commit(trigger) {
            CommitDecision::Submit(value) => value,
            other => return decision_outcome(other),
        };
        let outcome = match self.recording.as_mut() {
            Some(recording) => match DateEdit::new(&self.api, recording, &value) {
                Ok(mut edit) => finish_edit(commit_optimistic(&mut edit).await, &self.events, "date"),
                Err(e) => reject_edit(e, &self.events),
            },
            None => EditOutcome::Rejected,
        };
        self.date_edit.finish();
        self.notify_recording_changed(outcome);
        outcome
    }

    pub async fn commit_minutes(&mut self, trigger: EditTrigger) -> EditOutcome {
        let value = match self.minutes_edit.commit(trigger) {
            CommitDecision::Submit(value) => value,
            other => return decision_outcome(other),
        };
        let mut edit =
            MinutesBodyEdit::new(&self.api, self.recording_id, &mut self.minutes.persisted, value);
        let outcome = finish_edit(commit_optimistic(&mut edit).await, &self.events, "minutes");
        self.minutes_edit.finish();
        if outcome == EditOutcome::Saved {
            self.minutes.show_draft = false;
            self.events.emit(UiEvent::MinutesChanged { recording_id: self.recording_id });
        }
        outcome
    }

    /// Rename applies to every segment at once and is rolled back by
    /// refetching the transcript if the server refuses it
    pub async fn commit_speaker(&mut self, trigger: EditTrigger) -> EditOutcome {
        let Some(state) = self.speaker_edit.as_mut() else {
            return EditOutcome::Ignored;
        };
        let value = match state.edit.commit(trigger) {
            CommitDecision::Submit(value) => value,
            other => {
                if !state.edit.is_editing() {
                    self.speaker_edit = None;
                }
                return decision_outcome(other);
            }
        };
        let old_label = state.label.clone();

        let mut edit = SpeakerRenameEdit::new(
            &self.api,
            self.recording_id,
            old_label,
            value,
            &mut self.store,
            &mut self.palette,
        );
        let outcome = finish_edit(commit_optimistic(&mut edit).await, &self.events, "speaker name");
        self.speaker_edit = None;
        self.refresh_active_segment();
        self.events.emit(UiEvent::TranscriptChanged { recording_id: self.recording_id });
        outcome
    }

    fn notify_recording_changed(&self, outcome: EditOutcome) {
        if outcome == EditOutcome::Saved {
            self.events.emit(UiEvent::RecordingChanged { recording_id: self.recording_id });
        }
    }

    // ===== Teardown =====

    /// Stop every poll timer and stream reader. Also runs on drop.
    pub fn close(&mut self) {
        log::debug!("Closing recording view {}", self.recording_id);
        self.status_watcher.stop();
        self.transcript_watcher.stop();
        self.scope.close();
        self.playback.detach();
    }
}

impl<E: MediaElement> Drop for RecordingView<E> {
    fn drop(&mut self) {
        self.scope.close();
    }
}

fn decision_outcome(decision: CommitDecision) -> EditOutcome {
    match decision {
        CommitDecision::Ignored => EditOutcome::Ignored,
        CommitDecision::Unchanged => EditOutcome::Unchanged,
        CommitDecision::Blank => EditOutcome::Rejected,
        CommitDecision::Submit(_) => EditOutcome::Ignored,
    }
}

fn finish_edit(result: Result<()>, events: &EventBus, field: &str) -> EditOutcome {
    match result {
        Ok(()) => {
            events.success(format!("Updated {}", field));
            EditOutcome::Saved
        }
        Err(e) => {
            events.error(format!("Failed to update {}: {}", field, e.detail()));
            EditOutcome::Failed
        }
    }
}

fn reject_edit(error: ClientError, events: &EventBus) -> EditOutcome {
    events.error(error.detail());
    EditOutcome::Rejected
}
