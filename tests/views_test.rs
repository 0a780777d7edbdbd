//! View-level flows against a mock MeetMind server: job polling, streamed
//! minutes, assistant chat, knowledge-base generation and optimistic edits.

use std::time::Duration;

use meetmind_lib::editing::{EditOutcome, EditTrigger};
use meetmind_lib::events::{NoticeLevel, UiEvent};
use meetmind_lib::jobs::WatchState;
use meetmind_lib::models::{ChatRole, KbSection, KnowledgeBaseRequest};
use meetmind_lib::playback::MediaElement;
use meetmind_lib::speakers::SpeakerPalette;
use meetmind_lib::{ApiClient, ClientConfig, ClientError, EventBus, ProjectView, RecordingView};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Element that never plays; the flows below only need the data side
#[derive(Default)]
struct SilentElement {
    time: f64,
}

impl MediaElement for SilentElement {
    fn current_time(&self) -> f64 {
        self.time
    }
    fn set_current_time(&mut self, secs: f64) {
        self.time = secs;
    }
    fn duration(&self) -> Option<f64> {
        Some(60.0)
    }
    fn has_metadata(&self) -> bool {
        true
    }
    fn is_paused(&self) -> bool {
        true
    }
    fn play(&mut self) -> Result<(), String> {
        Ok(())
    }
    fn pause(&mut self) {}
    fn load(&mut self) {}
    fn playback_rate(&self) -> f64 {
        1.0
    }
    fn set_playback_rate(&mut self, _rate: f64) {}
}

fn api_for(server: &MockServer) -> ApiClient {
    let mut config = ClientConfig::default().with_base_url(server.uri());
    config.poll_interval_ms = 20;
    ApiClient::new(config).expect("client")
}

fn recording_json(status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": 7,
        "project_id": 3,
        "filename": "Weekly sync",
        "status": status,
        "created_at": "2024-05-02T10:00:00",
        "media_url": "/media/abc.mp3"
    })
}

fn transcript_json(first_speaker: &str) -> serde_json::Value {
    serde_json::json!({
        "id": 1,
        "content": [
            {"speaker_id": first_speaker, "start": 0, "end": 4000, "text": "Welcome everyone"},
            {"speaker_id": "Speaker 2", "start": 4000, "end": 9000, "text": "Budget first"},
            {"speaker_id": first_speaker, "start": 9000, "end": 12000, "text": "Agreed"}
        ],
        "plain_text": format!("{0}: Welcome everyone\nSpeaker 2: Budget first\n{0}: Agreed", first_speaker)
    })
}

async fn mount_completed_recording(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/recordings/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(recording_json("completed")))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/minutes"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"detail": "Minutes not found"})))
        .mount(server)
        .await;
}

fn sse(events: &[(&str, serde_json::Value)]) -> String {
    events
        .iter()
        .map(|(name, data)| format!("event: {}\ndata: {}\n\n", name, data))
        .collect()
}

#[tokio::test]
async fn test_transcript_watcher_polls_until_ready() {
    let server = MockServer::start().await;
    mount_completed_recording(&server).await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/transcript"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"detail": "Transcript not found"})))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transcript_json("Speaker 1")))
        .mount(&server)
        .await;

    let mut view: RecordingView<SilentElement> = RecordingView::new(api_for(&server), 7, EventBus::new());
    view.load().await.unwrap();
    assert!(view.transcript_state().is_polling());

    let store = tokio::time::timeout(Duration::from_secs(5), view.wait_for_transcript())
        .await
        .expect("transcript in time")
        .unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(view.speaker_stats()[0].speaker, "Speaker 1");
    view.close();
}

#[tokio::test]
async fn test_failed_transcription_stops_polling() {
    let server = MockServer::start().await;
    mount_completed_recording(&server).await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/transcript"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"detail": "Transcription failed: unsupported codec"})),
        )
        .mount(&server)
        .await;

    let events = EventBus::new();
    let mut rx = events.subscribe();
    let mut view: RecordingView<SilentElement> = RecordingView::new(api_for(&server), 7, events);
    view.load().await.unwrap();

    match view.transcript_state() {
        WatchState::Failed(detail) => assert!(detail.contains("unsupported codec")),
        other => panic!("unexpected state {:?}", other),
    }
    let err = view.wait_for_transcript().await.unwrap_err();
    assert!(err.is_not_found());

    let mut saw_error_toast = false;
    while let Ok(event) = rx.try_recv() {
        if let UiEvent::Notice { level: NoticeLevel::Error, .. } = event {
            saw_error_toast = true;
        }
    }
    assert!(saw_error_toast);
}

#[tokio::test]
async fn test_minutes_stream_then_reconcile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/recordings/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(recording_json("completed")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transcript_json("Speaker 1")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/minutes/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("# Weekly sync\n\n- Budget approved", "text/plain"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/minutes"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"detail": "Minutes not found"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/minutes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 5,
            "content": "# Weekly sync\n\n- Budget approved (final)"
        })))
        .mount(&server)
        .await;

    let mut view: RecordingView<SilentElement> = RecordingView::new(api_for(&server), 7, EventBus::new());
    view.load().await.unwrap();
    assert!(view.minutes().content().is_none());

    view.generate_minutes("").await.unwrap();
    assert!(!view.minutes().is_generating());
    assert_eq!(view.minutes().draft(), "# Weekly sync\n\n- Budget approved");
    assert_eq!(
        view.minutes().content().as_deref(),
        Some("# Weekly sync\n\n- Budget approved (final)")
    );
}

#[tokio::test]
async fn test_rejected_speaker_rename_is_rolled_back() {
    let server = MockServer::start().await;
    mount_completed_recording(&server).await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transcript_json("Speaker 1")))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/recordings/7/speakers"))
        .and(body_json(serde_json::json!({
            "original_speaker_id": "Speaker 1",
            "new_speaker_id": "Alice"
        })))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"detail": "database locked"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut view: RecordingView<SilentElement> = RecordingView::new(api_for(&server), 7, EventBus::new());
    view.load().await.unwrap();
    assert_eq!(view.store().len(), 3);

    view.begin_speaker_edit("Speaker 1");
    view.speaker_edit().unwrap().set_buffer("Alice");
    let outcome = view.commit_speaker(EditTrigger::Enter).await;

    assert_eq!(outcome, EditOutcome::Failed);
    assert!(view.speaker_edit().is_none());
    let speakers: Vec<&str> = view.store().segments().iter().map(|s| s.speaker.as_str()).collect();
    assert_eq!(speakers, vec!["Speaker 1", "Speaker 2", "Speaker 1"]);
    assert!(view.store().plain_text().starts_with("Speaker 1: Welcome"));
}

#[tokio::test]
async fn test_confirmed_speaker_rename_uses_server_segments() {
    let server = MockServer::start().await;
    mount_completed_recording(&server).await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transcript_json("Speaker 1")))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/recordings/7/speakers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "ok",
            "updated_count": 2,
            "content": transcript_json("Alice")["content"]
        })))
        .mount(&server)
        .await;

    let mut view: RecordingView<SilentElement> = RecordingView::new(api_for(&server), 7, EventBus::new());
    view.load().await.unwrap();

    view.begin_speaker_edit("Speaker 1");
    view.speaker_edit().unwrap().set_buffer("  Alice ");
    assert_eq!(view.commit_speaker(EditTrigger::Blur).await, EditOutcome::Saved);
    assert_eq!(view.store().segments()[0].speaker, "Alice");
    assert_eq!(view.store().segments()[2].speaker, "Alice");
    assert!(view.store().plain_text().contains("Alice: Agreed"));
}

#[tokio::test]
async fn test_speaker_rename_rewrites_text_and_keeps_color() {
    let server = MockServer::start().await;
    mount_completed_recording(&server).await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transcript_json("Speaker 1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/recordings/7/speakers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "ok",
            "updated_count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut view: RecordingView<SilentElement> = RecordingView::new(api_for(&server), 7, EventBus::new());
    view.load().await.unwrap();
    let original = SpeakerPalette::new().color_for("Speaker 1");
    let other = view.speaker_color("Speaker 2");

    // "Speaker 1" is never looked up before the rename
    view.begin_speaker_edit("Speaker 1");
    view.speaker_edit().unwrap().set_buffer("Alice");
    assert_eq!(view.commit_speaker(EditTrigger::Confirm).await, EditOutcome::Saved);

    let speakers: Vec<&str> = view.store().segments().iter().map(|s| s.speaker.as_str()).collect();
    assert_eq!(speakers, vec!["Alice", "Speaker 2", "Alice"]);
    assert_eq!(
        view.store().plain_text(),
        "Alice: Welcome everyone\nSpeaker 2: Budget first\nAlice: Agreed"
    );
    assert_eq!(view.speaker_color("Alice"), original);
    assert_eq!(view.speaker_color("Speaker 2"), other);
    assert_eq!(view.speaker_initials("Alice"), "AL");
}

#[tokio::test]
async fn test_minutes_stream_failure_is_marked_in_draft() {
    let server = MockServer::start().await;
    mount_completed_recording(&server).await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transcript_json("Speaker 1")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/minutes/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"detail": "LLM backend unavailable"})))
        .expect(2)
        .mount(&server)
        .await;

    let events = EventBus::new();
    let mut rx = events.subscribe();
    let mut view: RecordingView<SilentElement> = RecordingView::new(api_for(&server), 7, events);
    view.load().await.unwrap();

    let err = view.generate_minutes("").await.unwrap_err();
    assert_eq!(err.detail(), "LLM backend unavailable");
    assert!(!view.minutes().is_generating());
    assert!(!*view.minutes().subscribe_generating().borrow());

    let draft = view.minutes().draft();
    assert!(draft.contains("minutes generation was interrupted"));
    assert_eq!(view.minutes().content(), Some(draft));
    assert!(view.minutes().persisted().is_none());

    let mut error_toast = None;
    while let Ok(event) = rx.try_recv() {
        if let UiEvent::Notice { level: NoticeLevel::Error, message } = event {
            error_toast = Some(message);
        }
    }
    assert_eq!(error_toast.as_deref(), Some("Failed to generate minutes: LLM backend unavailable"));

    // The flag is released, so a second attempt is allowed through
    assert!(view.generate_minutes("").await.is_err());
}

#[tokio::test]
async fn test_retry_transcription_delivers_new_transcript() {
    let server = MockServer::start().await;
    mount_completed_recording(&server).await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/transcript"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"detail": "Transcription failed: unsupported codec"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recordings/7/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transcript_json("Speaker 1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/recordings/7/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "transcribing"})))
        .expect(1)
        .mount(&server)
        .await;

    let events = EventBus::new();
    let mut rx = events.subscribe();
    let mut view: RecordingView<SilentElement> = RecordingView::new(api_for(&server), 7, events);
    view.load().await.unwrap();
    assert!(view.transcript_state().failure().is_some());

    view.retry_transcription().await.unwrap();
    let store = tokio::time::timeout(Duration::from_secs(5), view.wait_for_transcript())
        .await
        .expect("transcript in time")
        .unwrap();
    assert_eq!(store.len(), 3);

    let changed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(UiEvent::TranscriptChanged { recording_id }) => return recording_id,
                Ok(_) => {}
                Err(e) => panic!("event bus closed: {}", e),
            }
        }
    })
    .await
    .expect("transcript change forwarded");
    assert_eq!(changed, 7);
    view.close();
}

#[tokio::test]
async fn test_chat_streams_answer_and_adopts_session() {
    let server = MockServer::start().await;
    let body = sse(&[
        ("thought", serde_json::json!({"content": "I should check the minutes"})),
        ("action", serde_json::json!({"tool": "search_minutes", "query": "budget"})),
        ("session_id", serde_json::json!({"session_id": 42})),
        ("answer", serde_json::json!({"content": "The budget was approved "})),
        ("answer", serde_json::json!({"content": "[[Minutes_Standup_42]]"})),
    ]);
    Mock::given(method("POST"))
        .and(path("/projects/3/chat"))
        .and(body_json(serde_json::json!({"query": "What about the budget?", "session_id": null})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/3/chat/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 42, "title": "Budget"}
        ])))
        .mount(&server)
        .await;

    let mut view = ProjectView::new(api_for(&server), 3, EventBus::new());
    view.chat_mut().ask("  What about the budget?  ").await.unwrap();

    let chat = view.chat();
    assert_eq!(chat.session_id(), Some("42"));
    assert_eq!(chat.sessions().len(), 1);
    assert!(!chat.is_busy());

    let messages = chat.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, ChatRole::User);
    assert_eq!(messages[0].content, "What about the budget?");
    let answer = &messages[1];
    assert!(!answer.streaming);
    assert_eq!(answer.thoughts, vec!["I should check the minutes"]);
    assert_eq!(answer.actions[0].tool, "search_minutes");
    assert_eq!(answer.content, "The budget was approved [[Minutes_Standup_42]]");
}

#[tokio::test]
async fn test_chat_rejects_blank_question() {
    let server = MockServer::start().await;
    let mut view = ProjectView::new(api_for(&server), 3, EventBus::new());
    let err = view.chat_mut().ask("   ").await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)));
    assert!(view.chat().messages().is_empty());
}

#[tokio::test]
async fn test_chat_server_error_is_annotated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/projects/3/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"detail": "LLM offline"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/3/chat/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let mut view = ProjectView::new(api_for(&server), 3, EventBus::new());
    assert!(view.chat_mut().ask("Hello?").await.is_err());
    let messages = view.chat().messages();
    assert!(messages[1].content.contains("LLM offline"));
    assert!(!messages[1].streaming);
    assert!(!view.chat().is_busy());
}

#[tokio::test]
async fn test_knowledge_base_generation_replaces_content() {
    let server = MockServer::start().await;
    let body = sse(&[
        ("status", serde_json::json!({"message": "Reading 2 minutes"})),
        ("status", serde_json::json!({"message": "Writing PRD"})),
        (
            "done",
            serde_json::json!({"content": {"prd": "# PRD", "timeline": "- May: kickoff"}}),
        ),
        ("status", serde_json::json!({"message": "never applied"})),
    ]);
    Mock::given(method("POST"))
        .and(path("/projects/3/knowledge-base/generate/stream"))
        .and(body_json(serde_json::json!({"minutes_ids": [10, 11], "document_ids": []})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let events = EventBus::new();
    let mut rx = events.subscribe();
    let mut view = ProjectView::new(api_for(&server), 3, events);
    let request = KnowledgeBaseRequest { minutes_ids: vec![10, 11], document_ids: vec![] };
    view.knowledge_base_mut().generate(&request).await.unwrap();

    let kb = view.knowledge_base().content().expect("content");
    assert_eq!(kb.content.section(KbSection::Prd), "# PRD");
    assert_eq!(kb.content.section(KbSection::Glossary), "");
    let progress = view.knowledge_base().progress();
    assert!(!progress.generating);
    assert!(progress.error.is_none());

    let mut changed = false;
    while let Ok(event) = rx.try_recv() {
        if event == (UiEvent::KnowledgeBaseChanged { project_id: 3 }) {
            changed = true;
        }
    }
    assert!(changed);
}

#[tokio::test]
async fn test_knowledge_base_error_keeps_previous_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/3/knowledge-base"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": {"prd": "# Old PRD"}
        })))
        .mount(&server)
        .await;
    let body = sse(&[
        ("status", serde_json::json!({"message": "Reading documents"})),
        ("error", serde_json::json!({"message": "No minutes selected"})),
    ]);
    Mock::given(method("POST"))
        .and(path("/projects/3/knowledge-base/generate/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut view = ProjectView::new(api_for(&server), 3, EventBus::new());
    view.knowledge_base_mut().load().await.unwrap();
    let err = view
        .knowledge_base_mut()
        .generate(&KnowledgeBaseRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Stream(ref message) if message == "No minutes selected"));
    assert_eq!(
        view.knowledge_base().content().unwrap().content.section(KbSection::Prd),
        "# Old PRD"
    );
    assert_eq!(view.knowledge_base().progress().error.as_deref(), Some("No minutes selected"));
}

#[tokio::test]
async fn test_knowledge_base_stream_without_result_is_an_error() {
    let server = MockServer::start().await;
    let body = sse(&[("status", serde_json::json!({"message": "Working"}))]);
    Mock::given(method("POST"))
        .and(path("/projects/3/knowledge-base/generate/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut view = ProjectView::new(api_for(&server), 3, EventBus::new());
    let result = view.knowledge_base_mut().generate(&KnowledgeBaseRequest::default()).await;
    assert!(matches!(result, Err(ClientError::Stream(_))));
    assert!(view.knowledge_base().content().is_none());
}
