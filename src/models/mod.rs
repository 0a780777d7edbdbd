// API models - Re-exports all wire types
//
// This module is split into focused files by domain:
// - recording.rs: Recording lifecycle and updates
// - transcript.rs: Transcripts, segments and speaker renames
// - minutes.rs: Meeting minutes
// - chat.rs: Chat sessions and messages
// - project.rs: Projects, documents, hotwords and the knowledge base

mod recording;
mod transcript;
mod minutes;
mod chat;
mod project;

pub use recording::{MediaKind, Recording, RecordingId, RecordingStatus, RecordingUpdate};
pub use transcript::{Segment, SpeakerRename, SpeakerRenameResponse, Transcript};
pub(crate) use transcript::rename_speaker_lines;
pub use minutes::{Minutes, MinutesUpdate};
pub use chat::{ChatMessage, ChatRequest, ChatRole, ChatSession, ToolAction};
pub use project::{
    Document, Hotword, HotwordsUpdate, KnowledgeBase, KnowledgeBaseContent,
    KnowledgeBaseRequest, KbSection, Project, ProjectId,
};
