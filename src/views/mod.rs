//! View controllers
//!
//! Each view owns the state of one screen and everything it spawned; dropping
//! the view (or calling `close`) cancels its poll timers and stream readers.
//!
//! - recording.rs: RecordingView (player, transcript, minutes, edits, jobs)
//! - project.rs: ProjectView (recordings, documents, hotwords)
//! - chat.rs: ProjectChat (assistant sessions and streamed answers)
//! - knowledge_base.rs: KnowledgeBaseGenerator

pub mod recording;
pub mod project;
pub mod chat;
pub mod knowledge_base;

pub use recording::{MinutesPanel, RecordingView};
pub use project::ProjectView;
pub use chat::ProjectChat;
pub use knowledge_base::{KbProgress, KnowledgeBaseGenerator};
