//! Long-running backend jobs observed by polling
//!
//! - watcher.rs: JobWatcher state machine and the JobProbe trait
//! - probes.rs: probes for transcript readiness and recording status

pub mod watcher;
pub mod probes;

pub use watcher::{JobProbe, JobWatcher, WatchState};
pub use probes::{RecordingStatusProbe, TranscriptProbe};
