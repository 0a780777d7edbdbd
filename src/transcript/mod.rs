//! Transcript timeline state
//!
//! - store.rs: SegmentStore (search, active segment, speaker rename, stats)

pub mod store;

pub use store::{SegmentFilter, SegmentStore, SpeakerShare};
