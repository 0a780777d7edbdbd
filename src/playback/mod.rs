//! Media playback
//!
//! - element.rs: MediaElement trait, MediaEvent, and the test double
//! - controller.rs: PlaybackController (play/pause/seek/rate/bounded playback)

pub mod element;
pub mod controller;

pub use element::{MediaElement, MediaEvent};
pub use controller::{PlaybackController, PlaybackSnapshot, PLAYBACK_RATES};
