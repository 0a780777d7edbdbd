//! The media element seam
//!
//! The host owns the real audio/video element. It implements [`MediaElement`]
//! for it and forwards the element's events to the controller as
//! [`MediaEvent`]s, so the controller can be driven without a media backend.

/// Operations the controller performs on the underlying element.
/// Times are in seconds, as media elements report them.
pub trait MediaElement: Send {
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, secs: f64);
    /// `None` until metadata is known
    fn duration(&self) -> Option<f64>;
    /// True once the element has loaded enough metadata to seek
    fn has_metadata(&self) -> bool;
    fn is_paused(&self) -> bool;
    /// Start playback. A refusal (e.g. autoplay policy) is reported as `Err`,
    /// either here or later through [`MediaEvent::PlayRejected`].
    fn play(&mut self) -> Result<(), String>;
    fn pause(&mut self);
    /// Force the element to (re)start loading its source
    fn load(&mut self);
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64);
}

/// Element events the host forwards to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadedMetadata,
    TimeUpdate,
    Play,
    Pause,
    Ended,
    /// Asynchronous rejection of an earlier `play()` call
    PlayRejected(String),
}

#[cfg(test)]
pub(crate) mod fake {
    use super::MediaElement;

    /// Scriptable element for tests. Time only moves when the test says so.
    #[derive(Debug, Clone)]
    pub struct FakeMediaElement {
        pub time: f64,
        pub duration: Option<f64>,
        pub metadata: bool,
        pub paused: bool,
        pub rate: f64,
        pub reject_play: bool,
        pub play_calls: usize,
        pub pause_calls: usize,
        pub load_calls: usize,
    }

    impl FakeMediaElement {
        pub fn loaded(duration: f64) -> Self {
            Self {
                time: 0.0,
                duration: Some(duration),
                metadata: true,
                paused: true,
                rate: 1.0,
                reject_play: false,
                play_calls: 0,
                pause_calls: 0,
                load_calls: 0,
            }
        }

        pub fn unloaded() -> Self {
            Self {
                duration: None,
                metadata: false,
                ..Self::loaded(0.0)
            }
        }
    }

    impl MediaElement for FakeMediaElement {
        fn current_time(&self) -> f64 {
            self.time
        }

        fn set_current_time(&mut self, secs: f64) {
            self.time = secs;
        }

        fn duration(&self) -> Option<f64> {
            self.duration
        }

        fn has_metadata(&self) -> bool {
            self.metadata
        }

        fn is_paused(&self) -> bool {
            self.paused
        }

        fn play(&mut self) -> Result<(), String> {
            self.play_calls += 1;
            if self.reject_play {
                return Err("NotAllowedError: play() requires a user gesture".to_string());
            }
            self.paused = false;
            Ok(())
        }

        fn pause(&mut self) {
            self.pause_calls += 1;
            self.paused = true;
        }

        fn load(&mut self) {
            self.load_calls += 1;
        }

        fn playback_rate(&self) -> f64 {
            self.rate
        }

        fn set_playback_rate(&mut self, rate: f64) {
            self.rate = rate;
        }
    }
}
