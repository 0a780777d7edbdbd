//! Playback controller for the single media element of a recording view
//!
//! Owns play/pause/seek/rate state and bounded playback (auto-pause at a
//! segment's end). The bound is checked on every time-update tick rather than
//! with a timer, so it cannot drift from the element's clock. With no element
//! attached every operation is a no-op.

use serde::Serialize;
use tokio::sync::watch;

use super::element::{MediaElement, MediaEvent};
use crate::models::MediaKind;

/// Rates visited by [`PlaybackController::cycle_playback_rate`], in order
pub const PLAYBACK_RATES: [f64; 5] = [0.5, 1.0, 1.25, 1.5, 2.0];

const RATE_EPSILON: f64 = 1e-6;

/// What the rendering layer needs to draw the player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub kind: Option<MediaKind>,
    pub is_playing: bool,
    pub current_time_ms: u64,
    pub duration_ms: Option<u64>,
    pub playback_rate: f64,
    /// Armed bounded-stop target, if any
    pub stop_at_ms: Option<u64>,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            kind: None,
            is_playing: false,
            current_time_ms: 0,
            duration_ms: None,
            playback_rate: 1.0,
            stop_at_ms: None,
        }
    }
}

/// A seek requested before metadata was available
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingSeek {
    start_ms: u64,
    end_ms: Option<u64>,
}

pub struct PlaybackController<E: MediaElement> {
    element: Option<E>,
    kind: Option<MediaKind>,
    is_playing: bool,
    current_time_ms: u64,
    stop_at_ms: Option<u64>,
    pending_seek: Option<PendingSeek>,
    state_tx: watch::Sender<PlaybackSnapshot>,
}

impl<E: MediaElement> PlaybackController<E> {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(PlaybackSnapshot::default());
        Self {
            element: None,
            kind: None,
            is_playing: false,
            current_time_ms: 0,
            stop_at_ms: None,
            pending_seek: None,
            state_tx,
        }
    }

    /// Bind the element for a media source, replacing any previous one
    pub fn attach(&mut self, element: E, kind: MediaKind) {
        log::info!("Attaching {:?} element", kind);
        self.is_playing = !element.is_paused();
        self.current_time_ms = secs_to_ms(element.current_time());
        self.element = Some(element);
        self.kind = Some(kind);
        self.stop_at_ms = None;
        self.pending_seek = None;
        self.publish();
    }

    /// Unbind the element (source removed or view torn down)
    pub fn detach(&mut self) -> Option<E> {
        let element = self.element.take();
        self.kind = None;
        self.is_playing = false;
        self.stop_at_ms = None;
        self.pending_seek = None;
        self.publish();
        element
    }

    pub fn has_media(&self) -> bool {
        self.element.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn current_time_ms(&self) -> u64 {
        self.current_time_ms
    }

    pub fn element(&self) -> Option<&E> {
        self.element.as_ref()
    }

    /// Direct element access for the host. Changes made here are picked up
    /// on the next event.
    pub fn element_mut(&mut self) -> Option<&mut E> {
        self.element.as_mut()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let (duration_ms, playback_rate) = match &self.element {
            Some(el) => (el.duration().map(secs_to_ms), el.playback_rate()),
            None => (None, 1.0),
        };
        PlaybackSnapshot {
            kind: self.kind,
            is_playing: self.is_playing,
            current_time_ms: self.current_time_ms,
            duration_ms,
            playback_rate,
            stop_at_ms: self.stop_at_ms,
        }
    }

    pub fn toggle_play(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        if self.is_playing {
            element.pause();
            self.is_playing = false;
        } else {
            self.is_playing = start_playback(element);
        }
        self.publish();
    }

    /// Jump by `delta_secs`, clamped to `[0, duration]`. Cancels any armed
    /// bounded stop and any seek still waiting for metadata.
    pub fn seek_relative(&mut self, delta_secs: f64) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        self.stop_at_ms = None;
        self.pending_seek = None;

        let mut target = element.current_time() + delta_secs;
        if let Some(duration) = element.duration().filter(|d| d.is_finite()) {
            target = target.min(duration);
        }
        let target = target.max(0.0);

        element.set_current_time(target);
        self.current_time_ms = secs_to_ms(target);
        self.publish();
    }

    /// Absolute seek followed by playback. With `end_ms` the playback is
    /// bounded and pauses once a tick observes time at or past `end_ms`.
    /// Before metadata is loaded the seek is parked until
    /// [`MediaEvent::LoadedMetadata`] and the element is told to load.
    pub fn seek_to(&mut self, start_ms: u64, end_ms: Option<u64>) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        let request = PendingSeek { start_ms, end_ms };

        if !element.has_metadata() {
            log::debug!("Metadata not loaded, deferring seek to {}ms", start_ms);
            self.pending_seek = Some(request);
            element.load();
            return;
        }

        self.apply_seek(request);
    }

    /// Advance to the next rate in [`PLAYBACK_RATES`], wrapping after the last.
    /// A rate outside the set moves to the next larger listed rate.
    pub fn cycle_playback_rate(&mut self) -> Option<f64> {
        let element = self.element.as_mut()?;
        let next = next_rate(element.playback_rate());
        element.set_playback_rate(next);
        self.publish();
        Some(next)
    }

    /// Feed an element event into the controller
    pub fn handle_event(&mut self, event: MediaEvent) {
        if self.element.is_none() {
            return;
        }

        match event {
            MediaEvent::TimeUpdate => self.on_time_update(),
            MediaEvent::LoadedMetadata => {
                if let Some(request) = self.pending_seek.take() {
                    self.apply_seek(request);
                    return;
                }
            }
            MediaEvent::Play => self.is_playing = true,
            MediaEvent::Pause => self.is_playing = false,
            MediaEvent::Ended => {
                self.is_playing = false;
                self.stop_at_ms = None;
            }
            MediaEvent::PlayRejected(reason) => {
                log::warn!("Playback was rejected: {}", reason);
                self.is_playing = false;
            }
        }
        self.publish();
    }

    fn on_time_update(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        self.current_time_ms = secs_to_ms(element.current_time());
        crate::hot_trace!("time update: {}ms", self.current_time_ms);

        if let Some(stop_at) = self.stop_at_ms {
            if self.current_time_ms >= stop_at {
                log::debug!("Bounded playback reached {}ms, pausing", stop_at);
                element.pause();
                self.is_playing = false;
                self.stop_at_ms = None;
            }
        }
    }

    fn apply_seek(&mut self, request: PendingSeek) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        element.set_current_time(request.start_ms as f64 / 1000.0);
        self.current_time_ms = request.start_ms;
        self.stop_at_ms = request.end_ms.filter(|end| *end > request.start_ms);
        self.is_playing = start_playback(element);
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.snapshot());
    }
}

impl<E: MediaElement> Default for PlaybackController<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the element; a refusal is logged and reported as "not playing"
fn start_playback<E: MediaElement>(element: &mut E) -> bool {
    match element.play() {
        Ok(()) => true,
        Err(reason) => {
            log::warn!("Failed to start playback: {}", reason);
            false
        }
    }
}

fn next_rate(current: f64) -> f64 {
    if let Some(pos) = PLAYBACK_RATES
        .iter()
        .position(|r| (r - current).abs() < RATE_EPSILON)
    {
        return PLAYBACK_RATES[(pos + 1) % PLAYBACK_RATES.len()];
    }
    PLAYBACK_RATES
        .iter()
        .copied()
        .find(|r| *r > current)
        .unwrap_or(PLAYBACK_RATES[0])
}

fn secs_to_ms(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::element::fake::FakeMediaElement;

    fn controller_with(element: FakeMediaElement) -> PlaybackController<FakeMediaElement> {
        let mut controller = PlaybackController::new();
        controller.attach(element, MediaKind::Audio);
        controller
    }

    fn tick(controller: &mut PlaybackController<FakeMediaElement>, ms: u64) {
        controller.element.as_mut().unwrap().time = ms as f64 / 1000.0;
        controller.handle_event(MediaEvent::TimeUpdate);
    }

    #[test]
    fn test_operations_without_element_are_noops() {
        let mut controller: PlaybackController<FakeMediaElement> = PlaybackController::new();
        controller.toggle_play();
        controller.seek_relative(10.0);
        controller.seek_to(1000, Some(2000));
        controller.handle_event(MediaEvent::TimeUpdate);
        assert_eq!(controller.cycle_playback_rate(), None);
        assert!(!controller.is_playing());
        assert!(!controller.has_media());
    }

    #[test]
    fn test_bounded_seek_pauses_once() {
        let mut controller = controller_with(FakeMediaElement::loaded(60.0));
        controller.seek_to(5000, Some(8000));
        assert!(controller.is_playing());
        assert_eq!(controller.snapshot().stop_at_ms, Some(8000));

        tick(&mut controller, 6000);
        assert!(controller.is_playing());
        assert_eq!(controller.element().unwrap().pause_calls, 0);

        tick(&mut controller, 8000);
        assert!(!controller.is_playing());
        assert_eq!(controller.element().unwrap().pause_calls, 1);
        assert_eq!(controller.snapshot().stop_at_ms, None);

        tick(&mut controller, 9000);
        assert_eq!(controller.element().unwrap().pause_calls, 1);
        assert_eq!(controller.current_time_ms(), 9000);
    }

    #[test]
    fn test_seek_relative_clamps_and_cancels_bound() {
        let mut controller = controller_with(FakeMediaElement::loaded(30.0));
        controller.seek_to(25_000, Some(28_000));
        controller.seek_relative(10.0);
        assert_eq!(controller.element().unwrap().time, 30.0);
        assert_eq!(controller.snapshot().stop_at_ms, None);

        controller.seek_relative(-100.0);
        assert_eq!(controller.element().unwrap().time, 0.0);
    }

    #[test]
    fn test_deferred_seek_waits_for_metadata() {
        let mut controller = controller_with(FakeMediaElement::unloaded());
        controller.seek_to(4000, None);
        {
            let el = controller.element().unwrap();
            assert_eq!(el.load_calls, 1);
            assert_eq!(el.play_calls, 0);
            assert_eq!(el.time, 0.0);
        }

        {
            let el = controller.element.as_mut().unwrap();
            el.metadata = true;
            el.duration = Some(120.0);
        }
        controller.handle_event(MediaEvent::LoadedMetadata);
        assert_eq!(controller.element().unwrap().time, 4.0);
        assert!(controller.is_playing());

        // One-shot: a second metadata event does not seek again
        controller.element.as_mut().unwrap().time = 50.0;
        controller.handle_event(MediaEvent::LoadedMetadata);
        assert_eq!(controller.element().unwrap().time, 50.0);
    }

    #[test]
    fn test_relative_seek_drops_deferred_seek() {
        let mut controller = controller_with(FakeMediaElement::unloaded());
        controller.seek_to(4000, Some(6000));
        controller.seek_relative(2.0);
        assert_eq!(controller.element().unwrap().time, 2.0);

        controller.element.as_mut().unwrap().metadata = true;
        controller.handle_event(MediaEvent::LoadedMetadata);
        let el = controller.element().unwrap();
        assert_eq!(el.time, 2.0);
        assert_eq!(el.play_calls, 0);
        assert!(!controller.is_playing());
        assert_eq!(controller.snapshot().stop_at_ms, None);
    }

    #[test]
    fn test_rejected_play_is_not_fatal() {
        let mut element = FakeMediaElement::loaded(10.0);
        element.reject_play = true;
        let mut controller = controller_with(element);
        controller.seek_to(1000, None);
        assert!(!controller.is_playing());
        controller.toggle_play();
        assert!(!controller.is_playing());
        assert_eq!(controller.element().unwrap().play_calls, 2);
    }

    #[test]
    fn test_element_events_keep_state_in_sync() {
        let mut controller = controller_with(FakeMediaElement::loaded(10.0));
        controller.toggle_play();
        assert!(controller.is_playing());
        controller.handle_event(MediaEvent::Ended);
        assert!(!controller.is_playing());
        controller.handle_event(MediaEvent::Play);
        assert!(controller.is_playing());
        controller.handle_event(MediaEvent::PlayRejected("autoplay".into()));
        assert!(!controller.is_playing());
    }

    #[test]
    fn test_cycle_playback_rate_wraps() {
        let mut controller = controller_with(FakeMediaElement::loaded(10.0));
        let seen: Vec<f64> = (0..5).filter_map(|_| controller.cycle_playback_rate()).collect();
        assert_eq!(seen, vec![1.25, 1.5, 2.0, 0.5, 1.0]);
    }

    #[test]
    fn test_rate_outside_set_does_not_panic() {
        assert_eq!(next_rate(1.1), 1.25);
        assert_eq!(next_rate(3.0), 0.5);
        assert_eq!(next_rate(f64::NAN), 0.5);
    }

    #[test]
    fn test_subscribers_see_time_updates() {
        let mut controller = controller_with(FakeMediaElement::loaded(10.0));
        let rx = controller.subscribe();
        tick(&mut controller, 2500);
        assert_eq!(rx.borrow().current_time_ms, 2500);
        assert_eq!(rx.borrow().duration_ms, Some(10_000));
    }
}
