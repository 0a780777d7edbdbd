// MeetMind client - Interaction engine for the MeetMind meeting client
//
// Everything the screens need between the HTTP API and the renderer:
// - Media playback synchronized with transcript segments
// - Background job polling (recording status, transcript readiness)
// - Streamed minutes, assistant answers and knowledge-base generation
// - Citation links inside assistant answers
// - Click-to-edit fields with optimistic updates

// Hot-path logging macros - exported for use by other modules
#[macro_use]
pub mod macros;

// Foundations
pub mod error;
pub mod config;
pub mod events;
pub mod state;
pub mod timefmt;
pub mod speakers;
pub mod models;

// Core engine
pub mod api;
pub mod playback;
pub mod transcript;
pub mod jobs;
pub mod streaming;
pub mod citations;
pub mod editing;

// Screens
pub mod views;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::{EventBus, NoticeLevel, UiEvent};
pub use views::{ProjectView, RecordingView};

/// Initialize env_logger on stderr (reads RUST_LOG, defaults to info)
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
