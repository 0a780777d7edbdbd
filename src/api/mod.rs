//! HTTP surface of the MeetMind API
//!
//! - client.rs: ApiClient (JSON calls, body streams, export URLs)

pub mod client;

pub use client::{ApiClient, ExportFormat, ExportTarget};
