//! Millisecond offset formatting for the transcript timeline

/// Format a millisecond offset as `MM:SS`. Minutes are not wrapped into hours,
/// so a 75 minute offset renders as `75:00`.
pub fn format_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

/// Same as [`format_ms`] for fractional seconds reported by a media element.
/// Negative and non-finite inputs render as `00:00`.
pub fn format_seconds(secs: f64) -> String {
    if !secs.is_finite() || secs <= 0.0 {
        return format_ms(0);
    }
    format_ms((secs * 1000.0) as u64)
}
