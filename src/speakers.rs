//! Speaker identity: stable colors and avatar initials per speaker label
//!
//! The palette is owned by one recording view and dropped with it. Colors are
//! cached by the current label, so a rename carries the old color over to the
//! new label instead of rehashing it.

use std::collections::HashMap;

/// Color tokens understood by the rendering layer
pub const SPEAKER_PALETTE: [&str; 10] = [
    "blue", "emerald", "amber", "rose", "violet", "cyan", "orange", "lime", "fuchsia", "teal",
];

/// Generic label prefix assigned by the transcription engine
const DEFAULT_SPEAKER_PREFIX: &str = "speaker";

#[derive(Debug, Default)]
pub struct SpeakerPalette {
    assigned: HashMap<String, &'static str>,
}

impl SpeakerPalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color for a label, assigned on first use and stable afterwards
    pub fn color_for(&mut self, speaker: &str) -> &'static str {
        *self
            .assigned
            .entry(speaker.to_string())
            .or_insert_with(|| hashed_color(speaker))
    }

    /// Move the color of `old` to `new`, hashing `old` first if it was never
    /// looked up
    pub fn rename(&mut self, old: &str, new: &str) {
        if old == new {
            return;
        }
        let color = self.assigned.remove(old).unwrap_or_else(|| hashed_color(old));
        self.assigned.insert(new.to_string(), color);
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

/// Up to two uppercase characters for a compact avatar.
///
/// `"Speaker 3"` gives `"3"`, `"alice"` gives `"AL"`. A bare `"Speaker"` falls
/// back to the label itself; an empty label gives an empty string.
pub fn initials_for(speaker: &str) -> String {
    let trimmed = speaker.trim();
    let stripped = strip_default_prefix(trimmed)
        .trim_start_matches(|c: char| c.is_whitespace() || c == '_' || c == '-');

    let source = if stripped.is_empty() { trimmed } else { stripped };
    source.chars().take(2).collect::<String>().to_uppercase()
}

fn strip_default_prefix(label: &str) -> &str {
    let prefix_len = DEFAULT_SPEAKER_PREFIX.len();
    match label.get(..prefix_len) {
        Some(head) if head.eq_ignore_ascii_case(DEFAULT_SPEAKER_PREFIX) => &label[prefix_len..],
        _ => label,
    }
}

/// `hash = c + (hash << 5) - hash` over UTF-16 code units, 32-bit wrapping
fn label_hash(label: &str) -> i32 {
    label
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            (unit as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
        })
}

fn hashed_color(label: &str) -> &'static str {
    let index = label_hash(label).unsigned_abs() as usize % SPEAKER_PALETTE.len();
    SPEAKER_PALETTE[index]
}
