//! Ordered transcript segments for one recording
//!
//! Segments are kept in producer order (non-decreasing start). Searching
//! never mutates the store; speaker renames rewrite labels in place and are
//! the only mutation besides a full replace.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::{rename_speaker_lines, Segment, Transcript};

/// One speaker's share of the total spoken time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerShare {
    pub speaker: String,
    pub duration_ms: u64,
    pub segment_count: usize,
    /// 0..=100
    pub percentage: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentStore {
    segments: Vec<Segment>,
    /// Flattened `"<speaker>: <text>"` form, kept in step with renames
    plain_text: String,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segments(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            plain_text: String::new(),
        }
    }

    /// Replace segments and flattened text from a fetched transcript
    pub fn load(&mut self, transcript: Transcript) {
        self.segments = transcript.segments;
        self.plain_text = transcript.plain_text;
    }

    /// Replace the whole list. Producers deliver it time-ordered already.
    pub fn set_segments(&mut self, segments: Vec<Segment>) {
        self.segments = segments;
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn plain_text(&self) -> &str {
        &self.plain_text
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Case-insensitive match on text or speaker label. An empty (or
    /// whitespace-only) query matches everything.
    pub fn filter<'a>(&'a self, query: &str) -> SegmentFilter<'a> {
        let query = query.trim().to_lowercase();
        SegmentFilter {
            segments: &self.segments,
            query,
        }
    }

    /// Index of the first segment with `start <= time_ms <= end`
    pub fn active_segment_index(&self, time_ms: u64) -> Option<usize> {
        self.segments.iter().position(|s| s.contains(time_ms))
    }

    /// Rewrite every `old` label to `new`. Returns how many segments changed;
    /// a blank or identical `new` label changes nothing.
    pub fn rename_speaker(&mut self, old: &str, new: &str) -> usize {
        let new = new.trim();
        if new.is_empty() || new == old {
            return 0;
        }
        let mut changed = 0;
        for segment in self.segments.iter_mut().filter(|s| s.speaker == old) {
            segment.speaker = new.to_string();
            changed += 1;
        }
        if changed > 0 {
            self.plain_text = rename_speaker_lines(&self.plain_text, old, new);
        }
        changed
    }

    /// Distinct speaker labels in order of first appearance
    pub fn speakers(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for segment in &self.segments {
            if !seen.contains(&segment.speaker.as_str()) {
                seen.push(segment.speaker.as_str());
            }
        }
        seen
    }

    /// Spoken-time share per speaker, largest first. Empty when nobody spoke
    /// for a measurable amount of time.
    pub fn speaker_stats(&self) -> Vec<SpeakerShare> {
        let mut order: Vec<SpeakerShare> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for segment in &self.segments {
            let slot = *index.entry(segment.speaker.as_str()).or_insert_with(|| {
                order.push(SpeakerShare {
                    speaker: segment.speaker.clone(),
                    duration_ms: 0,
                    segment_count: 0,
                    percentage: 0.0,
                });
                order.len() - 1
            });
            order[slot].duration_ms += segment.duration_ms();
            order[slot].segment_count += 1;
        }

        let total: u64 = order.iter().map(|s| s.duration_ms).sum();
        if total == 0 {
            return Vec::new();
        }

        for share in &mut order {
            share.percentage = share.duration_ms as f64 * 100.0 / total as f64;
        }
        // Stable sort keeps first-appearance order between equal shares
        order.sort_by(|a, b| b.duration_ms.cmp(&a.duration_ms));
        order
    }
}

/// Lazy view over the segments matching a query. Iterate it as many times as
/// needed; each pass re-scans the backing store.
#[derive(Debug, Clone)]
pub struct SegmentFilter<'a> {
    segments: &'a [Segment],
    query: String,
}

impl<'a> SegmentFilter<'a> {
    /// Matching segments with their index in the full list
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a Segment)> + '_ {
        self.segments
            .iter()
            .enumerate()
            .filter(move |(_, s)| self.matches(s))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    fn matches(&self, segment: &Segment) -> bool {
        self.query.is_empty()
            || segment.text.to_lowercase().contains(&self.query)
            || segment.speaker.to_lowercase().contains(&self.query)
    }
}

impl<'a, 'f> IntoIterator for &'f SegmentFilter<'a> {
    type Item = (usize, &'a Segment);
    type IntoIter = Box<dyn Iterator<Item = (usize, &'a Segment)> + 'f>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meeting() -> SegmentStore {
        SegmentStore::with_segments(vec![
            Segment::new("Speaker 1", 0, 4_000, "Welcome everyone"),
            Segment::new("Speaker 2", 5_000, 7_000, "Thanks, budget first?"),
            Segment::new("Speaker 1", 7_000, 10_000, "Yes, the Budget review"),
            Segment::new("Speaker 1", 12_000, 14_000, "Any objections"),
            Segment::new("Speaker 2", 14_500, 15_000, "None"),
        ])
    }

    #[test]
    fn test_active_segment_index() {
        let store = meeting();
        assert_eq!(store.active_segment_index(0), Some(0));
        assert_eq!(store.active_segment_index(4_000), Some(0));
        assert_eq!(store.active_segment_index(4_500), None);
        // Shared boundary: first match wins
        assert_eq!(store.active_segment_index(7_000), Some(1));
        assert_eq!(store.active_segment_index(13_000), Some(3));
        assert_eq!(store.active_segment_index(60_000), None);
        assert_eq!(SegmentStore::new().active_segment_index(0), None);
    }

    #[test]
    fn test_filter_matches_text_and_speaker() {
        let store = meeting();
        let filter = store.filter("BUDGET");
        let hits: Vec<usize> = filter.iter().map(|(i, _)| i).collect();
        assert_eq!(hits, vec![1, 2]);
        // Restartable
        assert_eq!(filter.count(), 2);
        assert_eq!((&filter).into_iter().count(), 2);

        let by_speaker: Vec<usize> = store.filter("speaker 2").iter().map(|(i, _)| i).collect();
        assert_eq!(by_speaker, vec![1, 4]);
    }

    #[test]
    fn test_empty_filter_returns_everything() {
        let store = meeting();
        assert_eq!(store.filter("").count(), store.len());
        assert_eq!(store.filter("   ").count(), store.len());
        assert_eq!(store.filter("no such words").count(), 0);
    }

    #[test]
    fn test_rename_speaker() {
        let mut store = SegmentStore::with_segments(vec![
            Segment::new("Speaker 1", 0, 1, "a"),
            Segment::new("Speaker 2", 1, 2, "b"),
            Segment::new("Speaker 1", 2, 3, "c"),
            Segment::new("Speaker 2", 3, 4, "d"),
            Segment::new("Speaker 1", 4, 5, "e"),
        ]);
        assert_eq!(store.rename_speaker("Speaker 1", "Alice"), 3);
        let labels: Vec<&str> = store.segments().iter().map(|s| s.speaker.as_str()).collect();
        assert_eq!(labels, vec!["Alice", "Speaker 2", "Alice", "Speaker 2", "Alice"]);

        assert_eq!(store.rename_speaker("Alice", "  "), 0);
        assert_eq!(store.rename_speaker("Alice", "Alice"), 0);
        assert_eq!(store.speakers(), vec!["Alice", "Speaker 2"]);
    }

    #[test]
    fn test_rename_rewrites_plain_text() {
        let mut store = SegmentStore::new();
        store.load(Transcript {
            id: Some(1),
            segments: vec![
                Segment::new("Speaker 1", 0, 1_000, "hi"),
                Segment::new("Speaker 2", 1_000, 2_000, "Speaker 1: said hi"),
            ],
            plain_text: "Speaker 1: hi\nSpeaker 2: Speaker 1: said hi".to_string(),
        });
        store.rename_speaker("Speaker 1", "Alice");
        assert_eq!(store.plain_text(), "Alice: hi\nSpeaker 2: Speaker 1: said hi");
    }

    #[test]
    fn test_speaker_stats() {
        let stats = meeting().speaker_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].speaker, "Speaker 1");
        assert_eq!(stats[0].duration_ms, 9_000);
        assert_eq!(stats[0].segment_count, 3);
        assert_eq!(stats[1].duration_ms, 2_500);

        let sum: f64 = stats.iter().map(|s| s.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_speaker_stats_zero_duration() {
        let store = SegmentStore::with_segments(vec![
            Segment::new("Speaker 1", 1_000, 1_000, "uh"),
            Segment::new("Speaker 2", 2_000, 2_000, "hm"),
        ]);
        assert!(store.speaker_stats().is_empty());
        assert!(SegmentStore::new().speaker_stats().is_empty());
    }
}
