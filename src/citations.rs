//! Citation transformer
//!
//! Rewrites `[[identifier]]` tokens in rendered answer HTML into navigable
//! cross-references. Recognized identifiers:
//!
//! - `Minutes_<label>_<recording id>` / `Meeting Minutes - <date> (ID: <id>)`
//! - `Transcript_<label>_<recording id>` / `Transcript - <date> (ID: <id>)`
//! - `Document_<label>_<document id>`
//! - `KB_<section>` / `Knowledge Base - <SECTION>`
//!
//! Anything else renders as a non-interactive badge. The output never
//! contains `[[`, so running the transform twice changes nothing.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::models::{KbSection, RecordingId};

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]]+?)\]\]").expect("Invalid regex"));

static MINUTES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Minutes_(.+)_(\d+)$").expect("Invalid regex"));

static TRANSCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Transcript_(.+)_(\d+)$").expect("Invalid regex"));

static DOCUMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Document_(.+)_(\d+)$").expect("Invalid regex"));

static AGENT_SOURCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Meeting Minutes|Transcript)\s*-\s*(.+?)\s*\(ID:\s*(\d+)\)$").expect("Invalid regex")
});

static KB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:KB|Knowledge[ _]?Base)\s*[-_:]\s*([A-Za-z][A-Za-z _-]*?)\s*$")
        .expect("Invalid regex")
});

/// Where a citation navigates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavTarget {
    Minutes { recording_id: RecordingId },
    Transcript { recording_id: RecordingId },
    Document { document_id: i64 },
    KnowledgeBase { section: KbSection },
}

impl NavTarget {
    /// Route understood by the host's router
    pub fn href(&self) -> String {
        match self {
            NavTarget::Minutes { recording_id } => format!("/recordings/{}?tab=minutes", recording_id),
            NavTarget::Transcript { recording_id } => {
                format!("/recordings/{}?tab=transcript", recording_id)
            }
            NavTarget::Document { document_id } => format!("/documents/{}", document_id),
            NavTarget::KnowledgeBase { section } => format!("#kb-{}", section.key()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NavTarget::Minutes { .. } => "minutes",
            NavTarget::Transcript { .. } => "transcript",
            NavTarget::Document { .. } => "document",
            NavTarget::KnowledgeBase { .. } => "kb",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            NavTarget::Minutes { .. } => "icon-file-text",
            NavTarget::Transcript { .. } => "icon-message-square",
            NavTarget::Document { .. } => "icon-file",
            NavTarget::KnowledgeBase { .. } => "icon-book-open",
        }
    }
}

/// A resolved citation token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub label: String,
    /// `None` for unrecognized identifiers
    pub target: Option<NavTarget>,
}

impl Citation {
    pub fn is_navigable(&self) -> bool {
        self.target.is_some()
    }

    /// HTML for this citation
    pub fn to_html(&self) -> String {
        let label = escape_html(&self.label);
        match &self.target {
            Some(target) => format!(
                r#"<a class="citation citation-{kind}" href="{href}" data-kind="{kind}"><i class="{icon}"></i>{label}</a>"#,
                kind = target.kind(),
                href = target.href(),
                icon = target.icon(),
                label = label,
            ),
            None => format!(r#"<span class="citation citation-badge">{}</span>"#, label),
        }
    }
}

/// Resolve the identifier inside `[[...]]`
pub fn resolve(identifier: &str) -> Citation {
    let identifier = identifier.trim();
    let badge = || Citation {
        label: identifier.to_string(),
        target: None,
    };

    let labelled = |re: &Regex, make: fn(i64) -> NavTarget| -> Option<Citation> {
        let caps = re.captures(identifier)?;
        let id = caps.get(2)?.as_str().parse::<i64>().ok()?;
        Some(Citation {
            label: caps.get(1)?.as_str().to_string(),
            target: Some(make(id)),
        })
    };

    if let Some(c) = labelled(&MINUTES_RE, |id| NavTarget::Minutes { recording_id: id }) {
        return c;
    }
    if let Some(c) = labelled(&TRANSCRIPT_RE, |id| NavTarget::Transcript { recording_id: id }) {
        return c;
    }
    if let Some(c) = labelled(&DOCUMENT_RE, |id| NavTarget::Document { document_id: id }) {
        return c;
    }
    if let Some(c) = agent_source(identifier) {
        return c;
    }
    if let Some(caps) = KB_RE.captures(identifier) {
        if let Ok(section) = caps[1].parse::<KbSection>() {
            return Citation {
                label: format!("Knowledge Base: {}", section.title()),
                target: Some(NavTarget::KnowledgeBase { section }),
            };
        }
    }
    badge()
}

/// `Meeting Minutes - <date> (ID: <n>)` and `Transcript - <date> (ID: <n>)`
fn agent_source(identifier: &str) -> Option<Citation> {
    let caps = AGENT_SOURCE_RE.captures(identifier)?;
    let recording_id = caps[3].parse::<i64>().ok()?;
    let target = match &caps[1] {
        "Meeting Minutes" => NavTarget::Minutes { recording_id },
        _ => NavTarget::Transcript { recording_id },
    };
    Some(Citation {
        label: format!("{} - {}", &caps[1], &caps[2]),
        target: Some(target),
    })
}

/// Replace every `[[...]]` token in `html`
pub fn transform_citations(html: &str) -> String {
    TOKEN_RE
        .replace_all(html, |caps: &Captures| resolve(&caps[1]).to_html())
        .into_owned()
}

/// Citations in order of appearance, duplicates removed
pub fn extract_citations(text: &str) -> Vec<Citation> {
    let mut found: Vec<Citation> = Vec::new();
    for caps in TOKEN_RE.captures_iter(text) {
        let citation = resolve(&caps[1]);
        if !found.contains(&citation) {
            found.push(citation);
        }
    }
    found
}

/// The input is already rendered HTML, so existing entities are left alone
fn escape_html(text: &str) -> String {
    text.replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
