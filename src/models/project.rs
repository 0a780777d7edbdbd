// API models - Project, documents and knowledge base
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ProjectId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub hotwords: Vec<Hotword>,
}

/// A reference document uploaded to a project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A vocabulary hint for the transcription engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hotword {
    pub text: String,
    #[serde(default = "default_weight")]
    pub weight: u8,
    #[serde(default = "default_lang")]
    pub lang: String,
}

fn default_weight() -> u8 {
    4
}

fn default_lang() -> String {
    "zh".to_string()
}

pub const MIN_HOTWORD_WEIGHT: u8 = 1;
pub const MAX_HOTWORD_WEIGHT: u8 = 5;

/// Body for `PATCH /projects/{id}/hotwords`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HotwordsUpdate {
    pub hotwords: Vec<Hotword>,
}

impl HotwordsUpdate {
    /// Drop blank entries, trim text and clamp weights into range
    pub fn sanitized(hotwords: Vec<Hotword>) -> Self {
        let hotwords = hotwords
            .into_iter()
            .filter_map(|h| {
                let text = h.text.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                Some(Hotword {
                    text,
                    weight: h.weight.clamp(MIN_HOTWORD_WEIGHT, MAX_HOTWORD_WEIGHT),
                    lang: h.lang,
                })
            })
            .collect();
        Self { hotwords }
    }
}

/// Fixed knowledge-base section keys
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum KbSection {
    Prd,
    Specs,
    BusinessFlows,
    Timeline,
    Glossary,
}

impl KbSection {
    pub const ALL: [KbSection; 5] = [
        KbSection::Prd,
        KbSection::Specs,
        KbSection::BusinessFlows,
        KbSection::Timeline,
        KbSection::Glossary,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            KbSection::Prd => "prd",
            KbSection::Specs => "specs",
            KbSection::BusinessFlows => "business_flows",
            KbSection::Timeline => "timeline",
            KbSection::Glossary => "glossary",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            KbSection::Prd => "PRD",
            KbSection::Specs => "Specs",
            KbSection::BusinessFlows => "Business Flows",
            KbSection::Timeline => "Timeline",
            KbSection::Glossary => "Glossary",
        }
    }
}

impl fmt::Display for KbSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for KbSection {
    type Err = String;

    /// Accepts keys in any case, with spaces or dashes in place of underscores
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        KbSection::ALL
            .iter()
            .copied()
            .find(|section| section.key() == normalized)
            .ok_or_else(|| format!("unknown knowledge base section: {}", s))
    }
}

/// The five markdown documents of a project knowledge base
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct KnowledgeBaseContent {
    pub prd: String,
    pub specs: String,
    pub business_flows: String,
    pub timeline: String,
    pub glossary: String,
}

impl KnowledgeBaseContent {
    pub fn section(&self, section: KbSection) -> &str {
        match section {
            KbSection::Prd => &self.prd,
            KbSection::Specs => &self.specs,
            KbSection::BusinessFlows => &self.business_flows,
            KbSection::Timeline => &self.timeline,
            KbSection::Glossary => &self.glossary,
        }
    }

    pub fn is_empty(&self) -> bool {
        KbSection::ALL.iter().all(|s| self.section(*s).trim().is_empty())
    }
}

/// `GET /projects/{id}/knowledge-base`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KnowledgeBase {
    #[serde(default)]
    pub content: KnowledgeBaseContent,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body for `POST /projects/{id}/knowledge-base/generate/stream`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KnowledgeBaseRequest {
    pub minutes_ids: Vec<i64>,
    pub document_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_parsing() {
        assert_eq!("TIMELINE".parse::<KbSection>().unwrap(), KbSection::Timeline);
        assert_eq!("business flows".parse::<KbSection>().unwrap(), KbSection::BusinessFlows);
        assert_eq!("business-flows".parse::<KbSection>().unwrap(), KbSection::BusinessFlows);
        assert!("roadmap".parse::<KbSection>().is_err());
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let kb: KnowledgeBase = serde_json::from_str(r##"{"content": {"prd": "# Goals"}}"##).unwrap();
        assert_eq!(kb.content.section(KbSection::Prd), "# Goals");
        assert_eq!(kb.content.glossary, "");
        assert!(!kb.content.is_empty());
        assert!(KnowledgeBaseContent::default().is_empty());
    }

    #[test]
    fn test_hotwords_sanitized() {
        let update = HotwordsUpdate::sanitized(vec![
            Hotword { text: "  OKR ".into(), weight: 9, lang: "en".into() },
            Hotword { text: "   ".into(), weight: 3, lang: "en".into() },
            Hotword { text: "Gantt".into(), weight: 0, lang: "en".into() },
        ]);
        assert_eq!(update.hotwords.len(), 2);
        assert_eq!(update.hotwords[0].text, "OKR");
        assert_eq!(update.hotwords[0].weight, 5);
        assert_eq!(update.hotwords[1].weight, 1);
    }
}
