// API models - Minutes
use serde::{Deserialize, Serialize};

/// Persisted meeting minutes (`GET /recordings/{id}/minutes`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Minutes {
    #[serde(default)]
    pub id: Option<i64>,
    /// Markdown body
    pub content: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body for `PUT /recordings/{id}/minutes`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MinutesUpdate {
    pub content: String,
}
