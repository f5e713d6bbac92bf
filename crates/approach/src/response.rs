//! The answer returned by an approach.

use serde::{Deserialize, Serialize};
use sourcewell_core::document::DataPoints;
use sourcewell_core::provider::Usage;
use sourcewell_core::thought::ThoughtStep;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Answer text, follow-up markers removed
    pub answer: String,
    pub data_points: DataPoints,
    pub thoughts: Vec<ThoughtStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub followup_questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Thought titles in order, handy for logs and assertions.
    pub fn thought_titles(&self) -> Vec<&str> {
        self.thoughts.iter().map(|t| t.title.as_str()).collect()
    }
}
