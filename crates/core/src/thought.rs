//! Thought steps: the diagnostic trace returned alongside an answer.

use serde::{Deserialize, Serialize};

/// One entry of the trace: what the approach did and with which inputs.
///
/// Purely observational; never read back by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtStep {
    pub title: String,
    /// Free-form payload: a string, a list of results, a prompt...
    pub description: serde_json::Value,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub props: serde_json::Map<String, serde_json::Value>,
}

impl ThoughtStep {
    pub fn new(title: impl Into<String>, description: impl Into<serde_json::Value>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            props: serde_json::Map::new(),
        }
    }

    /// Attach an auxiliary key/value.
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_without_empty_props() {
        let json = serde_json::to_value(ThoughtStep::new("Results", vec!["a", "b"])).unwrap();
        assert_eq!(json["title"], "Results");
        assert_eq!(json["description"][1], "b");
        assert!(json.get("props").is_none());
    }

    #[test]
    fn props_are_retrievable_by_key() {
        let step = ThoughtStep::new("Search Query", "rust async")
            .with_prop("semanticCaptions", false)
            .with_prop("model", "gpt-4");
        assert_eq!(step.props["semanticCaptions"], false);
        assert_eq!(step.props["model"], "gpt-4");
    }
}
