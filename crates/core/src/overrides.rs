//! Per-request overrides and caller identity.
//!
//! Clients send overrides as a flat JSON object under `context.overrides`.
//! Unknown keys are rejected so typos surface as 400s instead of silently
//! falling back to defaults.

use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::index::VectorField;

/// How documents are retrieved from the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Keyword search only
    Text,
    /// Vector similarity only
    Vectors,
    /// Keyword and vector search combined
    #[default]
    Hybrid,
}

impl RetrievalMode {
    pub fn has_text(&self) -> bool {
        matches!(self, Self::Text | Self::Hybrid)
    }

    pub fn has_vectors(&self) -> bool {
        matches!(self, Self::Vectors | Self::Hybrid)
    }
}

impl std::str::FromStr for RetrievalMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "vectors" => Ok(Self::Vectors),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::InvalidRequest(format!(
                "unknown retrieval mode '{other}' (expected text, vectors or hybrid)"
            ))),
        }
    }
}

/// What a vision-capable model is shown from each retrieved document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gpt4vInput {
    #[default]
    #[serde(rename = "textAndImages")]
    TextAndImages,
    #[serde(rename = "texts")]
    Texts,
    #[serde(rename = "images")]
    Images,
}

impl Gpt4vInput {
    pub fn include_text(&self) -> bool {
        matches!(self, Self::TextAndImages | Self::Texts)
    }

    pub fn include_images(&self) -> bool {
        matches!(self, Self::TextAndImages | Self::Images)
    }
}

fn default_top() -> usize {
    3
}

/// Typed per-request overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestOverrides {
    /// Exclude documents of this category
    #[serde(default)]
    pub exclude_category: Option<String>,

    /// Number of documents to retrieve
    #[serde(default = "default_top")]
    pub top: usize,

    #[serde(default)]
    pub retrieval_mode: RetrievalMode,

    #[serde(default)]
    pub semantic_ranker: bool,

    #[serde(default)]
    pub semantic_captions: bool,

    /// Replaces the system prompt, or with a leading `>>>` is injected into it
    #[serde(default)]
    pub prompt_template: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub suggest_followup_questions: bool,

    #[serde(default)]
    pub gpt4v_input: Gpt4vInput,

    /// Route the request through the vision model
    #[serde(default)]
    pub use_gpt4v: bool,

    /// Vector fields to query; `None` picks from the approach's capabilities
    #[serde(default)]
    pub vector_fields: Option<Vec<VectorField>>,

    #[serde(default)]
    pub use_oid_security_filter: bool,

    #[serde(default)]
    pub use_groups_security_filter: bool,
}

impl Default for RequestOverrides {
    fn default() -> Self {
        Self {
            exclude_category: None,
            top: default_top(),
            retrieval_mode: RetrievalMode::default(),
            semantic_ranker: false,
            semantic_captions: false,
            prompt_template: None,
            temperature: None,
            suggest_followup_questions: false,
            gpt4v_input: Gpt4vInput::default(),
            use_gpt4v: false,
            vector_fields: None,
            use_oid_security_filter: false,
            use_groups_security_filter: false,
        }
    }
}

impl RequestOverrides {
    /// Reject values serde can't rule out on its own.
    pub fn validate(&self) -> Result<()> {
        if self.top == 0 {
            return Err(Error::InvalidRequest("top must be at least 1".into()));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(Error::InvalidRequest(format!(
                    "temperature must be between 0.0 and 2.0, got {t}"
                )));
            }
        }
        Ok(())
    }

    /// The category to exclude, ignoring blank values.
    pub fn excluded_category(&self) -> Option<&str> {
        self.exclude_category.as_deref().filter(|c| !c.is_empty())
    }

    /// The prompt override, ignoring blank values.
    pub fn prompt_override(&self) -> Option<&str> {
        self.prompt_template.as_deref().filter(|p| !p.is_empty())
    }

    /// Captions only make sense when a keyword query is sent.
    pub fn use_semantic_captions(&self) -> bool {
        self.semantic_captions && self.retrieval_mode.has_text()
    }

    pub fn use_semantic_ranker(&self) -> bool {
        self.semantic_ranker && self.retrieval_mode.has_text()
    }

    /// Vector fields to query, or none when the mode has no vector part.
    ///
    /// Without an explicit list: the text embedding field, plus the image
    /// embedding field when the approach can see images.
    pub fn resolved_vector_fields(&self, vision: bool) -> Vec<VectorField> {
        if !self.retrieval_mode.has_vectors() {
            return Vec::new();
        }
        match &self.vector_fields {
            Some(fields) => {
                let mut out: Vec<VectorField> = Vec::with_capacity(fields.len());
                for f in fields {
                    if !out.contains(f) {
                        out.push(*f);
                    }
                }
                out
            }
            None if vision => vec![VectorField::Embedding, VectorField::ImageEmbedding],
            None => vec![VectorField::Embedding],
        }
    }
}

/// Caller identity as established by an upstream authorization layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// Object (owner) id of the caller
    #[serde(default)]
    pub oid: Option<String>,
    /// Group ids the caller belongs to
    #[serde(default)]
    pub groups: Vec<String>,
}

impl AuthClaims {
    pub fn new(oid: Option<String>, groups: Vec<String>) -> Self {
        Self { oid, groups }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let o: RequestOverrides = serde_json::from_str("{}").unwrap();
        assert_eq!(o, RequestOverrides::default());
        assert_eq!(o.top, 3);
        assert_eq!(o.retrieval_mode, RetrievalMode::Hybrid);
        assert_eq!(o.gpt4v_input, Gpt4vInput::TextAndImages);
    }

    #[test]
    fn parses_recognized_keys() {
        let o: RequestOverrides = serde_json::from_value(serde_json::json!({
            "exclude_category": "internal",
            "top": 5,
            "retrieval_mode": "text",
            "semantic_ranker": true,
            "semantic_captions": true,
            "prompt_template": ">>>Answer in French.",
            "temperature": 0.2,
            "suggest_followup_questions": true,
            "gpt4v_input": "images",
            "use_gpt4v": true,
            "vector_fields": ["embedding", "imageEmbedding"]
        }))
        .unwrap();
        assert_eq!(o.top, 5);
        assert_eq!(o.retrieval_mode, RetrievalMode::Text);
        assert_eq!(o.gpt4v_input, Gpt4vInput::Images);
        assert_eq!(
            o.vector_fields,
            Some(vec![VectorField::Embedding, VectorField::ImageEmbedding])
        );
        assert!(o.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = serde_json::from_str::<RequestOverrides>(r#"{"retrival_mode": "text"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_unknown_enum_values() {
        assert!(serde_json::from_str::<RequestOverrides>(r#"{"retrieval_mode": "fuzzy"}"#).is_err());
        assert!(serde_json::from_str::<RequestOverrides>(r#"{"gpt4v_input": "video"}"#).is_err());
    }

    #[test]
    fn validate_rejects_zero_top() {
        let o = RequestOverrides {
            top: 0,
            ..Default::default()
        };
        assert!(matches!(o.validate(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_temperature() {
        let o = RequestOverrides {
            temperature: Some(2.5),
            ..Default::default()
        };
        assert!(o.validate().is_err());
        let o = RequestOverrides {
            temperature: Some(-0.1),
            ..Default::default()
        };
        assert!(o.validate().is_err());
    }

    #[test]
    fn captions_and_ranker_need_text_mode() {
        let o = RequestOverrides {
            retrieval_mode: RetrievalMode::Vectors,
            semantic_captions: true,
            semantic_ranker: true,
            ..Default::default()
        };
        assert!(!o.use_semantic_captions());
        assert!(!o.use_semantic_ranker());
    }

    #[test]
    fn blank_strings_count_as_absent() {
        let o = RequestOverrides {
            exclude_category: Some(String::new()),
            prompt_template: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(o.excluded_category(), None);
        assert_eq!(o.prompt_override(), None);
    }

    #[test]
    fn vector_fields_follow_mode_and_vision() {
        let text = RequestOverrides {
            retrieval_mode: RetrievalMode::Text,
            ..Default::default()
        };
        assert!(text.resolved_vector_fields(true).is_empty());

        let hybrid = RequestOverrides::default();
        assert_eq!(hybrid.resolved_vector_fields(false), vec![VectorField::Embedding]);
        assert_eq!(
            hybrid.resolved_vector_fields(true),
            vec![VectorField::Embedding, VectorField::ImageEmbedding]
        );

        let explicit = RequestOverrides {
            vector_fields: Some(vec![VectorField::ImageEmbedding, VectorField::ImageEmbedding]),
            ..Default::default()
        };
        assert_eq!(explicit.resolved_vector_fields(false), vec![VectorField::ImageEmbedding]);
    }

    #[test]
    fn retrieval_mode_from_str() {
        assert_eq!("vectors".parse::<RetrievalMode>().unwrap(), RetrievalMode::Vectors);
        assert!("semantic".parse::<RetrievalMode>().is_err());
    }
}
