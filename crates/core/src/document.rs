//! Retrieved documents.
//!
//! A [`RawSearchResult`] is the record shape returned by the search index;
//! [`Document`] is the normalized, read-only form the approaches work with.
//! Documents live for one request only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A semantic caption extracted by the index for a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<String>,
}

/// One result record as returned by the search index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSearchResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, rename = "imageEmbedding")]
    pub image_embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sourcepage: Option<String>,
    #[serde(default)]
    pub sourcefile: Option<String>,
    #[serde(default)]
    pub oids: Option<Vec<String>>,
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    #[serde(default, rename = "@search.captions")]
    pub captions: Option<Vec<Caption>>,
    #[serde(default, rename = "@search.score")]
    pub score: Option<f64>,
    #[serde(default, rename = "@search.rerankerScore")]
    pub reranker_score: Option<f64>,
}

/// A normalized retrieved document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub image_embedding: Option<Vec<f32>>,
    pub category: Option<String>,
    pub source_page: String,
    pub source_file: String,
    pub oids: BTreeSet<String>,
    pub groups: BTreeSet<String>,
    pub captions: Vec<Caption>,
    pub score: Option<f64>,
    pub reranker_score: Option<f64>,
}

impl From<RawSearchResult> for Document {
    fn from(raw: RawSearchResult) -> Self {
        Self {
            id: raw.id.unwrap_or_default(),
            content: raw.content.unwrap_or_default(),
            embedding: raw.embedding,
            image_embedding: raw.image_embedding,
            category: raw.category,
            source_page: raw.sourcepage.unwrap_or_default(),
            source_file: raw.sourcefile.unwrap_or_default(),
            oids: raw.oids.unwrap_or_default().into_iter().collect(),
            groups: raw.groups.unwrap_or_default().into_iter().collect(),
            captions: raw.captions.unwrap_or_default(),
            score: raw.score,
            reranker_score: raw.reranker_score,
        }
    }
}

impl Document {
    /// The text used for this document in a prompt's `Sources:` block.
    ///
    /// With captions requested and present, the captions joined by ` . `;
    /// otherwise the raw content. Newlines are flattened.
    pub fn source_text(&self, use_captions: bool) -> String {
        let text = if use_captions && !self.captions.is_empty() {
            self.captions
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" . ")
        } else {
            self.content.clone()
        };
        nonewlines(&text)
    }

    /// `"<source page>: <text>"`, the citation-ready line for this document.
    pub fn citation_line(&self, use_captions: bool) -> String {
        format!("{}: {}", self.source_page, self.source_text(use_captions))
    }

    /// Serialize for client-side display, with embeddings abbreviated.
    pub fn serialize_for_results(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "content": self.content,
            "embedding": self.embedding.as_deref().map(trim_embedding),
            "imageEmbedding": self.image_embedding.as_deref().map(trim_embedding),
            "category": self.category,
            "sourcepage": self.source_page,
            "sourcefile": self.source_file,
            "oids": self.oids,
            "groups": self.groups,
            "captions": self.captions,
            "score": self.score,
            "reranker_score": self.reranker_score,
        })
    }
}

/// Abbreviate a vector longer than 2 elements to `"[v0, v1 ...+K more]"`.
///
/// Vectors of length ≤ 2 are returned unchanged as a JSON array.
pub fn trim_embedding(embedding: &[f32]) -> serde_json::Value {
    if embedding.len() > 2 {
        serde_json::Value::String(format!(
            "[{}, {} ...+{} more]",
            embedding[0],
            embedding[1],
            embedding.len() - 2
        ))
    } else {
        serde_json::json!(embedding)
    }
}

/// Replace line breaks with spaces so each source stays on one line.
pub fn nonewlines(s: &str) -> String {
    s.replace('\n', " ").replace('\r', " ")
}

/// The raw material an answer was grounded on, returned for citation display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPoints {
    /// Text snippets, one per document
    pub text: Vec<String>,
    /// Base64-encoded images, one per fetched page image
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawSearchResult {
        serde_json::from_value(serde_json::json!({
            "id": "file-Financial_Market_Analysis_Report_2023_pdf-46696E",
            "content": "Global markets\nrallied in 2023.",
            "embedding": [0.1, 0.2, 0.3, 0.4],
            "imageEmbedding": [0.5, 0.6],
            "category": null,
            "sourcepage": "Financial Market Analysis Report 2023-7.png",
            "sourcefile": "Financial Market Analysis Report 2023.pdf",
            "oids": ["OID_X"],
            "groups": [],
            "@search.score": 0.03279569745063782,
            "@search.captions": [{"text": "Caption: markets rallied.", "highlights": ""}]
        }))
        .unwrap()
    }

    #[test]
    fn normalizes_raw_result() {
        let doc = Document::from(raw());
        assert_eq!(doc.source_page, "Financial Market Analysis Report 2023-7.png");
        assert!(doc.oids.contains("OID_X"));
        assert!(doc.groups.is_empty());
        assert_eq!(doc.captions.len(), 1);
        assert_eq!(doc.category, None);
    }

    #[test]
    fn missing_fields_default() {
        let doc = Document::from(RawSearchResult::default());
        assert_eq!(doc.content, "");
        assert!(doc.captions.is_empty());
        assert!(doc.embedding.is_none());
    }

    #[test]
    fn trims_long_embeddings() {
        assert_eq!(
            trim_embedding(&[0.1, 0.2, 0.3, 0.4]),
            serde_json::json!("[0.1, 0.2 ...+2 more]")
        );
    }

    #[test]
    fn leaves_short_embeddings_alone() {
        assert_eq!(trim_embedding(&[0.5, 0.6]), serde_json::json!([0.5f32, 0.6f32]));
        assert_eq!(trim_embedding(&[]), serde_json::json!([]));
    }

    #[test]
    fn serialized_results_trim_both_vectors() {
        let json = Document::from(raw()).serialize_for_results();
        assert_eq!(json["embedding"], "[0.1, 0.2 ...+2 more]");
        assert!(json["imageEmbedding"].is_array());
        assert_eq!(json["sourcefile"], "Financial Market Analysis Report 2023.pdf");
    }

    #[test]
    fn source_text_prefers_captions_when_requested() {
        let doc = Document::from(raw());
        assert_eq!(doc.source_text(true), "Caption: markets rallied.");
        assert_eq!(doc.source_text(false), "Global markets rallied in 2023.");
    }

    #[test]
    fn source_text_falls_back_without_captions() {
        let mut doc = Document::from(raw());
        doc.captions.clear();
        assert_eq!(doc.source_text(true), "Global markets rallied in 2023.");
    }

    #[test]
    fn citation_line_prefixes_source_page() {
        let doc = Document::from(raw());
        assert!(
            doc.citation_line(false)
                .starts_with("Financial Market Analysis Report 2023-7.png: ")
        );
    }
}
