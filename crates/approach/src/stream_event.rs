//! Streaming events for chat answers.
//!
//! A stream always opens with `context` (data points and thoughts, known
//! before the model starts), then `delta`s of answer text, an optional
//! `followups`, and finally `done` or `error`.

use serde::{Deserialize, Serialize};
use sourcewell_core::document::DataPoints;
use sourcewell_core::provider::Usage;
use sourcewell_core::thought::ThoughtStep;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    /// What the answer is grounded on.
    Context {
        data_points: DataPoints,
        thoughts: Vec<ThoughtStep>,
    },

    /// Partial answer text.
    Delta { content: String },

    /// Suggested follow-up questions, parsed from the withheld tail.
    Followups { questions: Vec<String> },

    /// The answer is complete.
    Done { usage: Option<Usage> },

    /// The stream failed mid-answer.
    Error { message: String },
}

impl ChatStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Context { .. } => "context",
            Self::Delta { .. } => "delta",
            Self::Followups { .. } => "followups",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}
