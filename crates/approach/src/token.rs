//! Token accounting for chat messages.
//!
//! Two counters share one trait:
//! - [`TiktokenCounter`]: exact BPE counts with the cl100k_base encoding
//! - [`HeuristicCounter`]: ~4 characters per token, no vocabulary needed
//!
//! Both apply the same model table: deployment-style names map to their
//! OpenAI equivalents, experimental vision models count as zero, and any
//! other unknown model is rejected.

use sourcewell_core::error::TokenError;
use sourcewell_core::message::{Message, Role};
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

/// Vision models whose token accounting isn't known; they count as zero.
pub const EXPERIMENTAL_MODELS: &[&str] = &["gptv", "gpt4v", "gpt-4v"];

/// Context window assumed for experimental models and an empty model id.
pub const EXPERIMENTAL_TOKEN_LIMIT: usize = 32000;

/// Fixed cost charged for each image part.
pub const IMAGE_PLACEHOLDER_TOKENS: usize = 85;

const MODEL_TOKEN_LIMITS: &[(&str, usize)] = &[
    ("gpt-35-turbo", 4000),
    ("gpt-3.5-turbo", 4000),
    ("gpt-35-turbo-16k", 16000),
    ("gpt-3.5-turbo-16k", 16000),
    ("gpt-4", 8100),
    ("gpt-4-32k", 32000),
];

/// Azure deployment model names and their OpenAI equivalents.
const AZURE_TO_OPENAI: &[(&str, &str)] = &[
    ("gpt-35-turbo", "gpt-3.5-turbo"),
    ("gpt-35-turbo-16k", "gpt-3.5-turbo-16k"),
];

pub fn is_experimental(model_id: &str) -> bool {
    EXPERIMENTAL_MODELS.contains(&model_id)
}

/// Context window size for a model.
pub fn token_limit(model_id: &str) -> Result<usize, TokenError> {
    if model_id.is_empty() || is_experimental(model_id) {
        return Ok(EXPERIMENTAL_TOKEN_LIMIT);
    }
    MODEL_TOKEN_LIMITS
        .iter()
        .find(|(name, _)| *name == model_id)
        .map(|(_, limit)| *limit)
        .ok_or_else(|| TokenError::UnsupportedModel(model_id.to_string()))
}

/// The OpenAI model name a tokenizer should be chosen for.
pub fn openai_model_name(model_id: &str) -> Result<&str, TokenError> {
    if let Some((_, oai)) = AZURE_TO_OPENAI.iter().find(|(azure, _)| *azure == model_id) {
        return Ok(*oai);
    }
    if MODEL_TOKEN_LIMITS.iter().any(|(name, _)| *name == model_id) {
        return Ok(model_id);
    }
    Err(TokenError::UnsupportedModel(model_id.to_string()))
}

/// Counts the tokens a message occupies in a model's context window.
pub trait TokenCounter: Send + Sync {
    /// Short name for logs ("tiktoken", "heuristic").
    fn name(&self) -> &str;

    /// Tokens in a piece of text.
    fn count_text(&self, text: &str) -> usize;

    /// Tokens spent on a message's role and framing.
    fn framing_tokens(&self, role: Role) -> usize;

    /// Total cost of `message` under `model_id`.
    ///
    /// Experimental models cost zero; unknown models are an error.
    fn count(&self, message: &Message, model_id: &str) -> Result<usize, TokenError> {
        if is_experimental(model_id) {
            return Ok(0);
        }
        openai_model_name(model_id)?;

        let text: usize = message
            .content
            .text_fragments()
            .into_iter()
            .map(|t| self.count_text(t))
            .sum();
        let images = message.content.image_count() * IMAGE_PLACEHOLDER_TOKENS;
        Ok(self.framing_tokens(message.role) + text + images)
    }

    /// Sum of [`count`](Self::count) over `messages`.
    fn count_all(&self, messages: &[Message], model_id: &str) -> Result<usize, TokenError> {
        messages.iter().map(|m| self.count(m, model_id)).sum()
    }
}

/// Exact counts with the cl100k_base BPE (GPT-3.5 and GPT-4 families).
#[derive(Clone)]
pub struct TiktokenCounter {
    bpe: Arc<CoreBPE>,
}

impl TiktokenCounter {
    pub fn new() -> Result<Self, TokenError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| TokenError::TokenizerUnavailable(e.to_string()))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl TokenCounter for TiktokenCounter {
    fn name(&self) -> &str {
        "tiktoken"
    }

    fn count_text(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// 2 for the "role" and "content" keys, plus the role value itself.
    fn framing_tokens(&self, role: Role) -> usize {
        2 + self.count_text(role.as_str())
    }
}

/// ~4 characters per token, rounded up, with 4 tokens of framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn count_text(&self, text: &str) -> usize {
        text.len().div_ceil(4)
    }

    fn framing_tokens(&self, _role: Role) -> usize {
        4
    }
}

/// Build the counter named in config (`tiktoken` or `heuristic`).
pub fn counter_from_name(name: &str) -> Result<Arc<dyn TokenCounter>, TokenError> {
    match name {
        "tiktoken" => Ok(Arc::new(TiktokenCounter::new()?)),
        "heuristic" => Ok(Arc::new(HeuristicCounter)),
        other => Err(TokenError::TokenizerUnavailable(format!(
            "unknown tokenizer '{other}'"
        ))),
    }
}
