//! # Sourcewell Approach
//!
//! The retrieval-augmented answer pipeline:
//!
//! - [`token`]: token accounting per model
//! - [`message_builder`]: prompts that fit a token budget
//! - [`filter`]: category and access-control filter expressions
//! - [`retriever`]: one index search, normalized into documents
//! - [`chat`]: query rewrite, retrieve, answer (whole or streamed)
//! - [`ask`]: single-shot retrieve-then-read

pub mod ask;
pub mod chat;
pub mod filter;
pub mod followup;
pub mod images;
pub mod message_builder;
pub mod prompts;
pub mod response;
pub mod retriever;
pub mod settings;
pub mod stream_event;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use ask::AskApproach;
pub use chat::{ChatApproach, search_query_from};
pub use filter::{build_filter, build_security_filter};
pub use followup::{FollowupSplitter, extract_followup_questions};
pub use message_builder::{BudgetPolicy, BuiltPrompt, MessageBuilder};
pub use response::ChatResponse;
pub use retriever::{DocumentRetriever, Retrieval};
pub use settings::{ApproachSettings, Capabilities, VisionMode};
pub use stream_event::ChatStreamEvent;
pub use token::{HeuristicCounter, TiktokenCounter, TokenCounter, counter_from_name, token_limit};
