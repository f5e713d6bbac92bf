//! Chat approach: rewrite the question into a search query, retrieve, then
//! answer from the retrieved sources.
//!
//! # Flow
//!
//! 1. Validate the request: history must end with a user turn
//! 2. Ask the chat model for a search query (temperature 0, few-shot)
//! 3. Retrieve documents with the query, the filter and the override flags
//! 4. Build the answer prompt: system template, kept history, question +
//!    `Sources:` block, page images when vision is on
//! 5. Call the answer model, whole or streamed
//!
//! Steps 1-4 are shared by [`ChatApproach::run`] and
//! [`ChatApproach::run_stream`]; only the final call differs.

use std::sync::Arc;
use sourcewell_core::blob::BlobStore;
use sourcewell_core::document::DataPoints;
use sourcewell_core::error::{Error, Result};
use sourcewell_core::message::{ContentPart, Message, MessageContent, Role};
use sourcewell_core::overrides::{AuthClaims, RequestOverrides};
use sourcewell_core::provider::{ChatCompletion, ChatModel, ChatRequest};
use sourcewell_core::thought::ThoughtStep;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::filter::build_filter;
use crate::followup::{FollowupSplitter, extract_followup_questions};
use crate::images::fetch_page_images;
use crate::message_builder::MessageBuilder;
use crate::prompts::{
    CHAT_SYSTEM_TEMPLATE, CHAT_VISION_SYSTEM_TEMPLATE, FOLLOWUP_QUESTIONS_PROMPT,
    NO_QUERY_SENTINEL, QUERY_PROMPT_TEMPLATE, QUERY_REQUEST_PREFIX, SEARCH_FUNCTION_NAME,
    query_few_shots, render_system_prompt,
};
use crate::response::ChatResponse;
use crate::retriever::DocumentRetriever;
use crate::settings::{ApproachSettings, Capabilities};
use crate::stream_event::ChatStreamEvent;
use crate::token::{TokenCounter, token_limit};

/// Buffer between the streaming task and the consumer.
const STREAM_BUFFER: usize = 64;

/// Pick the search query out of the rewrite completion.
///
/// A `search_sources` function call wins; otherwise the text content. The
/// `"0"` sentinel, empty content, or an unusable function call fall back to
/// the user's own words.
pub fn search_query_from(completion: &ChatCompletion, user_query: &str) -> String {
    if let Some(call) = &completion.function_call {
        if call.name == SEARCH_FUNCTION_NAME {
            let query = serde_json::from_str::<serde_json::Value>(&call.arguments)
                .ok()
                .and_then(|args| args.get("search_query")?.as_str().map(str::to_string));
            if let Some(q) = query.filter(|q| q != NO_QUERY_SENTINEL) {
                return q;
            }
        }
        return user_query.to_string();
    }

    let content = completion.content.trim();
    if content.is_empty() || content == NO_QUERY_SENTINEL {
        return user_query.to_string();
    }
    content.to_string()
}

/// Render prompt messages for the "Prompt" thought.
pub(crate) fn prompt_lines(messages: &[Message]) -> Result<Vec<String>> {
    messages
        .iter()
        .map(|m| serde_json::to_string(m).map_err(Error::from))
        .collect()
}

/// Everything known right before the final model call.
struct PreparedAnswer {
    request: ChatRequest,
    data_points: DataPoints,
    thoughts: Vec<ThoughtStep>,
    suggest_followups: bool,
}

pub struct ChatApproach {
    model: Arc<dyn ChatModel>,
    retriever: DocumentRetriever,
    blobs: Option<Arc<dyn BlobStore>>,
    counter: Arc<dyn TokenCounter>,
    settings: ApproachSettings,
    capabilities: Capabilities,
}

impl ChatApproach {
    pub fn new(
        model: Arc<dyn ChatModel>,
        retriever: DocumentRetriever,
        counter: Arc<dyn TokenCounter>,
        settings: ApproachSettings,
    ) -> Self {
        Self {
            model,
            retriever,
            blobs: None,
            counter,
            settings,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Blob store for page images (vision mode only).
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Whether this request goes to the vision model.
    fn vision_for(&self, overrides: &RequestOverrides) -> bool {
        if !overrides.use_gpt4v {
            return false;
        }
        if !self.capabilities.vision.is_enabled() {
            warn!("Vision requested but not enabled, answering from text only");
            return false;
        }
        true
    }

    /// Answer a conversation in one response.
    pub async fn run(
        &self,
        history: &[Message],
        overrides: &RequestOverrides,
        claims: &AuthClaims,
    ) -> Result<ChatResponse> {
        let span = info_span!("chat", turns = history.len(), stream = false);
        async move {
            let prepared = self.prepare(history, overrides, claims).await?;
            let completion = self.model.complete(prepared.request).await?;

            let (answer, followup_questions) = if prepared.suggest_followups {
                extract_followup_questions(&completion.content)
            } else {
                (completion.content, Vec::new())
            };

            info!(
                answer_len = answer.len(),
                followups = followup_questions.len(),
                "Chat answer generated"
            );

            Ok(ChatResponse {
                answer,
                data_points: prepared.data_points,
                thoughts: prepared.thoughts,
                followup_questions,
                usage: completion.usage,
            })
        }
        .instrument(span)
        .await
    }

    /// Answer a conversation as a stream of events.
    ///
    /// Failures before the model starts answering are returned as `Err`;
    /// failures after that arrive as a final [`ChatStreamEvent::Error`].
    /// Dropping the receiver stops the producer.
    pub async fn run_stream(
        &self,
        history: &[Message],
        overrides: &RequestOverrides,
        claims: &AuthClaims,
    ) -> Result<mpsc::Receiver<ChatStreamEvent>> {
        if !self.capabilities.streaming {
            return Err(Error::InvalidRequest("streaming is not enabled".into()));
        }

        let span = info_span!("chat", turns = history.len(), stream = true);
        let (prepared, mut chunks) = async {
            let prepared = self.prepare(history, overrides, claims).await?;
            let chunks = self.model.stream(prepared.request.clone()).await?;
            Ok::<_, Error>((prepared, chunks))
        }
        .instrument(span.clone())
        .await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let PreparedAnswer {
            data_points,
            thoughts,
            suggest_followups,
            ..
        } = prepared;

        tokio::spawn(
            async move {
                if tx
                    .send(ChatStreamEvent::Context {
                        data_points,
                        thoughts,
                    })
                    .await
                    .is_err()
                {
                    return;
                }

                let mut splitter = suggest_followups.then(FollowupSplitter::new);
                let mut usage = None;
                let mut streamed = 0usize;

                while let Some(chunk) = chunks.recv().await {
                    let chunk = match chunk {
                        Ok(c) => c,
                        Err(e) => {
                            warn!(error = %e, "Answer stream failed");
                            let _ = tx
                                .send(ChatStreamEvent::Error {
                                    message: e.to_string(),
                                })
                                .await;
                            return;
                        }
                    };

                    if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                        let visible = match splitter.as_mut() {
                            Some(s) => s.feed(&content),
                            None => content,
                        };
                        if !visible.is_empty() {
                            streamed += visible.len();
                            if tx.send(ChatStreamEvent::Delta { content: visible }).await.is_err() {
                                debug!("Stream receiver dropped");
                                return;
                            }
                        }
                    }

                    if chunk.usage.is_some() {
                        usage = chunk.usage;
                    }
                    if chunk.done {
                        break;
                    }
                }

                if let Some(splitter) = splitter {
                    let (rest, questions) = splitter.finish();
                    if !rest.is_empty() {
                        streamed += rest.len();
                        let _ = tx.send(ChatStreamEvent::Delta { content: rest }).await;
                    }
                    if !questions.is_empty() {
                        let _ = tx.send(ChatStreamEvent::Followups { questions }).await;
                    }
                }

                info!(answer_len = streamed, "Chat stream complete");
                let _ = tx.send(ChatStreamEvent::Done { usage }).await;
            }
            .instrument(span),
        );

        Ok(rx)
    }

    /// Steps 1-4: everything up to the final call.
    async fn prepare(
        &self,
        history: &[Message],
        overrides: &RequestOverrides,
        claims: &AuthClaims,
    ) -> Result<PreparedAnswer> {
        overrides.validate()?;
        let original_query = match history.last() {
            Some(m) if m.role == Role::User && !m.text().trim().is_empty() => m.text(),
            _ => {
                return Err(Error::InvalidRequest(
                    "conversation must end with a non-empty user message".into(),
                ));
            }
        };

        let vision = self.vision_for(overrides);
        let builder =
            MessageBuilder::new(self.counter.as_ref()).with_policy(self.settings.budget_policy);

        // Step 2: search query
        let query_request = format!("{QUERY_REQUEST_PREFIX}{original_query}");
        let chat_limit = token_limit(&self.settings.chat_model)?;
        let query_prompt = builder.build(
            QUERY_PROMPT_TEMPLATE,
            &self.settings.chat_model,
            history,
            query_request.as_str(),
            chat_limit.saturating_sub(query_request.len()),
            &query_few_shots(),
        )?;
        let rewrite = self
            .model
            .complete(
                ChatRequest::new(&self.settings.chat_model, query_prompt.messages)
                    .with_temperature(0.0)
                    .with_max_tokens(self.settings.query_max_tokens),
            )
            .await?;
        let query = search_query_from(&rewrite, &original_query);
        debug!(query = %query, "Search query rewritten");

        // Step 3: retrieve
        let filter = build_filter(overrides, claims);
        let retrieval = self
            .retriever
            .retrieve(&query, overrides, filter, vision)
            .await?;

        // Step 4: answer prompt
        let suggest_followups = overrides.suggest_followup_questions;
        let followup_prompt = if suggest_followups {
            FOLLOWUP_QUESTIONS_PROMPT
        } else {
            ""
        };
        let template = if vision {
            CHAT_VISION_SYSTEM_TEMPLATE
        } else {
            CHAT_SYSTEM_TEMPLATE
        };
        let system_prompt =
            render_system_prompt(template, overrides.prompt_override(), followup_prompt);

        let sources = retrieval.citation_lines();
        let sources_block = format!("\n\nSources:\n{}", sources.join("\n"));

        let (answer_model, user_content, images) = if vision {
            let mut parts = vec![ContentPart::text(original_query.as_str())];
            if overrides.gpt4v_input.include_text() {
                parts.push(ContentPart::text(sources_block));
            }
            let images = match (&self.blobs, overrides.gpt4v_input.include_images()) {
                (Some(blobs), true) => fetch_page_images(blobs.as_ref(), &retrieval.documents).await,
                (None, true) => {
                    warn!("No blob store configured, sending no page images");
                    Vec::new()
                }
                _ => Vec::new(),
            };
            parts.extend(images.iter().map(|i| ContentPart::png_base64(i)));
            (&self.settings.vision_model, MessageContent::Parts(parts), images)
        } else {
            (
                &self.settings.chat_model,
                MessageContent::Text(format!("{original_query}{sources_block}")),
                Vec::new(),
            )
        };

        let answer_limit = token_limit(answer_model)?;
        let messages_limit =
            answer_limit.saturating_sub(self.settings.response_token_limit as usize);
        let prompt = builder.build(
            &system_prompt,
            answer_model,
            history,
            user_content,
            messages_limit,
            &[],
        )?;

        debug!(
            documents = retrieval.documents.len(),
            images = images.len(),
            counted_tokens = prompt.counted_tokens,
            dropped_history = prompt.dropped_history,
            "Answer prompt assembled"
        );

        let thoughts = vec![
            ThoughtStep::new("Search Query", retrieval.query_text.clone())
                .with_prop("semanticCaptions", retrieval.use_semantic_captions)
                .with_prop("Model ID", answer_model.as_str()),
            ThoughtStep::new("Results", retrieval.serialized_results()),
            ThoughtStep::new("Prompt", prompt_lines(&prompt.messages)?),
        ];

        let temperature = overrides
            .temperature
            .unwrap_or(self.settings.chat_temperature);
        let request = ChatRequest::new(answer_model, prompt.messages)
            .with_temperature(temperature)
            .with_max_tokens(self.settings.response_token_limit);

        Ok(PreparedAnswer {
            request,
            data_points: DataPoints {
                text: sources,
                images,
            },
            thoughts,
            suggest_followups,
        })
    }
}
