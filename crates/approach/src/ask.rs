//! Ask approach: single-shot retrieve-then-read.
//!
//! The question is the search query; there is no rewrite step and no
//! history. Text models get the question with a `Sources:` block followed
//! by one worked example; vision models get the question, the sources and
//! the page images in one multi-part message.

use std::sync::Arc;
use sourcewell_core::blob::BlobStore;
use sourcewell_core::document::DataPoints;
use sourcewell_core::error::{Error, Result};
use sourcewell_core::message::{ContentPart, Message, MessageContent};
use sourcewell_core::overrides::{AuthClaims, RequestOverrides};
use sourcewell_core::provider::{ChatModel, ChatRequest};
use sourcewell_core::thought::ThoughtStep;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::chat::prompt_lines;
use crate::filter::build_filter;
use crate::images::fetch_page_images;
use crate::prompts::{
    ASK_EXAMPLE_ANSWER, ASK_EXAMPLE_QUESTION, ASK_SYSTEM_TEMPLATE, ASK_VISION_SYSTEM_TEMPLATE,
};
use crate::response::ChatResponse;
use crate::retriever::DocumentRetriever;
use crate::settings::{ApproachSettings, Capabilities};

pub struct AskApproach {
    model: Arc<dyn ChatModel>,
    retriever: DocumentRetriever,
    blobs: Option<Arc<dyn BlobStore>>,
    settings: ApproachSettings,
    capabilities: Capabilities,
}

impl AskApproach {
    pub fn new(
        model: Arc<dyn ChatModel>,
        retriever: DocumentRetriever,
        settings: ApproachSettings,
    ) -> Self {
        Self {
            model,
            retriever,
            blobs: None,
            settings,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub async fn run(
        &self,
        question: &str,
        overrides: &RequestOverrides,
        claims: &AuthClaims,
    ) -> Result<ChatResponse> {
        let span = info_span!("ask", question_len = question.len());
        async move {
            overrides.validate()?;
            if question.trim().is_empty() {
                return Err(Error::InvalidRequest("question must not be empty".into()));
            }

            let vision = overrides.use_gpt4v && self.capabilities.vision.is_enabled();
            if overrides.use_gpt4v && !vision {
                warn!("Vision requested but not enabled, answering from text only");
            }

            let filter = build_filter(overrides, claims);
            let retrieval = self
                .retriever
                .retrieve(question, overrides, filter, vision)
                .await?;

            let sources = retrieval.citation_lines();
            let sources_block = format!("Sources:\n{}", sources.join("\n"));

            let (model, template) = if vision {
                (&self.settings.vision_model, ASK_VISION_SYSTEM_TEMPLATE)
            } else {
                (&self.settings.chat_model, ASK_SYSTEM_TEMPLATE)
            };
            let system = overrides.prompt_override().unwrap_or(template);

            let mut images = Vec::new();
            let mut messages = vec![Message::system(system)];
            if vision {
                let mut parts = vec![ContentPart::text(question)];
                if overrides.gpt4v_input.include_text() {
                    parts.push(ContentPart::text(sources_block));
                }
                if overrides.gpt4v_input.include_images() {
                    match &self.blobs {
                        Some(blobs) => {
                            images = fetch_page_images(blobs.as_ref(), &retrieval.documents).await;
                        }
                        None => warn!("No blob store configured, sending no page images"),
                    }
                    parts.extend(images.iter().map(|i| ContentPart::png_base64(i)));
                }
                messages.push(Message::user(MessageContent::Parts(parts)));
            } else {
                messages.push(Message::user(format!("{question}\n{sources_block}")));
                messages.push(Message::assistant(ASK_EXAMPLE_ANSWER));
                messages.push(Message::user(ASK_EXAMPLE_QUESTION));
            }

            let default_temperature = if vision {
                self.settings.chat_temperature
            } else {
                self.settings.ask_temperature
            };
            let temperature = overrides.temperature.unwrap_or(default_temperature);

            let thoughts = vec![
                ThoughtStep::new("Search Query", retrieval.query_text.clone())
                    .with_prop(
                        "vectorFields",
                        retrieval
                            .vector_fields
                            .iter()
                            .map(|f| f.as_str())
                            .collect::<Vec<_>>(),
                    )
                    .with_prop("semanticCaptions", retrieval.use_semantic_captions),
                ThoughtStep::new("Results", retrieval.serialized_results()),
                ThoughtStep::new("Prompt", prompt_lines(&messages)?),
            ];

            debug!(
                documents = retrieval.documents.len(),
                images = images.len(),
                model = %model,
                "Ask prompt assembled"
            );

            let completion = self
                .model
                .complete(
                    ChatRequest::new(model, messages)
                        .with_temperature(temperature)
                        .with_max_tokens(self.settings.response_token_limit),
                )
                .await?;

            info!(answer_len = completion.content.len(), "Ask answer generated");

            Ok(ChatResponse {
                answer: completion.content,
                data_points: DataPoints {
                    text: sources,
                    images,
                },
                thoughts,
                followup_questions: Vec::new(),
                usage: completion.usage,
            })
        }
        .instrument(span)
        .await
    }
}
