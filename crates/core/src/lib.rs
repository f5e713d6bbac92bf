//! # Sourcewell Core
//!
//! Domain types, collaborator traits, and error definitions for grounded
//! retrieval-augmented chat. This crate has **no I/O** of its own: the
//! search index, blob store, chat model, and embedding service are all
//! traits here, implemented in their respective crates.
//!
//! All other crates depend inward on core, so approaches can be tested
//! against scripted in-memory collaborators.

pub mod error;
pub mod message;
pub mod provider;
pub mod embedding;
pub mod document;
pub mod index;
pub mod blob;
pub mod thought;
pub mod overrides;

// Re-export key types at crate root for ergonomics
pub use error::{
    BlobError, EmbeddingError, Error, ProviderError, Result, RetrievalError, TokenError,
};
pub use message::{ContentPart, ImageRef, Message, MessageContent, Role};
pub use provider::{ChatCompletion, ChatModel, ChatRequest, ChunkReceiver, FunctionCall, StreamChunk, Usage};
pub use embedding::EmbeddingService;
pub use document::{Caption, DataPoints, Document, RawSearchResult};
pub use index::{DocumentIndex, SearchRequest, VectorField, VectorQuery};
pub use blob::BlobStore;
pub use thought::ThoughtStep;
pub use overrides::{AuthClaims, Gpt4vInput, RequestOverrides, RetrievalMode};
