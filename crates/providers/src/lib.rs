//! Model endpoint clients for sourcewell.
//!
//! [`OpenAiCompatClient`] implements both `sourcewell_core::ChatModel` and
//! `sourcewell_core::EmbeddingService`; [`VisionVectorizer`] adds image-space
//! query vectors for retrieval over page images.

pub mod openai_compat;
pub mod vision;

pub use openai_compat::OpenAiCompatClient;
pub use vision::{CombinedEmbeddings, VisionVectorizer};
