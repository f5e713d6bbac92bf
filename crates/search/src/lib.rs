//! Search index and blob store implementations for sourcewell.
//!
//! - [`RestSearchIndex`]: hosted search service over REST
//! - [`InMemoryIndex`]: fixed records for tests, records every request
//! - [`HttpBlobStore`] / [`InMemoryBlobStore`]: page images

pub mod blob;
pub mod in_memory;
pub mod rest_index;

pub use blob::{HttpBlobStore, InMemoryBlobStore};
pub use in_memory::InMemoryIndex;
pub use rest_index::RestSearchIndex;
