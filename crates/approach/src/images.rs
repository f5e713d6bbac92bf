//! Page image fetching for vision prompts.

use futures::future::join_all;
use sourcewell_core::blob::BlobStore;
use sourcewell_core::document::Document;
use tracing::warn;

/// Fetch the page image of every document concurrently.
///
/// Results keep document order. A failed or empty fetch drops that image
/// and the rest of the answer goes ahead without it.
pub async fn fetch_page_images(blobs: &dyn BlobStore, documents: &[Document]) -> Vec<String> {
    let fetches = documents.iter().map(|d| blobs.fetch_image(&d.source_page));
    join_all(fetches)
        .await
        .into_iter()
        .zip(documents)
        .filter_map(|(result, doc)| match result {
            Ok(image) => image,
            Err(e) => {
                warn!(source_page = %doc.source_page, error = %e, "Page image unavailable, omitting");
                None
            }
        })
        .collect()
}
