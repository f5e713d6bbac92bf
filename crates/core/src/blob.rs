//! BlobStore trait: page images stored next to the indexed documents.

use async_trait::async_trait;
use crate::error::BlobError;

/// Fetches the rendered image for a source page.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Return the page image as base64-encoded PNG, or `None` when the blob
    /// exists but carries no content settings.
    ///
    /// The blob name is the source page with its extension replaced by `.png`.
    async fn fetch_image(&self, source_page: &str) -> Result<Option<String>, BlobError>;
}

/// Map a source page name to the blob holding its rendered image.
///
/// `"report-7.pdf"` becomes `"report-7.png"`; a name without an extension
/// just gains `.png`. Only the last path segment is considered, and its
/// leading dots never start an extension.
pub fn image_blob_name(source_page: &str) -> String {
    let file_start = source_page.rfind('/').map_or(0, |slash| slash + 1);
    let file_name = &source_page[file_start..];
    let leading_dots = file_name.len() - file_name.trim_start_matches('.').len();

    let base = match file_name.rfind('.') {
        Some(dot) if dot > leading_dots => &source_page[..file_start + dot],
        _ => source_page,
    };
    format!("{base}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_extension_with_png() {
        assert_eq!(image_blob_name("Report 2023-7.pdf"), "Report 2023-7.png");
        assert_eq!(image_blob_name("Report 2023-7.png"), "Report 2023-7.png");
    }

    #[test]
    fn appends_png_without_extension() {
        assert_eq!(image_blob_name("page-3"), "page-3.png");
        assert_eq!(image_blob_name("dir.v2/page"), "dir.v2/page.png");
    }

    #[test]
    fn keeps_leading_dot_names() {
        assert_eq!(image_blob_name(".hidden"), ".hidden.png");
        assert_eq!(image_blob_name("..hidden"), "..hidden.png");
    }

    #[test]
    fn leading_dot_is_checked_per_segment() {
        assert_eq!(image_blob_name("dir/.hidden"), "dir/.hidden.png");
        assert_eq!(image_blob_name("dir/.hidden.pdf"), "dir/.hidden.png");
        assert_eq!(image_blob_name("a.b/c.pdf"), "a.b/c.png");
    }
}
