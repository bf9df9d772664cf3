//! Reference discovery for HTML and CSS text.
//!
//! Scanning is side-effect free: the same text always yields the same ordered list of
//! references, each carrying the byte span of its URL so the rewriter can splice
//! replacements without re-parsing.

mod css;
mod html;

pub use css::extract_css;
pub use html::extract_html;

use crate::asset_paths::{LocalUrl, classify};
use crate::models::{FileFormat, Reference, UrlKind};

/// Extract the references held by `text`, interpreted as `format`.
///
/// Opaque files never carry references. Local URLs without a path (`#top`, `?page=2`)
/// point back into the same document and are not references.
pub fn extract_references(text: &str, format: FileFormat) -> Vec<Reference> {
    let references = match format {
        FileFormat::Html => extract_html(text),
        FileFormat::Css => extract_css(text),
        FileFormat::Opaque => return Vec::new(),
    };

    references
        .into_iter()
        .filter(|reference| {
            classify(&reference.url) != UrlKind::Local || !LocalUrl::split(&reference.url).is_empty()
        })
        .collect()
}
