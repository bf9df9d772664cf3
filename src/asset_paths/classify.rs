use regex::Regex;

use crate::models::UrlKind;

fn scheme_prefix() -> &'static Regex {
    use std::sync::OnceLock;

    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("invalid scheme regex"))
}

/// Classify a raw URL string as written in a document.
///
/// The rules apply in order: an explicit `scheme:` makes the URL remote, a leading `//`
/// makes it protocol-relative, and everything else is a local path.
pub fn classify(url: &str) -> UrlKind {
    let url = url.trim();
    if scheme_prefix().is_match(url) {
        UrlKind::Remote
    } else if url.starts_with("//") {
        UrlKind::SchemelessRemote
    } else {
        UrlKind::Local
    }
}
