//! `url(...)` and `@import` discovery in stylesheet text.

use std::ops::Range;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::models::{Reference, ReferenceContext};

fn url_function() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\burl\(\s*(?:"([^"\r\n]*)"|'([^'\r\n]*)'|([^\s"'()]*))\s*\)"#)
            .expect("invalid url() regex")
    })
}

fn import_string() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)@import\s+(?:"([^"\r\n]*)"|'([^'\r\n]*)')"#)
            .expect("invalid @import regex")
    })
}

fn comment() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)/\*.*?(?:\*/|\z)").expect("invalid comment regex"))
}

/// Collect every reference in a stylesheet, in text order.
pub fn extract_css(css: &str) -> Vec<Reference> {
    let mut references = Vec::new();
    extract_css_into(css, 0, &mut references);
    references
}

/// Append references found in `css` to `references`, shifting spans by `offset`.
///
/// Used for whole stylesheets as well as `<style>` bodies and `style` attributes
/// embedded in HTML.
pub(crate) fn extract_css_into(css: &str, offset: usize, references: &mut Vec<Reference>) {
    let comments: Vec<Range<usize>> = comment().find_iter(css).map(|m| m.range()).collect();
    let in_comment = |pos: usize| comments.iter().any(|range| range.contains(&pos));

    let mut found = Vec::new();
    for caps in url_function().captures_iter(css) {
        push_capture(&caps, ReferenceContext::CssUrl, &in_comment, offset, &mut found);
    }
    for caps in import_string().captures_iter(css) {
        push_capture(&caps, ReferenceContext::CssImport, &in_comment, offset, &mut found);
    }

    found.sort_by_key(|reference: &Reference| reference.span.start);
    references.extend(found);
}

fn push_capture(
    caps: &Captures<'_>,
    context: ReferenceContext,
    in_comment: &impl Fn(usize) -> bool,
    offset: usize,
    found: &mut Vec<Reference>,
) {
    let Some(whole) = caps.get(0) else {
        return;
    };
    if in_comment(whole.start()) {
        return;
    }

    let Some(value) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
        return;
    };
    if value.as_str().trim().is_empty() {
        return;
    }

    found.push(Reference {
        url: value.as_str().to_string(),
        span: offset + value.start()..offset + value.end(),
        context,
        in_attribute: false,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(css: &str) -> Vec<String> {
        extract_css(css).into_iter().map(|r| r.url).collect()
    }

    #[test]
    fn finds_quoted_and_unquoted_urls() {
        let css = r#"a { background: url(a.png); } b { background: url('b.png') } c { src: url("c.woff") }"#;
        assert_eq!(urls(css), vec!["a.png", "b.png", "c.woff"]);
    }

    #[test]
    fn tolerates_whitespace_inside_parentheses() {
        let css = "a { background: url(  \"../img/a.png\"   ) }";
        let refs = extract_css(css);
        assert_eq!(refs.len(), 1);
        assert_eq!(&css[refs[0].span.clone()], "../img/a.png");
    }

    #[test]
    fn finds_urls_inside_nested_at_rules() {
        let css = "@media screen { @supports (display: grid) { .x { background: URL(nested.png) } } }";
        assert_eq!(urls(css), vec!["nested.png"]);
    }

    #[test]
    fn finds_string_imports_in_order() {
        let css = "@import 'base.css';\n@import url(theme.css);\nbody { background: url(bg.png) }";
        let refs = extract_css(css);
        assert_eq!(
            refs.iter().map(|r| r.url.as_str()).collect::<Vec<_>>(),
            vec!["base.css", "theme.css", "bg.png"]
        );
        assert_eq!(refs[0].context, ReferenceContext::CssImport);
        assert_eq!(refs[1].context, ReferenceContext::CssUrl);
    }

    #[test]
    fn ignores_empty_and_commented_urls() {
        let css = "a { background: url() } /* b { background: url(hidden.png) } */ c { x: url('') }";
        assert!(urls(css).is_empty());
    }

    #[test]
    fn leaves_unterminated_quotes_inert() {
        let css = "a { background: url(\"broken.png) }";
        assert!(urls(css).is_empty());
    }

    #[test]
    fn shifts_spans_by_offset() {
        let mut refs = Vec::new();
        extract_css_into("background:url(x.png)", 10, &mut refs);
        assert_eq!(refs[0].span, 25..30);
    }
}
