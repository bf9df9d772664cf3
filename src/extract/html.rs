//! Attribute-level reference discovery in HTML text.
//!
//! This is a tag scanner, not a parser: it walks the text tag by tag, reads the
//! URL-bearing attributes of each opening tag, and hands `<style>` bodies and `style`
//! attributes to the stylesheet scanner. Comments and `<script>` bodies are skipped.
//! Attribute values are entity-decoded before they are read; spans still point at the
//! raw text.

use std::ops::Range;
use std::sync::OnceLock;

use html_escape::decode_html_entities;
use log::debug;
use regex::Regex;

use super::css::extract_css_into;
use crate::models::{Reference, ReferenceContext};

/// Attributes whose whole value is a single URL.
const URL_ATTRIBUTES: &[&str] = &["src", "href", "poster", "data"];

fn attribute() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#,
        )
        .expect("invalid attribute regex")
    })
}

fn char_reference() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"&(?:#[0-9]+;?|#[xX][0-9A-Fa-f]+;?|[A-Za-z][A-Za-z0-9]*;)")
            .expect("invalid character reference regex")
    })
}

fn script_close() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)</script\b").expect("invalid script regex"))
}

fn style_close() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)</style\b").expect("invalid style regex"))
}

/// Collect every reference in an HTML document, in text order.
pub fn extract_html(html: &str) -> Vec<Reference> {
    let mut references = Vec::new();
    let bytes = html.as_bytes();
    let mut pos = 0;

    while let Some(found) = html[pos..].find('<') {
        let start = pos + found;
        let rest = &html[start..];

        if rest.starts_with("<!--") {
            match rest.find("-->") {
                Some(end) => pos = start + end + 3,
                None => break,
            }
            continue;
        }

        let opens_element = bytes
            .get(start + 1)
            .is_some_and(|b| b.is_ascii_alphabetic());
        if !opens_element {
            // Closing tags, doctypes and processing instructions carry no references.
            pos = match rest.find('>') {
                Some(end) if rest.as_bytes()[1] == b'/' || rest.as_bytes()[1] == b'!' => start + end + 1,
                _ => start + 1,
            };
            continue;
        }

        let Some(end) = find_tag_end(html, start) else {
            debug!("unterminated tag at byte {start}; leaving the rest of the document untouched");
            break;
        };

        let name_end = html[start + 1..end]
            .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
            .map_or(end, |i| start + 1 + i);
        let element = html[start + 1..name_end].to_ascii_lowercase();

        scan_attributes(html, name_end, end, &element, &mut references);
        pos = end + 1;

        match element.as_str() {
            "script" => {
                pos = match script_close().find_at(html, pos) {
                    Some(close) => close.start(),
                    None => html.len(),
                };
            }
            "style" => {
                let body_end = style_close()
                    .find_at(html, pos)
                    .map_or(html.len(), |close| close.start());
                extract_css_into(&html[pos..body_end], pos, &mut references);
                pos = body_end;
            }
            _ => {}
        }
    }

    references
}

/// Find the `>` that closes the tag opened at `start`, honouring quoted values.
fn find_tag_end(html: &str, start: usize) -> Option<usize> {
    let bytes = html.as_bytes();
    let mut in_quote: Option<u8> = None;

    for (i, &b) in bytes.iter().enumerate().skip(start + 1) {
        match in_quote {
            Some(q) if b == q => in_quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => in_quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }

    None
}

fn scan_attributes(
    html: &str,
    from: usize,
    to: usize,
    element: &str,
    references: &mut Vec<Reference>,
) {
    let attrs = &html[from..to];
    for caps in attribute().captures_iter(attrs) {
        let Some(name) = caps.get(1) else {
            continue;
        };
        let Some(value) = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4)) else {
            continue;
        };

        let name = name.as_str().to_ascii_lowercase();
        let value_start = from + value.start();

        if URL_ATTRIBUTES.contains(&name.as_str()) {
            let decoded = DecodedValue::decode(value.as_str());
            let text = decoded.text.as_str();
            let url = text.trim();
            if url.is_empty() {
                continue;
            }
            let leading = text.len() - text.trim_start().len();
            references.push(Reference {
                url: url.to_string(),
                span: decoded.raw_span(leading..leading + url.len(), value_start),
                context: ReferenceContext::Attribute {
                    element: element.to_string(),
                    attribute: name,
                },
                in_attribute: true,
            });
        } else if name == "srcset" {
            let decoded = DecodedValue::decode(value.as_str());
            scan_srcset(&decoded, value_start, element, references);
        } else if name == "style" {
            let decoded = DecodedValue::decode(value.as_str());
            let mut found = Vec::new();
            extract_css_into(&decoded.text, 0, &mut found);
            references.extend(found.into_iter().map(|reference| Reference {
                span: decoded.raw_span(reference.span.clone(), value_start),
                in_attribute: true,
                ..reference
            }));
        }
    }
}

/// An attribute value with character references decoded.
///
/// `origins[i]` is the raw offset the decoded byte `i` came from; one extra entry maps
/// the end of the text.
struct DecodedValue {
    text: String,
    origins: Vec<usize>,
}

impl DecodedValue {
    fn decode(raw: &str) -> Self {
        let mut text = String::with_capacity(raw.len());
        let mut origins = Vec::with_capacity(raw.len() + 1);
        let mut cursor = 0;

        for found in char_reference().find_iter(raw) {
            text.push_str(&raw[cursor..found.start()]);
            origins.extend(cursor..found.start());

            let decoded = decode_html_entities(found.as_str());
            text.push_str(&decoded);
            origins.extend(std::iter::repeat_n(found.start(), decoded.len()));
            cursor = found.end();
        }

        text.push_str(&raw[cursor..]);
        origins.extend(cursor..=raw.len());
        Self { text, origins }
    }

    /// Map a span over the decoded text back onto the raw text, shifted by `offset`.
    fn raw_span(&self, span: Range<usize>, offset: usize) -> Range<usize> {
        offset + self.origins[span.start]..offset + self.origins[span.end]
    }
}

/// Split a `srcset` value into its candidate URLs.
fn scan_srcset(value: &DecodedValue, offset: usize, element: &str, references: &mut Vec<Reference>) {
    let text = value.text.as_str();
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        let url_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut url_end = i;
        while url_end > url_start && bytes[url_end - 1] == b',' {
            url_end -= 1;
        }
        if url_end > url_start {
            references.push(Reference {
                url: text[url_start..url_end].to_string(),
                span: value.raw_span(url_start..url_end, offset),
                context: ReferenceContext::Srcset {
                    element: element.to_string(),
                },
                in_attribute: true,
            });
        }
        if url_end < i {
            // The URL itself ended the candidate.
            continue;
        }
        while i < bytes.len() && bytes[i] != b',' {
            i += 1;
        }
    }
}
