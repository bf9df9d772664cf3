//! Splice replacement URLs into the original text.

use std::ops::Range;

/// One span of the original text and the string that replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
  /// Byte range in the original text.
  pub span: Range<usize>,
  /// Replacement text.
  pub replacement: String,
}

/// Build the rewritten text by copying untouched regions and splicing in replacements.
///
/// Edits are applied in span order. An edit overlapping one already applied, or falling
/// outside the text, is dropped so the result is always well-formed.
pub fn apply_edits(text: &str, edits: &[Edit]) -> String {
  let mut ordered: Vec<&Edit> = edits.iter().collect();
  ordered.sort_by_key(|edit| edit.span.start);

  let mut result = String::with_capacity(text.len() + 64);
  let mut cursor = 0;

  for edit in ordered {
    let Range { start, end } = edit.span;
    if start < cursor || end > text.len() || start > end {
      continue;
    }
    if !text.is_char_boundary(start) || !text.is_char_boundary(end) {
      continue;
    }
    result.push_str(&text[cursor..start]);
    result.push_str(&edit.replacement);
    cursor = end;
  }

  result.push_str(&text[cursor..]);
  result
}
