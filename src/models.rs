//! Data structures flowing through the copy pipeline.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{CopyError, Result};
use crate::options::CopyOptions;

/// How a file's contents are treated by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
  /// HTML document, scanned for attribute and inline-style references.
  Html,
  /// Stylesheet, scanned for `url(...)` and `@import`.
  Css,
  /// Anything else, copied byte-for-byte.
  Opaque,
}

impl FileFormat {
  /// Pick the format from a file extension.
  pub fn from_path(path: &Path) -> Self {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
      return Self::Opaque;
    };

    match ext.to_ascii_lowercase().as_str() {
      "html" | "htm" | "xhtml" => Self::Html,
      "css" => Self::Css,
      _ => Self::Opaque,
    }
  }

  /// Whether files of this format are scanned for references.
  pub fn is_scannable(self) -> bool {
    !matches!(self, Self::Opaque)
  }
}

/// A file handed to the pipeline by its caller.
#[derive(Debug, Clone)]
pub struct InputFile {
  /// Absolute filesystem path.
  pub path: PathBuf,
  /// Root for output-relative paths and root-relative URLs.
  pub base: PathBuf,
  /// Raw bytes, empty for directories.
  pub contents: Vec<u8>,
  /// Directory entries are discarded by the pipeline.
  pub is_dir: bool,
}

impl InputFile {
  /// Build an in-memory input file.
  pub fn new(path: impl Into<PathBuf>, base: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
    Self {
      path: path.into(),
      base: base.into(),
      contents: contents.into(),
      is_dir: false,
    }
  }

  /// Build a directory entry.
  pub fn directory(path: impl Into<PathBuf>, base: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      base: base.into(),
      contents: Vec::new(),
      is_dir: true,
    }
  }

  /// Read a file from disk, resolving `path` against the configured working directory.
  ///
  /// The base defaults to the working directory unless the options carry their own.
  pub fn load(path: impl AsRef<Path>, options: &CopyOptions) -> Result<Self> {
    let cwd = options.resolved_cwd()?;
    let path = cwd.join(path.as_ref());
    let base = options.resolved_base()?.unwrap_or_else(|| cwd.clone());

    let metadata = fs::metadata(&path).map_err(|err| CopyError::io(&path, err))?;
    if metadata.is_dir() {
      return Ok(Self::directory(path, base));
    }

    let contents = fs::read(&path).map_err(|err| CopyError::io(&path, err))?;
    Ok(Self::new(path, base, contents))
  }
}

/// A file produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
  /// Location relative to the output root, always with `/` separators.
  pub relative: String,
  /// Final bytes.
  pub contents: Vec<u8>,
  /// Canonical path the file was read from.
  pub source: PathBuf,
  /// True when `contents` differ from the bytes the pipeline was handed.
  pub rewritten: bool,
}

impl OutputFile {
  /// Size of the final contents in bytes.
  pub fn size(&self) -> usize {
    self.contents.len()
  }
}

/// A discovered or supplied file being processed.
#[derive(Debug, Clone)]
pub struct SourceFile {
  /// Canonical filesystem path, the dedup key.
  pub canonical: PathBuf,
  /// Root the file was discovered under.
  pub base: PathBuf,
  /// Output-relative path, fixed when the file is first recorded.
  pub relative: String,
  /// Raw bytes as read.
  pub contents: Vec<u8>,
  /// Extraction mode.
  pub format: FileFormat,
  /// False when the file sits under a no-recursion directory.
  pub recurse: bool,
}

/// Syntactic position a reference was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceContext {
  /// A URL-valued HTML attribute such as `src` or `href`.
  Attribute {
    /// Lowercased element name.
    element: String,
    /// Lowercased attribute name.
    attribute: String,
  },
  /// One candidate inside a `srcset` attribute.
  Srcset {
    /// Lowercased element name.
    element: String,
  },
  /// `url(...)` inside a stylesheet, `<style>` element or `style` attribute.
  CssUrl,
  /// String form of `@import`.
  CssImport,
}

/// One URL occurrence inside a file's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
  /// The URL as written, with HTML character references decoded.
  pub url: String,
  /// Byte span of the URL in the owning text.
  pub span: Range<usize>,
  /// Where the URL appeared.
  pub context: ReferenceContext,
  /// The URL sits inside an HTML attribute value: `url` is entity-decoded while `span`
  /// covers the raw text, so replacements must be entity-encoded again.
  pub in_attribute: bool,
}

/// Classification of a raw URL string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
  /// Has an explicit scheme (`https:`, `data:`, `mailto:`).
  Remote,
  /// Protocol-relative (`//host/path`).
  SchemelessRemote,
  /// Site-root-relative or document-relative path.
  Local,
}

/// Outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
  /// Classification of the original URL.
  pub kind: UrlKind,
  /// Canonical filesystem path, local targets only.
  pub canonical: Option<PathBuf>,
  /// Output-relative path, local targets only.
  pub relative: Option<String>,
  /// Text substituted for the original URL (may equal it).
  pub replacement: String,
}

impl ResolvedTarget {
  /// A target that leaves the reference as written.
  pub fn untouched(kind: UrlKind, url: &str) -> Self {
    Self {
      kind,
      canonical: None,
      relative: None,
      replacement: url.to_string(),
    }
  }
}
