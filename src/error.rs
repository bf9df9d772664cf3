//! Error kinds surfaced by the copy pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CopyError>;

/// Fatal failures that abort a copy run.
///
/// Malformed references are not represented here: the extractor treats them as inert
/// text and the run continues.
#[derive(Debug, Error)]
pub enum CopyError {
  /// A local reference resolved to a file that cannot be read.
  #[error("missing resource {} referenced from {referrer}", path.display())]
  MissingResource {
    /// Canonical filesystem path of the missing target.
    path: PathBuf,
    /// Output-relative path of the file holding the reference.
    referrer: String,
    /// Underlying I/O failure.
    #[source]
    source: std::io::Error,
  },

  /// Invalid options, detected before any file is processed.
  #[error("invalid configuration: {0}")]
  Config(String),

  /// Two different resources were mapped onto the same output path.
  #[error("output path {relative} is claimed by both {} and {}", first.display(), second.display())]
  OutputCollision {
    /// The contested output-relative path.
    relative: String,
    /// Resource that claimed the path first.
    first: PathBuf,
    /// Resource that attempted to claim it afterwards.
    second: PathBuf,
  },

  /// A resource would be written outside the output root.
  #[error("{} would be emitted as {relative}, outside the output root", path.display())]
  OutsideOutputRoot {
    /// Canonical filesystem path of the resource.
    path: PathBuf,
    /// The offending output-relative path.
    relative: String,
  },

  /// I/O failure not tied to a reference (reading an input, installing an output).
  #[error("I/O error at {}", path.display())]
  Io {
    /// Path being read or written.
    path: PathBuf,
    /// Underlying I/O failure.
    #[source]
    source: std::io::Error,
  },
}

impl CopyError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}
