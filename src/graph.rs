//! Visited-set bookkeeping for one copy run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::asset_paths::is_contained;
use crate::error::{CopyError, Result};

/// Result of recording a canonical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visit {
  /// First time this path was seen; the caller must schedule it.
  New(String),
  /// Already recorded; carries the output path chosen the first time.
  Known(String),
}

impl Visit {
  /// Output-relative path regardless of novelty.
  pub fn relative(&self) -> &str {
    match self {
      Self::New(relative) | Self::Known(relative) => relative,
    }
  }
}

/// Canonical filesystem path to output-relative path, for every resource scheduled for copy.
///
/// A canonical path is recorded at most once. Output paths are kept unique as well, so two
/// resources can never be emitted on top of each other.
#[derive(Debug, Default)]
pub struct VisitedSet {
  by_source: BTreeMap<PathBuf, String>,
  by_output: BTreeMap<String, PathBuf>,
}

impl VisitedSet {
  /// Empty set.
  pub fn new() -> Self {
    Self::default()
  }

  /// Whether `canonical` has been recorded.
  pub fn contains(&self, canonical: &Path) -> bool {
    self.by_source.contains_key(canonical)
  }

  /// Number of recorded resources.
  pub fn len(&self) -> usize {
    self.by_source.len()
  }

  /// Whether nothing has been recorded yet.
  pub fn is_empty(&self) -> bool {
    self.by_source.is_empty()
  }

  /// Look up `canonical`, recording it with the path produced by `propose` when unseen.
  ///
  /// `propose` only runs for unseen paths, so a remap hook is consulted once per resource
  /// and the first resolution wins. A proposed path that leaves the output root is
  /// rejected and nothing is recorded.
  pub fn record_with(&mut self, canonical: &Path, propose: impl FnOnce() -> String) -> Result<Visit> {
    if let Some(existing) = self.by_source.get(canonical) {
      return Ok(Visit::Known(existing.clone()));
    }

    let relative = propose();
    if !is_contained(&relative) {
      return Err(CopyError::OutsideOutputRoot {
        path: canonical.to_path_buf(),
        relative,
      });
    }
    if let Some(first) = self.by_output.get(&relative) {
      return Err(CopyError::OutputCollision {
        relative,
        first: first.clone(),
        second: canonical.to_path_buf(),
      });
    }

    self.by_output.insert(relative.clone(), canonical.to_path_buf());
    self.by_source.insert(canonical.to_path_buf(), relative.clone());
    Ok(Visit::New(relative))
  }
}
