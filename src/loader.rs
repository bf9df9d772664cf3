//! Filesystem boundary for reading discovered resources.

use std::fs;
use std::io;
use std::path::Path;

/// What a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
  /// Regular file (or a symlink to one).
  File,
  /// Directory.
  Directory,
}

/// Source of resource bytes.
///
/// The pipeline never touches the filesystem directly; swapping the loader lets callers
/// serve resources from memory or an archive.
pub trait ResourceLoader {
  /// Report what `path` is; `NotFound` when it does not exist.
  fn entry_kind(&self, path: &Path) -> io::Result<EntryKind>;

  /// Read the whole file at `path`.
  fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads straight from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl ResourceLoader for FsLoader {
  fn entry_kind(&self, path: &Path) -> io::Result<EntryKind> {
    let metadata = fs::metadata(path)?;
    if metadata.is_dir() {
      Ok(EntryKind::Directory)
    } else {
      Ok(EntryKind::File)
    }
  }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    fs::read(path)
  }
}
