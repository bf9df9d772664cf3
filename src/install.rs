//! Write emitted files into a destination directory.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::debug;
use same_file::is_same_file;

use crate::asset_paths::is_contained;
use crate::error::{CopyError, Result};
use crate::models::OutputFile;

/// Write every output beneath `dest`, creating directories as needed.
///
/// Files whose bytes still match their source on disk are hard-linked where the
/// filesystem allows it and copied otherwise; everything else is written out.
pub fn install_outputs(dest: &Path, outputs: &[OutputFile]) -> Result<()> {
  for output in outputs {
    install_output(dest, output)?;
  }
  Ok(())
}

/// Write a single output beneath `dest`.
///
/// Outputs whose relative path leaves `dest` are refused.
pub fn install_output(dest: &Path, output: &OutputFile) -> Result<()> {
  if !is_contained(&output.relative) {
    return Err(CopyError::OutsideOutputRoot {
      path: output.source.clone(),
      relative: output.relative.clone(),
    });
  }

  let destination = dest.join(&output.relative);
  if let Some(parent) = destination.parent() {
    fs::create_dir_all(parent).map_err(|err| CopyError::io(parent, err))?;
  }

  if output.rewritten || !matches_source(output) {
    // An earlier install may have hard-linked the source here.
    if destination.is_file() {
      fs::remove_file(&destination).map_err(|err| CopyError::io(&destination, err))?;
    }
    return fs::write(&destination, &output.contents).map_err(|err| CopyError::io(&destination, err));
  }

  link_or_copy(&output.source, &destination).map_err(|err| CopyError::io(&destination, err))
}

/// Whether the source file on disk still holds exactly the output's bytes.
fn matches_source(output: &OutputFile) -> bool {
  let same_len = fs::metadata(&output.source)
    .is_ok_and(|metadata| metadata.is_file() && metadata.len() == output.contents.len() as u64);
  same_len && fs::read(&output.source).is_ok_and(|disk| disk == output.contents)
}

fn link_or_copy(source: &Path, destination: &Path) -> std::io::Result<()> {
  if destination.exists() {
    if is_same_file(source, destination)? {
      debug!("{} already in place", destination.display());
      return Ok(());
    }
    fs::remove_file(destination)?;
  }

  match fs::hard_link(source, destination) {
    Ok(()) => Ok(()),
    Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
    Err(_) => fs::copy(source, destination).map(|_| ()),
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;
  use tempfile::tempdir;

  #[test]
  fn writes_rewritten_contents() -> std::io::Result<()> {
    let temp = tempdir()?;
    let source = temp.path().join("index.html");
    fs::write(&source, "<img src=\"/a.png\">")?;

    let output = OutputFile {
      relative: "sub/index.html".into(),
      contents: b"<img src=\"../a.png\">".to_vec(),
      source,
      rewritten: true,
    };
    let dest = temp.path().join("out");
    install_outputs(&dest, &[output]).unwrap();

    assert_eq!(fs::read_to_string(dest.join("sub/index.html"))?, "<img src=\"../a.png\">");
    Ok(())
  }

  #[test]
  fn links_untouched_files_and_reuses_existing_links() -> std::io::Result<()> {
    let temp = tempdir()?;
    let source = temp.path().join("a.png");
    fs::write(&source, b"PNG")?;

    let output = OutputFile {
      relative: "images/a.png".into(),
      contents: b"PNG".to_vec(),
      source: source.clone(),
      rewritten: false,
    };
    let dest = temp.path().join("out");
    install_output(&dest, &output).unwrap();
    let installed = dest.join("images/a.png");
    assert!(same_file::is_same_file(&source, &installed)?);

    install_output(&dest, &output).unwrap();
    assert!(same_file::is_same_file(&source, &installed)?);
    Ok(())
  }

  #[test]
  fn writes_supplied_contents_that_differ_from_disk() -> std::io::Result<()> {
    let temp = tempdir()?;
    let source = temp.path().join("notes.txt");
    fs::write(&source, "on disk")?;

    let output = OutputFile {
      relative: "notes.txt".into(),
      contents: b"upstream-transformed".to_vec(),
      source: source.clone(),
      rewritten: false,
    };
    let dest = temp.path().join("out");
    install_output(&dest, &output).unwrap();

    let installed = dest.join("notes.txt");
    assert_eq!(fs::read_to_string(&installed)?, "upstream-transformed");
    assert!(!same_file::is_same_file(&source, &installed)?);
    assert_eq!(fs::read_to_string(&source)?, "on disk");
    Ok(())
  }

  #[test]
  fn refuses_outputs_leaving_the_destination() -> std::io::Result<()> {
    let temp = tempdir()?;
    let dest = temp.path().join("out");
    let output = OutputFile {
      relative: "../escaped.png".into(),
      contents: b"PNG".to_vec(),
      source: PathBuf::from("/shared/escaped.png"),
      rewritten: false,
    };

    let err = install_output(&dest, &output).unwrap_err();
    assert!(matches!(err, CopyError::OutsideOutputRoot { .. }));
    assert!(!temp.path().join("escaped.png").exists());
    Ok(())
  }

  #[test]
  fn writes_in_memory_outputs_without_a_source() -> std::io::Result<()> {
    let temp = tempdir()?;
    let output = OutputFile {
      relative: "note.txt".into(),
      contents: b"hello".to_vec(),
      source: PathBuf::from("/nonexistent/note.txt"),
      rewritten: false,
    };
    install_output(temp.path(), &output).unwrap();
    assert_eq!(fs::read(temp.path().join("note.txt"))?, b"hello");
    Ok(())
  }
}
