//! Traversal driver: turns input files into output files, discovering and copying every
//! local resource they reference.

use std::path::{Component, Path, PathBuf};

use html_escape::encode_quoted_attribute;
use log::{debug, info, warn};

use crate::asset_paths::{LocalUrl, link_between, normalize, output_relative, relative_path, resolve_local, to_slash};
use crate::error::{CopyError, Result};
use crate::extract::extract_references;
use crate::graph::{Visit, VisitedSet};
use crate::loader::{EntryKind, FsLoader, ResourceLoader};
use crate::models::{FileFormat, InputFile, OutputFile, Reference, ResolvedTarget, SourceFile, UrlKind};
use crate::options::CopyOptions;
use crate::policy::{Decision, decide};
use crate::rewrite::{Edit, apply_edits};

/// Copies HTML/CSS documents together with their local dependencies.
///
/// One copier is one run: its visited set spans every input it is fed, so a resource
/// referenced from several documents is emitted once.
pub struct HtmlCopier<L = FsLoader> {
  options: CopyOptions,
  base_override: Option<PathBuf>,
  loader: L,
  visited: VisitedSet,
  pending: Vec<SourceFile>,
}

impl HtmlCopier<FsLoader> {
  /// Create a copier reading from the local filesystem.
  pub fn new(options: CopyOptions) -> Result<Self> {
    Self::with_loader(options, FsLoader)
  }
}

impl<L: ResourceLoader> HtmlCopier<L> {
  /// Create a copier reading discovered resources through `loader`.
  ///
  /// Options are validated here, before any file is touched.
  pub fn with_loader(options: CopyOptions, loader: L) -> Result<Self> {
    options.validate()?;
    let base_override = options.resolved_base()?.map(|base| normalize(&base));
    Ok(Self {
      options,
      base_override,
      loader,
      visited: VisitedSet::new(),
      pending: Vec::new(),
    })
  }

  /// Every resource recorded so far.
  pub fn visited(&self) -> &VisitedSet {
    &self.visited
  }

  /// Process one input to completion, returning it and every newly discovered dependency.
  pub fn process(&mut self, input: InputFile) -> Result<Vec<OutputFile>> {
    self.admit(input)?;
    let mut outputs = Vec::new();
    while let Some(output) = self.next_output() {
      outputs.push(output?);
    }
    Ok(outputs)
  }

  /// Process every input in order and collect all outputs.
  pub fn run(&mut self, inputs: impl IntoIterator<Item = InputFile>) -> Result<Vec<OutputFile>> {
    let mut outputs = Vec::new();
    for input in inputs {
      outputs.extend(self.process(input)?);
    }
    Ok(outputs)
  }

  /// Lazily process `inputs`, pulling the next input only once the previous one and its
  /// dependencies have been emitted.
  pub fn stream<I>(self, inputs: I) -> CopyStream<L, I::IntoIter>
  where
    I: IntoIterator<Item = InputFile>,
  {
    CopyStream {
      copier: self,
      inputs: inputs.into_iter(),
      done: false,
    }
  }

  /// Queue an input for processing unless it is a directory or already emitted.
  fn admit(&mut self, input: InputFile) -> Result<()> {
    if input.is_dir {
      debug!("discarding directory input {}", input.path.display());
      return Ok(());
    }

    let base = self
      .base_override
      .clone()
      .unwrap_or_else(|| normalize(&input.base));
    let canonical = if input.path.is_absolute() {
      normalize(&input.path)
    } else {
      normalize(&base.join(&input.path))
    };

    let relative = match self
      .visited
      .record_with(&canonical, || output_relative(&canonical, &base))?
    {
      Visit::New(relative) => relative,
      Visit::Known(existing) => {
        debug!("{} already emitted as {existing}", canonical.display());
        return Ok(());
      }
    };

    let recurse = !self.is_norec(&canonical, &base);
    self.pending.push(SourceFile {
      format: FileFormat::from_path(&canonical),
      canonical,
      base,
      relative,
      contents: input.contents,
      recurse,
    });
    Ok(())
  }

  /// Emit the next queued file, scheduling whatever it references.
  fn next_output(&mut self) -> Option<Result<OutputFile>> {
    let file = self.pending.pop()?;
    let result = self.emit(file);
    if result.is_err() {
      self.pending.clear();
    }
    Some(result)
  }

  fn emit(&mut self, file: SourceFile) -> Result<OutputFile> {
    let contents = self.rewrite_contents(&file)?;
    let rewritten = contents.as_deref().is_some_and(|text| text.as_bytes() != file.contents);
    info!("emitting {}", file.relative);

    Ok(OutputFile {
      relative: file.relative,
      contents: match contents {
        Some(text) if rewritten => text.into_bytes(),
        _ => file.contents,
      },
      source: file.canonical,
      rewritten,
    })
  }

  /// New text for a scannable file, `None` when the bytes pass through untouched.
  fn rewrite_contents(&mut self, file: &SourceFile) -> Result<Option<String>> {
    if !file.format.is_scannable() {
      return Ok(None);
    }
    if !file.recurse {
      debug!("not scanning {}: inside a no-recursion directory", file.relative);
      return Ok(None);
    }

    let Ok(text) = std::str::from_utf8(&file.contents) else {
      warn!("{} is not valid UTF-8; copying it unchanged", file.relative);
      return Ok(None);
    };

    let mut edits = Vec::new();
    for reference in extract_references(text, file.format) {
      let target = self.resolve(file, &reference)?;
      if let (Some(canonical), Some(relative)) = (&target.canonical, &target.relative) {
        debug!(
          "{}: {:?} {:?} {} -> {relative} ({})",
          file.relative,
          target.kind,
          reference.context,
          reference.url,
          canonical.display()
        );
      }
      if target.replacement == reference.url {
        continue;
      }

      let replacement = if reference.in_attribute {
        encode_quoted_attribute(&target.replacement).into_owned()
      } else {
        target.replacement
      };
      edits.push(Edit {
        span: reference.span,
        replacement,
      });
    }

    Ok(Some(apply_edits(text, &edits)))
  }

  fn resolve(&mut self, file: &SourceFile, reference: &Reference) -> Result<ResolvedTarget> {
    let url = reference.url.as_str();
    let decision = decide(&self.options, url, &file.relative);
    let kind = decision.kind();

    match decision {
      Decision::Keep(reason) => {
        debug!("{}: keeping {kind:?} {url} ({reason:?})", file.relative);
        Ok(ResolvedTarget::untouched(kind, url))
      }
      Decision::Rewrite(replacement) => {
        debug!("{}: {kind:?} {url} -> {replacement}", file.relative);
        Ok(ResolvedTarget {
          kind,
          canonical: None,
          relative: None,
          replacement,
        })
      }
      Decision::Copy => self.resolve_copy(file, url),
    }
  }

  fn resolve_copy(&mut self, file: &SourceFile, url: &str) -> Result<ResolvedTarget> {
    let local = LocalUrl::split(url);
    let referrer_dir = file.canonical.parent().unwrap_or(&file.base);
    let canonical = resolve_local(&local, referrer_dir, &file.base);

    if !self.visited.contains(&canonical) {
      match self.loader.entry_kind(&canonical) {
        Ok(EntryKind::File) => {}
        Ok(EntryKind::Directory) => {
          debug!("{}: {url} names a directory; leaving it alone", file.relative);
          return Ok(ResolvedTarget::untouched(UrlKind::Local, url));
        }
        Err(source) => {
          return Err(CopyError::MissingResource {
            path: canonical,
            referrer: file.relative.clone(),
            source,
          });
        }
      }
    }

    let proposed = output_relative(&canonical, &file.base);
    let visit = self.visited.record_with(&canonical, || match &self.options.overwrite_path {
      Some(strategy) => clean_relative(&strategy.overwrite(&proposed, &file.relative)),
      None => proposed.clone(),
    })?;

    if let Visit::New(relative) = &visit {
      let contents = self
        .loader
        .read(&canonical)
        .map_err(|source| CopyError::MissingResource {
          path: canonical.clone(),
          referrer: file.relative.clone(),
          source,
        })?;
      let recurse = !self.is_norec(&canonical, &file.base);
      self.pending.push(SourceFile {
        format: FileFormat::from_path(&canonical),
        recurse,
        canonical: canonical.clone(),
        base: file.base.clone(),
        relative: relative.clone(),
        contents,
      });
    }

    let replacement = format!("{}{}", link_between(&file.relative, visit.relative()), local.suffix);
    Ok(ResolvedTarget {
      kind: UrlKind::Local,
      canonical: Some(canonical),
      relative: Some(visit.relative().to_string()),
      replacement,
    })
  }

  /// Whether `canonical` sits beneath one of the no-recursion directories.
  fn is_norec(&self, canonical: &Path, base: &Path) -> bool {
    let relative = relative_path(canonical, base);
    let Some(parent) = relative.parent() else {
      return false;
    };
    parent.components().any(|component| match component {
      Component::Normal(name) => name.to_str().is_some_and(|name| self.options.is_norec_dir(name)),
      _ => false,
    })
  }
}

/// Tidy a caller-supplied output path: `/` separators, no `.` segments, no leading `/`.
/// Paths that still climb out of the output root are rejected when recorded.
fn clean_relative(path: &str) -> String {
  let slashed = path.replace('\\', "/");
  to_slash(&normalize(Path::new(slashed.trim_start_matches('/'))))
}

/// Lazy output sequence produced by [`HtmlCopier::stream`].
///
/// Dropping the stream early abandons whatever has not been emitted yet; everything
/// already yielded stays valid. The first error ends the stream.
pub struct CopyStream<L, I> {
  copier: HtmlCopier<L>,
  inputs: I,
  done: bool,
}

impl<L, I> CopyStream<L, I> {
  /// The underlying copier, e.g. to inspect the visited set.
  pub fn copier(&self) -> &HtmlCopier<L> {
    &self.copier
  }
}

impl<L, I> Iterator for CopyStream<L, I>
where
  L: ResourceLoader,
  I: Iterator<Item = InputFile>,
{
  type Item = Result<OutputFile>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }

    loop {
      if let Some(result) = self.copier.next_output() {
        self.done = result.is_err();
        return Some(result);
      }

      let input = match self.inputs.next() {
        Some(input) => input,
        None => {
          self.done = true;
          return None;
        }
      };
      if let Err(err) = self.copier.admit(input) {
        self.done = true;
        return Some(Err(err));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;
  use std::io;

  use super::*;

  /// In-memory loader keyed by absolute path.
  #[derive(Default)]
  struct MemoryLoader {
    files: BTreeMap<PathBuf, Vec<u8>>,
  }

  impl MemoryLoader {
    fn with(mut self, path: &str, contents: &str) -> Self {
      self.files.insert(PathBuf::from(path), contents.as_bytes().to_vec());
      self
    }
  }

  impl ResourceLoader for MemoryLoader {
    fn entry_kind(&self, path: &Path) -> io::Result<EntryKind> {
      if self.files.contains_key(path) {
        Ok(EntryKind::File)
      } else if self.files.keys().any(|file| file.starts_with(path)) {
        Ok(EntryKind::Directory)
      } else {
        Err(io::Error::from(io::ErrorKind::NotFound))
      }
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
      self
        .files
        .get(path)
        .cloned()
        .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
  }

  fn input(path: &str, contents: &str) -> InputFile {
    InputFile::new(path, "/site", contents)
  }

  fn by_path(outputs: Vec<OutputFile>) -> BTreeMap<String, String> {
    outputs
      .into_iter()
      .map(|output| (output.relative, String::from_utf8(output.contents).unwrap()))
      .collect()
  }

  #[test]
  fn copies_and_rewrites_nested_dependencies() {
    let loader = MemoryLoader::default()
      .with("/site/css/style.css", "body { background: url(../images/bg.png) }")
      .with("/site/images/bg.png", "PNG");
    let mut copier = HtmlCopier::with_loader(CopyOptions::new(), loader).unwrap();

    let outputs = copier
      .process(input("/site/sub/index.html", r#"<link href="/css/style.css">"#))
      .unwrap();
    let outputs = by_path(outputs);

    assert_eq!(outputs.len(), 3);
    assert_eq!(outputs["sub/index.html"], r#"<link href="../css/style.css">"#);
    assert_eq!(outputs["css/style.css"], "body { background: url(../images/bg.png) }");
    assert_eq!(outputs["images/bg.png"], "PNG");
  }

  #[test]
  fn cyclic_references_terminate() {
    let loader = MemoryLoader::default().with("/site/b.html", r#"<a href="a.html">back</a>"#);
    let mut copier = HtmlCopier::with_loader(CopyOptions::new(), loader).unwrap();

    let outputs = copier
      .process(input("/site/a.html", r#"<a href="b.html">next</a>"#))
      .unwrap();

    assert_eq!(outputs.len(), 2);
    assert_eq!(copier.visited().len(), 2);
  }

  #[test]
  fn fragment_only_links_stay_put() {
    let mut copier = HtmlCopier::with_loader(CopyOptions::new(), MemoryLoader::default()).unwrap();
    let html = r##"<a href="#top">top</a><a href="?page=2">next</a>"##;
    let outputs = copier.process(input("/site/index.html", html)).unwrap();
    assert_eq!(by_path(outputs)["index.html"], html);
  }

  #[test]
  fn keeps_query_and_fragment_suffixes() {
    let loader = MemoryLoader::default().with("/site/fonts/icons.eot", "EOT");
    let mut copier = HtmlCopier::with_loader(CopyOptions::new(), loader).unwrap();
    let css = "@font-face { src: url('/fonts/icons.eot?#iefix') }";

    let outputs = copier.process(input("/site/css/icons.css", css)).unwrap();
    assert_eq!(
      by_path(outputs)["css/icons.css"],
      "@font-face { src: url('../fonts/icons.eot?#iefix') }"
    );
  }

  #[test]
  fn directory_targets_are_left_alone() {
    let loader = MemoryLoader::default().with("/site/docs/readme.txt", "hi");
    let mut copier = HtmlCopier::with_loader(CopyOptions::new(), loader).unwrap();
    let html = r#"<a href="docs/">docs</a>"#;

    let outputs = copier.process(input("/site/index.html", html)).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(by_path(outputs)["index.html"], html);
  }

  #[test]
  fn missing_targets_abort_with_context() {
    let mut copier = HtmlCopier::with_loader(CopyOptions::new(), MemoryLoader::default()).unwrap();
    let err = copier
      .process(input("/site/index.html", r#"<img src="gone.png">"#))
      .unwrap_err();

    match err {
      CopyError::MissingResource { path, referrer, .. } => {
        assert_eq!(path, PathBuf::from("/site/gone.png"));
        assert_eq!(referrer, "index.html");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn inputs_already_copied_are_not_emitted_twice() {
    let loader = MemoryLoader::default().with("/site/images/a.png", "PNG");
    let mut copier = HtmlCopier::with_loader(CopyOptions::new(), loader).unwrap();

    let first = copier
      .process(input("/site/index.html", r#"<img src="images/a.png">"#))
      .unwrap();
    let second = copier.process(input("/site/images/a.png", "PNG")).unwrap();

    assert_eq!(first.len(), 2);
    assert!(second.is_empty());
  }

  #[test]
  fn remap_runs_once_per_resource() {
    let calls = std::rc::Rc::new(std::cell::Cell::new(0));
    let counter = std::rc::Rc::clone(&calls);
    let loader = MemoryLoader::default().with("/site/images/a.png", "PNG");
    let options = CopyOptions::new().overwrite_path(move |proposed: &str, _: &str| {
      counter.set(counter.get() + 1);
      format!("./deps\\{proposed}")
    });
    let mut copier = HtmlCopier::with_loader(options, loader).unwrap();

    let html = r#"<img src="images/a.png"><img src="/images/a.png"><img src="./images/../images/a.png">"#;
    let outputs = by_path(copier.process(input("/site/index.html", html)).unwrap());

    assert_eq!(calls.get(), 1);
    assert_eq!(
      outputs["index.html"],
      r#"<img src="deps/images/a.png"><img src="deps/images/a.png"><img src="deps/images/a.png">"#
    );
    assert!(outputs.contains_key("deps/images/a.png"));
  }

  #[test]
  fn targets_outside_the_base_abort() {
    let loader = MemoryLoader::default().with("/shared/a.png", "PNG");
    let mut copier = HtmlCopier::with_loader(CopyOptions::new(), loader).unwrap();

    let err = copier
      .process(input("/site/index.html", r#"<img src="../shared/a.png">"#))
      .unwrap_err();
    match err {
      CopyError::OutsideOutputRoot { path, relative } => {
        assert_eq!(path, PathBuf::from("/shared/a.png"));
        assert_eq!(relative, "../shared/a.png");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn remaps_climbing_out_of_the_root_abort() {
    let loader = MemoryLoader::default().with("/site/images/a.png", "PNG");
    let options = CopyOptions::new().overwrite_path(|proposed: &str, _: &str| format!("deps/../../{proposed}"));
    let mut copier = HtmlCopier::with_loader(options, loader).unwrap();

    let err = copier
      .process(input("/site/index.html", r#"<img src="images/a.png">"#))
      .unwrap_err();
    assert!(matches!(err, CopyError::OutsideOutputRoot { .. }));
  }

  #[test]
  fn replacements_inside_attributes_are_entity_encoded() {
    let loader = MemoryLoader::default()
      .with("/site/images/bg.png", "PNG")
      .with("/site/a&b.png", "PNG");
    let options = CopyOptions::new().schemeless_fn(|url: &str, _: &str| format!("https:{url}?a=1&b=2"));
    let mut copier = HtmlCopier::with_loader(options, loader).unwrap();

    let html = concat!(
      r#"<div style="background:url(&quot;/images/bg.png&quot;)"></div>"#,
      r#"<a href="/a&amp;b.png">x</a>"#,
      r#"<img src="//cdn.example/c.png">"#,
    );
    let outputs = by_path(copier.process(input("/site/sub/index.html", html)).unwrap());

    assert_eq!(
      outputs["sub/index.html"],
      concat!(
        r#"<div style="background:url(&quot;../images/bg.png&quot;)"></div>"#,
        r#"<a href="../a&amp;b.png">x</a>"#,
        r#"<img src="https://cdn.example/c.png?a=1&amp;b=2">"#,
      )
    );
    assert!(outputs.contains_key("a&b.png"));
  }

  #[test]
  fn stream_stops_after_first_error() {
    let copier = HtmlCopier::with_loader(CopyOptions::new(), MemoryLoader::default()).unwrap();
    let inputs = vec![
      input("/site/bad.html", r#"<img src="missing.png">"#),
      input("/site/good.txt", "fine"),
    ];

    let results: Vec<_> = copier.stream(inputs).collect();
    assert_eq!(results.len(), 1);
    assert!(results[0].is_err());
  }

  #[test]
  fn non_utf8_html_passes_through() {
    let mut copier = HtmlCopier::with_loader(CopyOptions::new(), MemoryLoader::default()).unwrap();
    let bytes = vec![b'<', b'p', b'>', 0xff, 0xfe];
    let outputs = copier
      .process(InputFile::new("/site/latin1.html", "/site", bytes.clone()))
      .unwrap();
    assert_eq!(outputs[0].contents, bytes);
    assert!(!outputs[0].rewritten);
  }
}
