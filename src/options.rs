//! Run-wide options and the strategy hooks callers inject into the pipeline.

use std::env;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CopyError, Result};

/// Scheme prepended to protocol-relative URLs when no fix is configured.
pub const DEFAULT_SCHEME: &str = "http";

/// Decides, per `(url, referencing path)` pair, whether a reference is excluded.
pub trait ReferencePredicate {
  /// Returns `true` when the reference written as `url` inside `referrer` matches.
  fn matches(&self, url: &str, referrer: &str) -> bool;
}

impl<F> ReferencePredicate for F
where
  F: Fn(&str, &str) -> bool,
{
  fn matches(&self, url: &str, referrer: &str) -> bool {
    self(url, referrer)
  }
}

/// Produces the replacement text for a protocol-relative URL.
pub trait SchemelessRewrite {
  /// Return the text that replaces `url` inside `referrer`; may return `url` unchanged.
  fn rewrite(&self, url: &str, referrer: &str) -> String;
}

impl<F> SchemelessRewrite for F
where
  F: Fn(&str, &str) -> String,
{
  fn rewrite(&self, url: &str, referrer: &str) -> String {
    self(url, referrer)
  }
}

/// Remaps the output-relative path proposed for a discovered dependency.
pub trait PathOverwrite {
  /// Return the output-relative path to use instead of `proposed`.
  fn overwrite(&self, proposed: &str, referrer: &str) -> String;
}

impl<F> PathOverwrite for F
where
  F: Fn(&str, &str) -> String,
{
  fn overwrite(&self, proposed: &str, referrer: &str) -> String {
    self(proposed, referrer)
  }
}

/// Places every discovered dependency under a fixed directory.
#[derive(Debug, Clone)]
pub struct PrefixOverwrite(pub String);

impl PathOverwrite for PrefixOverwrite {
  fn overwrite(&self, proposed: &str, _referrer: &str) -> String {
    let prefix = self.0.trim_matches('/');
    if prefix.is_empty() {
      proposed.to_string()
    } else {
      format!("{prefix}/{proposed}")
    }
  }
}

/// How protocol-relative URLs are fixed up.
#[derive(Default)]
pub enum SchemelessUrlFix {
  /// Prefix with [`DEFAULT_SCHEME`].
  #[default]
  Default,
  /// Prefix with the given scheme.
  Scheme(String),
  /// Delegate to a caller-supplied strategy.
  Custom(Box<dyn SchemelessRewrite>),
}

impl SchemelessUrlFix {
  /// Apply the fix to a protocol-relative `url` found inside `referrer`.
  pub fn apply(&self, url: &str, referrer: &str) -> String {
    match self {
      Self::Default => format!("{DEFAULT_SCHEME}:{url}"),
      Self::Scheme(scheme) => format!("{}:{url}", scheme.trim_end_matches(':')),
      Self::Custom(strategy) => strategy.rewrite(url, referrer),
    }
  }
}

impl fmt::Debug for SchemelessUrlFix {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Default => f.write_str("Default"),
      Self::Scheme(scheme) => f.debug_tuple("Scheme").field(scheme).finish(),
      Self::Custom(_) => f.write_str("Custom(..)"),
    }
  }
}

/// Options fixed for the duration of one copy run.
#[derive(Default)]
pub struct CopyOptions {
  /// Working directory for resolving input paths; the process directory when unset.
  pub cwd: Option<PathBuf>,
  /// Root for output paths and root-relative URLs; each input's own base when unset.
  pub base: Option<PathBuf>,
  /// Protocol-relative URL handling.
  pub schemeless_url_fix: SchemelessUrlFix,
  /// Directory names whose files are copied but never scanned.
  pub norec_dirs: Vec<String>,
  /// Excludes a reference from copy and rewrite.
  pub blacklist: Option<Box<dyn ReferencePredicate>>,
  /// Leaves a reference completely untouched, checked before the blacklist.
  pub skip: Option<Box<dyn ReferencePredicate>>,
  /// Remaps the output path of discovered dependencies.
  pub overwrite_path: Option<Box<dyn PathOverwrite>>,
}

impl CopyOptions {
  /// Options with every hook unset.
  pub fn new() -> Self {
    Self::default()
  }

  /// Set the working directory.
  pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  /// Set the base directory.
  pub fn base(mut self, base: impl Into<PathBuf>) -> Self {
    self.base = Some(base.into());
    self
  }

  /// Use `scheme` for protocol-relative URLs.
  pub fn schemeless_scheme(mut self, scheme: impl Into<String>) -> Self {
    self.schemeless_url_fix = SchemelessUrlFix::Scheme(scheme.into());
    self
  }

  /// Use a custom strategy for protocol-relative URLs.
  pub fn schemeless_fn(mut self, strategy: impl SchemelessRewrite + 'static) -> Self {
    self.schemeless_url_fix = SchemelessUrlFix::Custom(Box::new(strategy));
    self
  }

  /// Add a directory name under which files are not scanned.
  pub fn norec_dir(mut self, name: impl Into<String>) -> Self {
    self.norec_dirs.push(name.into());
    self
  }

  /// Install the blacklist predicate.
  pub fn blacklist(mut self, predicate: impl ReferencePredicate + 'static) -> Self {
    self.blacklist = Some(Box::new(predicate));
    self
  }

  /// Install the skip predicate.
  pub fn skip(mut self, predicate: impl ReferencePredicate + 'static) -> Self {
    self.skip = Some(Box::new(predicate));
    self
  }

  /// Install the output-path remap.
  pub fn overwrite_path(mut self, strategy: impl PathOverwrite + 'static) -> Self {
    self.overwrite_path = Some(Box::new(strategy));
    self
  }

  /// Reject option combinations that cannot drive a run.
  pub fn validate(&self) -> Result<()> {
    if let SchemelessUrlFix::Scheme(scheme) = &self.schemeless_url_fix {
      let scheme = scheme.trim_end_matches(':');
      if !scheme_pattern().is_match(scheme) {
        return Err(CopyError::Config(format!(
          "schemeless URL fix `{scheme}` is not a valid URL scheme"
        )));
      }
    }

    for name in &self.norec_dirs {
      let mut components = Path::new(name).components();
      let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
      );
      if !single {
        return Err(CopyError::Config(format!(
          "no-recursion directory `{name}` must be a single directory name"
        )));
      }
    }

    Ok(())
  }

  /// Absolute working directory.
  pub fn resolved_cwd(&self) -> Result<PathBuf> {
    let process_cwd = env::current_dir().map_err(|err| CopyError::io(".", err))?;
    Ok(match &self.cwd {
      Some(cwd) => process_cwd.join(cwd),
      None => process_cwd,
    })
  }

  /// Absolute base directory, if one is configured.
  pub fn resolved_base(&self) -> Result<Option<PathBuf>> {
    match &self.base {
      Some(base) if base.is_absolute() => Ok(Some(base.clone())),
      Some(base) => Ok(Some(self.resolved_cwd()?.join(base))),
      None => Ok(None),
    }
  }

  /// Whether `name` is one of the no-recursion directories.
  pub(crate) fn is_norec_dir(&self, name: &str) -> bool {
    self.norec_dirs.iter().any(|dir| dir == name)
  }
}

impl fmt::Debug for CopyOptions {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CopyOptions")
      .field("cwd", &self.cwd)
      .field("base", &self.base)
      .field("schemeless_url_fix", &self.schemeless_url_fix)
      .field("norec_dirs", &self.norec_dirs)
      .field("blacklist", &self.blacklist.is_some())
      .field("skip", &self.skip.is_some())
      .field("overwrite_path", &self.overwrite_path.is_some())
      .finish()
  }
}

fn scheme_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("invalid scheme regex"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_fix_uses_http() {
    let fix = SchemelessUrlFix::default();
    assert_eq!(fix.apply("//cdn.example/c.png", "index.html"), "http://cdn.example/c.png");
  }

  #[test]
  fn literal_scheme_accepts_trailing_colon() {
    let fix = SchemelessUrlFix::Scheme("https:".into());
    assert_eq!(fix.apply("//cdn.example/c.png", "index.html"), "https://cdn.example/c.png");
  }

  #[test]
  fn custom_fix_receives_referrer() {
    let options = CopyOptions::new().schemeless_fn(|url: &str, referrer: &str| format!("{referrer}|{url}"));
    assert_eq!(options.schemeless_url_fix.apply("//h/x", "a.html"), "a.html|//h/x");
  }

  #[test]
  fn rejects_invalid_scheme() {
    let options = CopyOptions::new().schemeless_scheme("ht tp");
    assert!(matches!(options.validate(), Err(CopyError::Config(_))));
  }

  #[test]
  fn rejects_nested_norec_dir() {
    let options = CopyOptions::new().norec_dir("css/vendor");
    assert!(matches!(options.validate(), Err(CopyError::Config(_))));
    assert!(CopyOptions::new().norec_dir("css").validate().is_ok());
    assert!(CopyOptions::new().norec_dir("").validate().is_err());
  }

  #[test]
  fn prefix_overwrite_joins_with_slash() {
    let strategy = PrefixOverwrite("/prefix/".into());
    assert_eq!(strategy.overwrite("images/a.jpg", "index.html"), "prefix/images/a.jpg");
  }
}
