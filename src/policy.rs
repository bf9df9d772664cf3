//! Per-reference policy: what happens to a URL before any path is resolved.

use crate::asset_paths::classify;
use crate::models::UrlKind;
use crate::options::CopyOptions;

/// Why a reference is left exactly as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
  /// Absolute URL with a scheme.
  Remote,
  /// The skip predicate matched.
  Skipped,
  /// The blacklist predicate matched.
  Blacklisted,
}

/// What to do with one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  /// Leave the URL as written and copy nothing.
  Keep(KeepReason),
  /// Replace the URL with the given text and copy nothing.
  Rewrite(String),
  /// Resolve the URL, copy its target and point the reference at the copy.
  Copy,
}

impl Decision {
  /// Classification the decision was made under.
  pub fn kind(&self) -> UrlKind {
    match self {
      Self::Keep(KeepReason::Remote) => UrlKind::Remote,
      Self::Rewrite(_) => UrlKind::SchemelessRemote,
      Self::Keep(_) | Self::Copy => UrlKind::Local,
    }
  }
}

/// Decide the fate of `url`, found inside the file emitted at `referrer`.
///
/// Precedence: remote URLs are kept; protocol-relative URLs get the configured scheme
/// fix; local URLs consult `skip` first, then `blacklist`, and are copied otherwise.
pub fn decide(options: &CopyOptions, url: &str, referrer: &str) -> Decision {
  match classify(url) {
    UrlKind::Remote => Decision::Keep(KeepReason::Remote),
    UrlKind::SchemelessRemote => {
      Decision::Rewrite(options.schemeless_url_fix.apply(url, referrer))
    }
    UrlKind::Local => {
      if options
        .skip
        .as_ref()
        .is_some_and(|skip| skip.matches(url, referrer))
      {
        return Decision::Keep(KeepReason::Skipped);
      }
      if options
        .blacklist
        .as_ref()
        .is_some_and(|blacklist| blacklist.matches(url, referrer))
      {
        return Decision::Keep(KeepReason::Blacklisted);
      }
      Decision::Copy
    }
  }
}
