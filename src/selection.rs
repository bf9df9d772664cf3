//! Declarative blacklist/skip rules loaded from a JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

use crate::options::ReferencePredicate;

/// Default rule file name searched for next to the project configuration.
pub const DEFAULT_RULES_FILE: &str = "htmlcpr.rules.json";

/// On-disk layout of a single rule.
#[derive(Debug, Default, Deserialize)]
struct RuleRecord {
  #[serde(default)]
  url: Option<String>,
  #[serde(default)]
  source: Option<String>,
}

/// On-disk layout of the rule file.
#[derive(Debug, Default, Deserialize)]
struct RuleFile {
  #[serde(default)]
  blacklist: Vec<RuleRecord>,
  #[serde(default)]
  skip: Vec<RuleRecord>,
}

/// A compiled rule: matches when every present field matches.
#[derive(Debug, Clone)]
pub struct ReferenceRule {
  url: Option<Regex>,
  source: Option<String>,
}

impl ReferenceRule {
  /// Build a rule from a URL pattern and a referencing-file scope.
  pub fn new(url: Option<&str>, source: Option<&str>) -> Result<Self, regex::Error> {
    Ok(Self {
      url: url.map(Regex::new).transpose()?,
      source: source
        .map(|value| value.trim().trim_matches('/').to_string())
        .filter(|value| !value.is_empty()),
    })
  }

  /// Whether the rule applies to `url` written inside `referrer`.
  pub fn matches(&self, url: &str, referrer: &str) -> bool {
    let url_matches = self.url.as_ref().is_none_or(|pattern| pattern.is_match(url));
    let source_matches = self
      .source
      .as_deref()
      .is_none_or(|scope| scope_matches(scope, referrer));
    url_matches && source_matches
  }
}

/// A list of rules acting as one predicate.
#[derive(Debug, Clone, Default)]
pub struct RuleSet(Vec<ReferenceRule>);

impl RuleSet {
  /// Whether any rule is defined.
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl ReferencePredicate for RuleSet {
  fn matches(&self, url: &str, referrer: &str) -> bool {
    self.0.iter().any(|rule| rule.matches(url, referrer))
  }
}

/// Blacklist and skip rules read from a rule file.
#[derive(Debug, Clone, Default)]
pub struct ReferenceRules {
  /// Rules excluding references from copy and rewrite.
  pub blacklist: RuleSet,
  /// Rules leaving references completely untouched.
  pub skip: RuleSet,
}

/// Errors that can occur while loading a rule file.
#[derive(Debug, thiserror::Error)]
pub enum RuleFileError {
  /// Failed to read the rule file from disk.
  #[error("failed to read {}", path.display())]
  Io {
    /// Path that caused the error.
    path: PathBuf,
    /// Source I/O error.
    #[source]
    source: std::io::Error,
  },
  /// Failed to parse the JSON rule file.
  #[error("failed to parse {}", path.display())]
  Parse {
    /// Path that caused the error.
    path: PathBuf,
    /// Source parse error.
    #[source]
    source: serde_json::Error,
  },
  /// A `url` pattern is not a valid regular expression.
  #[error("invalid url pattern in {}", path.display())]
  Pattern {
    /// Path that caused the error.
    path: PathBuf,
    /// Source regex error.
    #[source]
    source: regex::Error,
  },
}

impl ReferenceRules {
  /// Load rules from `path`; a missing file yields no rules.
  pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, RuleFileError> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
      Ok(contents) => contents,
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
        return Ok(Self::default());
      }
      Err(err) => {
        return Err(RuleFileError::Io {
          path: path.to_path_buf(),
          source: err,
        });
      }
    };

    let file: RuleFile = serde_json::from_str(&contents).map_err(|err| RuleFileError::Parse {
      path: path.to_path_buf(),
      source: err,
    })?;

    Self::try_from(file).map_err(|err| RuleFileError::Pattern {
      path: path.to_path_buf(),
      source: err,
    })
  }
}

impl TryFrom<RuleFile> for ReferenceRules {
  type Error = regex::Error;

  fn try_from(file: RuleFile) -> Result<Self, Self::Error> {
    Ok(Self {
      blacklist: compile(file.blacklist)?,
      skip: compile(file.skip)?,
    })
  }
}

fn compile(records: Vec<RuleRecord>) -> Result<RuleSet, regex::Error> {
  records
    .into_iter()
    .filter(|record| record.url.is_some() || record.source.is_some())
    .map(|record| ReferenceRule::new(record.url.as_deref(), record.source.as_deref()))
    .collect::<Result<Vec<_>, _>>()
    .map(RuleSet)
}

/// `rule` matches `candidate` exactly or as one of its parent directories.
fn scope_matches(rule: &str, candidate: &str) -> bool {
  if candidate == rule {
    return true;
  }

  candidate
    .strip_prefix(rule)
    .is_some_and(|suffix| suffix.starts_with('/'))
}
