//! Project configuration loader for describing a copy run on disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CopyError, Result};
use crate::options::{CopyOptions, PrefixOverwrite, SchemelessUrlFix};
use crate::selection::{DEFAULT_RULES_FILE, ReferenceRules};

/// File names probed, in order, when discovering a configuration.
const CONFIG_FILES: &[&str] = &["htmlcpr.config.json", "htmlcpr.config.yaml", "htmlcpr.config.yml"];

/// Discoverable project configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
  /// Root for output paths and root-relative URLs.
  pub base: Option<PathBuf>,
  /// Scheme given to protocol-relative URLs (`http` when unset).
  pub schemeless_url_fix: Option<String>,
  /// Directory names whose files are copied but not scanned.
  pub norec_dirs: Vec<String>,
  /// Directory every discovered dependency is placed under.
  pub dependency_prefix: Option<String>,
  /// Rule file with blacklist/skip rules, relative to the configuration directory.
  pub rules: Option<PathBuf>,
}

impl ProjectConfig {
  /// Look for a configuration file in `dir`.
  ///
  /// A missing file yields the defaults; a file that exists but cannot be parsed is an
  /// error, so a typo never silently changes what gets copied.
  pub fn discover(dir: &Path) -> Result<(Self, Option<PathBuf>)> {
    for name in CONFIG_FILES {
      let candidate = dir.join(name);
      if candidate.is_file() {
        let config = Self::from_path(&candidate)?;
        return Ok((config, Some(candidate)));
      }
    }
    Ok((Self::default(), None))
  }

  /// Read configuration from a specific JSON or YAML file.
  pub fn from_path(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path).map_err(|err| CopyError::io(path, err))?;
    let is_yaml = path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
      serde_yaml::from_str(&content)
        .map_err(|err| CopyError::Config(format!("failed to parse {}: {err}", path.display())))
    } else {
      serde_json::from_str(&content)
        .map_err(|err| CopyError::Config(format!("failed to parse {}: {err}", path.display())))
    }
  }

  /// Turn the configuration into run options, resolving relative paths against `dir`.
  pub fn into_options(self, dir: &Path) -> Result<CopyOptions> {
    let mut options = CopyOptions::new().cwd(dir);

    if let Some(base) = self.base {
      options = options.base(dir.join(base));
    }
    if let Some(scheme) = self.schemeless_url_fix {
      options.schemeless_url_fix = SchemelessUrlFix::Scheme(scheme);
    }
    options.norec_dirs = self.norec_dirs;
    if let Some(prefix) = self.dependency_prefix {
      options = options.overwrite_path(PrefixOverwrite(prefix));
    }

    let rules_path = dir.join(self.rules.unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_FILE)));
    let rules = ReferenceRules::load_from_path(&rules_path)
      .map_err(|err| CopyError::Config(format!("{err}: {}", error_chain(&err))))?;
    if !rules.blacklist.is_empty() {
      options = options.blacklist(rules.blacklist);
    }
    if !rules.skip.is_empty() {
      options = options.skip(rules.skip);
    }

    options.validate()?;
    Ok(options)
  }
}

fn error_chain(err: &dyn std::error::Error) -> String {
  let mut messages = Vec::new();
  let mut current = err.source();
  while let Some(source) = current {
    messages.push(source.to_string());
    current = source.source();
  }
  messages.join(": ")
}
