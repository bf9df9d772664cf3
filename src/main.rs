//! Command-line entry point: copy HTML files and their local resources into a directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use htmlcpr::options::{PrefixOverwrite, SchemelessUrlFix};
use htmlcpr::selection::ReferenceRules;
use htmlcpr::{CopyOptions, HtmlCopier, InputFile, ProjectConfig, install_outputs};

/// Copy HTML documents together with every local resource they reference.
#[derive(Debug, Parser)]
#[command(name = "htmlcpr", version, about)]
struct Cli {
  /// Files to copy, relative to the working directory.
  #[arg(required = true)]
  files: Vec<PathBuf>,

  /// Destination directory.
  #[arg(short, long)]
  out: PathBuf,

  /// Working directory used to resolve input paths.
  #[arg(long)]
  cwd: Option<PathBuf>,

  /// Root for output paths and root-relative URLs (defaults to the working directory).
  #[arg(long)]
  base: Option<PathBuf>,

  /// Configuration file (defaults to htmlcpr.config.{json,yaml,yml} in the working directory).
  #[arg(long)]
  config: Option<PathBuf>,

  /// Scheme given to protocol-relative URLs.
  #[arg(long, value_name = "SCHEME")]
  schemeless_fix: Option<String>,

  /// Directory name whose files are copied but not scanned; repeatable.
  #[arg(long = "norec-dir", value_name = "NAME")]
  norec_dirs: Vec<String>,

  /// Place every discovered dependency under this directory.
  #[arg(long, value_name = "DIR")]
  prefix: Option<String>,

  /// JSON rule file with blacklist/skip rules.
  #[arg(long)]
  rules: Option<PathBuf>,

  /// List what would be written without touching the destination.
  #[arg(long)]
  dry_run: bool,

  /// Log every reference decision.
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_filter = if cli.verbose { "debug" } else { "info" };
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

  let process_cwd = std::env::current_dir().context("failed to read the current directory")?;
  let cwd = match &cli.cwd {
    Some(dir) => process_cwd.join(dir),
    None => process_cwd,
  };

  let config = match &cli.config {
    Some(path) => ProjectConfig::from_path(&cwd.join(path))
      .with_context(|| format!("failed to load {}", path.display()))?,
    None => ProjectConfig::discover(&cwd)
      .with_context(|| format!("failed to discover configuration in {}", cwd.display()))?
      .0,
  };
  let options = apply_flags(config.into_options(&cwd)?, &cli, &cwd)?;

  let inputs = cli
    .files
    .iter()
    .map(|file| InputFile::load(file, &options).with_context(|| format!("failed to read {}", file.display())))
    .collect::<Result<Vec<_>>>()?;

  let mut stream = HtmlCopier::new(options)?.stream(inputs);
  let outputs = stream.by_ref().collect::<htmlcpr::Result<Vec<_>>>()?;
  let visited = stream.copier().visited();
  if visited.is_empty() {
    warn!("nothing to copy: every input was a directory");
  } else {
    info!("resolved {} files", visited.len());
  }

  if cli.dry_run {
    for output in &outputs {
      println!("{}\t{}", output.relative, output.size());
    }
    return Ok(());
  }

  install_outputs(&cli.out, &outputs)
    .with_context(|| format!("failed to write into {}", cli.out.display()))?;
  info!("wrote {} files to {}", outputs.len(), cli.out.display());
  Ok(())
}

/// Layer command-line flags over the options built from the configuration file.
fn apply_flags(mut options: CopyOptions, cli: &Cli, cwd: &Path) -> Result<CopyOptions> {
  if let Some(base) = &cli.base {
    options = options.base(base);
  }
  if let Some(scheme) = &cli.schemeless_fix {
    options.schemeless_url_fix = SchemelessUrlFix::Scheme(scheme.clone());
  }
  options.norec_dirs.extend(cli.norec_dirs.iter().cloned());
  if let Some(prefix) = &cli.prefix {
    options = options.overwrite_path(PrefixOverwrite(prefix.clone()));
  }
  if let Some(path) = &cli.rules {
    let rules = ReferenceRules::load_from_path(cwd.join(path))?;
    if !rules.blacklist.is_empty() {
      options = options.blacklist(rules.blacklist);
    }
    if !rules.skip.is_empty() {
      options = options.skip(rules.skip);
    }
  }
  Ok(options)
}

#[cfg(test)]
mod tests {
  use std::fs;

  use htmlcpr::policy::{Decision, KeepReason, decide};
  use tempfile::tempdir;

  use super::*;

  #[test]
  fn rules_flag_resolves_against_the_working_directory() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("rules.json"), r#"{"blacklist": [{"url": "almond"}]}"#).unwrap();

    let cli = Cli::parse_from(["htmlcpr", "--out", "dist", "--rules", "rules.json", "index.html"]);
    let options = apply_flags(CopyOptions::new(), &cli, dir.path()).unwrap();

    assert_eq!(
      decide(&options, "/images/almond.jpg", "index.html"),
      Decision::Keep(KeepReason::Blacklisted)
    );
  }
}
