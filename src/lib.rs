#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod asset_paths;
pub mod builder;
pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod install;
pub mod loader;
pub mod models;
pub mod options;
pub mod policy;
pub mod rewrite;
pub mod selection;

pub use builder::{CopyStream, HtmlCopier};
pub use config::ProjectConfig;
pub use error::{CopyError, Result};
pub use install::{install_output, install_outputs};
pub use loader::{FsLoader, ResourceLoader};
pub use models::{FileFormat, InputFile, OutputFile};
pub use options::{CopyOptions, PathOverwrite, ReferencePredicate, SchemelessRewrite, SchemelessUrlFix};
pub use selection::ReferenceRules;
