//! Helpers for classifying, resolving and relativising resource paths.
//!
//! Classification, filesystem resolution and output-path arithmetic live in separate
//! submodules so each can be tested on its own. None of them touch the filesystem.

mod classify;
mod relative;
mod resolve;

pub use classify::classify;
pub use relative::{is_contained, link_between, output_relative, relative_path, to_slash};
pub use resolve::{LocalUrl, normalize, resolve_local};
