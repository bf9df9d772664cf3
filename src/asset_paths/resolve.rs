use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

/// A local URL split into the part that names a file and the part that does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalUrl<'a> {
    /// Path portion, still percent-encoded.
    pub path: &'a str,
    /// `?query` and/or `#fragment`, re-appended verbatim after rewriting.
    pub suffix: &'a str,
}

impl<'a> LocalUrl<'a> {
    /// Split `url` at the first `?` or `#`.
    pub fn split(url: &'a str) -> Self {
        let url = url.trim();
        let cut = url.find(&['?', '#'][..]).unwrap_or(url.len());
        Self {
            path: &url[..cut],
            suffix: &url[cut..],
        }
    }

    /// Whether the URL names no file at all (`#top`, `?page=2`).
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Whether the path is relative to the site root rather than to the document.
    pub fn is_root_relative(&self) -> bool {
        self.path.starts_with('/')
    }

    /// Path with percent-escapes decoded; undecodable input is kept as written.
    pub fn decoded_path(&self) -> String {
        percent_decode_str(self.path)
            .decode_utf8()
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| self.path.to_string())
    }
}

/// Resolve a local URL to a canonical filesystem path.
///
/// Root-relative URLs resolve against `base`; everything else resolves against
/// `referrer_dir`, the directory holding the referencing file.
pub fn resolve_local(url: &LocalUrl<'_>, referrer_dir: &Path, base: &Path) -> PathBuf {
    let decoded = url.decoded_path();
    let joined = if url.is_root_relative() {
        base.join(decoded.trim_start_matches('/'))
    } else {
        referrer_dir.join(decoded)
    };
    normalize(&joined)
}

/// Lexically normalise a path, folding `.` and `..` without touching the filesystem.
/// Symlinks are not followed.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal = matches!(result.components().next_back(), Some(Component::Normal(_)));
                if last_is_normal {
                    result.pop();
                } else if !result.has_root() {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}
