use std::path::{Component, Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters that cannot appear unescaped in a rewritten URL path.
const LINK_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'\'')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'(')
    .add(b')')
    .add(b'{')
    .add(b'}');

/// Render a path with forward slashes regardless of the host separator.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Compute `target` relative to the directory `from`, lexically.
///
/// Both paths are expected to be normalised. When `target` does not live beneath `from`
/// the result climbs with `..` components.
pub fn relative_path(target: &Path, from: &Path) -> PathBuf {
    let target: Vec<Component<'_>> = target.components().collect();
    let from: Vec<Component<'_>> = from.components().collect();

    let shared = target
        .iter()
        .zip(from.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in shared..from.len() {
        result.push("..");
    }
    for component in &target[shared..] {
        result.push(component.as_os_str());
    }
    result
}

/// Output-relative path of `canonical` beneath `base`, with `/` separators.
pub fn output_relative(canonical: &Path, base: &Path) -> String {
    to_slash(&relative_path(canonical, base))
}

/// Whether an output-relative path stays beneath the output root.
///
/// Empty paths, absolute paths and paths with `..` components all escape it.
pub fn is_contained(relative: &str) -> bool {
    let mut named = false;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            _ => return false,
        }
    }
    named
}

/// Link text that reaches the output file `to` from a document emitted at `from`.
///
/// Both arguments are output-relative paths; the result is relative to the directory
/// containing `from` and is percent-encoded for embedding in HTML or CSS.
pub fn link_between(from: &str, to: &str) -> String {
    let from_dir = Path::new(from).parent().unwrap_or(Path::new(""));
    let link = relative_path(&clean(to), &clean_dir(from_dir));
    let link = to_slash(&link);
    utf8_percent_encode(&link, LINK_UNSAFE).to_string()
}

fn clean(path: &str) -> PathBuf {
    super::resolve::normalize(Path::new(path.trim_start_matches('/')))
}

fn clean_dir(path: &Path) -> PathBuf {
    super::resolve::normalize(path)
}
