//! Lexical path normalization.
//!
//! Paths are compared by their normalized component sequence. Normalization is purely lexical: `.` components are
//! dropped and `..` pops the previous normal component. Symlinks are not followed; hosts that care should
//! canonicalize the session root once before walking.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Normalize `path` lexically.
///
/// A `..` at the root stays at the root, matching what the OS does for `/..`.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().next_back(), Some(Component::RootDir | Component::Prefix(_)) | None) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `path` against `base` when it is relative, then normalize.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Split a path into the segments used as trie keys.
pub fn segments(path: &Path) -> Vec<OsString> {
    normalize(path).components().map(|c| c.as_os_str().to_os_string()).collect()
}

/// Whether `ancestor` is a strict ancestor of `path` (both normalized).
pub fn is_strict_descendant(path: &Path, ancestor: &Path) -> bool {
    let path = normalize(path);
    let ancestor = normalize(ancestor);
    path != ancestor && path.starts_with(&ancestor)
}

/// Render `path` relative to `root` with `/` separators, for node ids.
///
/// Paths outside `root` are rendered in full.
pub fn display_relative(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_cur_dir() {
        assert_eq!(normalize(Path::new("/a/./b/.")), PathBuf::from("/a/b"));
    }

    #[test]
    fn test_normalize_pops_parent_dir() {
        assert_eq!(normalize(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
    }

    #[test]
    fn test_normalize_parent_at_root_stays() {
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn test_resolve_against_relative() {
        assert_eq!(
            resolve_against(Path::new("/proj/nb"), Path::new("../x.ipynb")),
            PathBuf::from("/proj/x.ipynb")
        );
    }

    #[test]
    fn test_resolve_against_absolute_ignores_base() {
        assert_eq!(
            resolve_against(Path::new("/proj"), Path::new("/other/x.ipynb")),
            PathBuf::from("/other/x.ipynb")
        );
    }

    #[test]
    fn test_segments_equal_for_equivalent_paths() {
        assert_eq!(segments(Path::new("/a/b/./c")), segments(Path::new("/a/b/d/../c")));
    }

    #[test]
    fn test_strict_descendant() {
        assert!(is_strict_descendant(Path::new("/a/b/c"), Path::new("/a")));
        assert!(!is_strict_descendant(Path::new("/a"), Path::new("/a")));
        assert!(!is_strict_descendant(Path::new("/ab"), Path::new("/a")));
    }

    #[test]
    fn test_display_relative() {
        assert_eq!(display_relative(Path::new("/p/a/b.ipynb"), Path::new("/p")), "a/b.ipynb");
        assert_eq!(display_relative(Path::new("/p"), Path::new("/p")), "");
    }
}
