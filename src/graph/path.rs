//! Canonicalization of target paths: case-insensitive, separators
//! normalized, resolved relative to the owning scope's directory. This is
//! purely lexical - it never touches the filesystem, since a target's
//! path commonly names an output that does not exist yet.

use std::path::{Component, Path, PathBuf};

/// Returns `(display_path, canonical_path)` for `text` as referenced from
/// `base_dir`. `display_path` preserves case and uses `/` separators for
/// readability; `canonical_path` is additionally lowercased and is the
/// graph's identity key.
pub fn canonicalize(text: &str, base_dir: &Path) -> (String, String) {
    let trimmed = text.trim();
    let raw = trimmed.replace('\\', "/");
    let p = Path::new(&raw);
    let absolute = if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    };
    let normalized = normalize_lexical(&absolute);
    let display = normalized.to_string_lossy().replace('\\', "/");
    let canonical = display.to_ascii_lowercase();
    (display, canonical)
}

/// Collapse `.` and `..` components without resolving symlinks or
/// touching the filesystem.
fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().last(), Some(Component::RootDir) | None) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_base_dir() {
        let (display, canonical) = canonicalize("src/main.c", Path::new("/proj"));
        assert_eq!(display, "/proj/src/main.c");
        assert_eq!(canonical, "/proj/src/main.c");
    }

    #[test]
    fn canonical_is_case_folded_display_is_not() {
        let (display, canonical) = canonicalize("Src/Main.C", Path::new("/proj"));
        assert_eq!(display, "/proj/Src/Main.C");
        assert_eq!(canonical, "/proj/src/main.c");
    }

    #[test]
    fn collapses_dot_components() {
        let (display, _) = canonicalize("./sub/../main.c", Path::new("/proj"));
        assert_eq!(display, "/proj/main.c");
    }

    #[test]
    fn backslashes_normalize_to_forward_slash() {
        let (display, _) = canonicalize("sub\\main.c", Path::new("/proj"));
        assert_eq!(display, "/proj/sub/main.c");
    }
}
