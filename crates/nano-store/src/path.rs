//! Object key resolution.
//!
//! Turns an untrusted object key into a path beneath the storage root, or
//! rejects it. Resolution is purely lexical and runs in this order:
//!
//! 1. Normalize the key: collapse `.`, `..` and repeated separators.
//! 2. Reject "no key": empty, `.` or `/`.
//! 3. Reject absolute keys and keys that still start with `..`.
//! 4. Join onto the root and normalize again.
//! 5. Require the result to be the root or a component-wise descendant of
//!    it. `/data-evil/x` shares a string prefix with `/data` but is not
//!    inside it.
//!
//! Symlinks are not considered here; see [`crate::LocalObjectStore`].

use std::path::{Component, Path, PathBuf};

use crate::error::{StoreError, StoreResult};

const CURRENT_DIR: &str = ".";
const PARENT_DIR: &str = "..";
const ROOT_MARKER: &str = "/";

/// `/` is a separator on every platform, the native separator as well.
fn is_separator(c: char) -> bool {
    c == '/' || std::path::is_separator(c)
}

/// Lexically normalize an object key without touching the filesystem.
///
/// Empty and `.` segments are dropped, `..` cancels the preceding segment,
/// and a `..` with nothing left to cancel is kept. Keys that start with a
/// separator stay absolute (`/..` is `/`). The output always uses `/`.
///
/// ```
/// use nano_store::normalize;
///
/// assert_eq!(normalize("a//b/./c"), "a/b/c");
/// assert_eq!(normalize("a/../../b"), "../b");
/// assert_eq!(normalize("/../etc"), "/etc");
/// assert_eq!(normalize(""), ".");
/// ```
pub fn normalize(key: &str) -> String {
    let absolute = key.starts_with(is_separator);
    let mut segments: Vec<&str> = Vec::new();

    for segment in key.split(is_separator) {
        match segment {
            "" | CURRENT_DIR => {}
            PARENT_DIR => match segments.last() {
                Some(last) if *last != PARENT_DIR => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(PARENT_DIR),
            },
            name => segments.push(name),
        }
    }

    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, true) => ROOT_MARKER.to_string(),
        (true, false) => format!("/{joined}"),
        (false, true) => CURRENT_DIR.to_string(),
        (false, false) => joined,
    }
}

/// Resolve `key` to a path confined beneath `root`.
///
/// Total and deterministic: every input string either resolves or fails with
/// [`StoreError::InvalidPath`]. Never performs I/O.
///
/// ```
/// use std::path::Path;
/// use nano_store::resolve;
///
/// let root = Path::new("/srv/data");
/// assert_eq!(resolve(root, "a/b.txt").unwrap(), Path::new("/srv/data/a/b.txt"));
/// assert!(resolve(root, "../data-evil/x").is_err());
/// assert!(resolve(root, "/etc/passwd").is_err());
/// assert!(resolve(root, "").is_err());
/// ```
pub fn resolve(root: &Path, key: &str) -> StoreResult<PathBuf> {
    if key.contains('\0') {
        return Err(StoreError::invalid(key, "contains a NUL byte"));
    }

    let normalized = normalize(key);
    if normalized.is_empty() || normalized == CURRENT_DIR || normalized == ROOT_MARKER {
        return Err(StoreError::invalid(key, "no key given"));
    }

    if is_absolute(&normalized) {
        return Err(StoreError::invalid(key, "absolute paths are not allowed"));
    }
    if normalized.split('/').next() == Some(PARENT_DIR) {
        return Err(StoreError::invalid(key, "escapes storage root"));
    }

    let root = lexical(root);
    let joined = lexical(&root.join(&normalized));
    if !is_contained(&root, &joined) {
        return Err(StoreError::invalid(key, "escapes storage root"));
    }

    Ok(joined)
}

/// Convert a path beneath `root` back into its canonical object key.
///
/// Returns `None` for `root` itself, for paths outside it and for names
/// that are not UTF-8. Feeding the result back into [`resolve`] yields
/// `path` again.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rest = path.strip_prefix(root).ok()?;
    let segments = rest
        .components()
        .map(|component| match component {
            Component::Normal(name) => name.to_str().map(str::to_owned),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Root-or-descendant check on whole components, never on string prefixes.
pub(crate) fn is_contained(root: &Path, path: &Path) -> bool {
    path == root || path.starts_with(root)
}

fn is_absolute(normalized: &str) -> bool {
    normalized.starts_with('/')
        || Path::new(normalized)
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
}

fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ROOT: &str = "/srv/data";

    fn root() -> &'static Path {
        Path::new(ROOT)
    }

    fn rejected(key: &str) -> bool {
        matches!(resolve(root(), key), Err(StoreError::InvalidPath { .. }))
    }

    // -----------------------------------------------------------------------
    // Normalization
    // -----------------------------------------------------------------------

    #[test]
    fn normalize_collapses_segments() {
        assert_eq!(normalize("a//b/./c/"), "a/b/c");
        assert_eq!(normalize("a/x/../b"), "a/b");
        assert_eq!(normalize("./a"), "a");
        assert_eq!(normalize("a/.."), ".");
    }

    #[test]
    fn normalize_keeps_unresolvable_parents() {
        assert_eq!(normalize(".."), "..");
        assert_eq!(normalize("../../x"), "../../x");
        assert_eq!(normalize("a/../../x"), "../x");
    }

    #[test]
    fn normalize_absolute_keys() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("//"), "/");
        assert_eq!(normalize("/.."), "/");
        assert_eq!(normalize("/a/../b"), "/b");
    }

    // -----------------------------------------------------------------------
    // Rejection
    // -----------------------------------------------------------------------

    #[test]
    fn rejects_missing_keys() {
        for key in ["", ".", "/", "./", "//", "a/..", "./a/../"] {
            assert!(rejected(key), "{key:?} should be rejected");
        }
    }

    #[test]
    fn rejects_absolute_keys() {
        assert!(rejected("/etc/passwd"));
        assert!(rejected("/srv/data/a.txt"));
        assert!(rejected("//double/leading"));
    }

    #[test]
    fn rejects_leading_parent() {
        for key in ["..", "../x", "../../etc/passwd", "a/../../x", "./../x"] {
            assert!(rejected(key), "{key:?} should be rejected");
        }
    }

    #[test]
    fn rejects_sibling_sharing_a_prefix() {
        assert!(rejected("../data-evil/x"));
        assert!(!is_contained(
            Path::new("/data"),
            Path::new("/data-evil/x")
        ));
        assert!(is_contained(Path::new("/data"), Path::new("/data/x")));
        assert!(is_contained(Path::new("/data"), Path::new("/data")));
    }

    #[test]
    fn rejects_nul_bytes() {
        assert!(rejected("a\0b"));
    }

    #[cfg(windows)]
    #[test]
    fn rejects_backslash_traversal() {
        let root = Path::new(r"C:\srv\data");
        assert!(resolve(root, r"..\x").is_err());
        assert!(resolve(root, r"C:\Windows").is_err());
        assert!(resolve(root, r"a\b").is_ok());
    }

    // -----------------------------------------------------------------------
    // Acceptance
    // -----------------------------------------------------------------------

    #[test]
    fn resolves_nested_keys() {
        assert_eq!(
            resolve(root(), "a/b.txt").unwrap(),
            PathBuf::from("/srv/data/a/b.txt")
        );
        assert_eq!(
            resolve(root(), "a//b/./c").unwrap(),
            PathBuf::from("/srv/data/a/b/c")
        );
        assert_eq!(
            resolve(root(), "a/x/../b").unwrap(),
            PathBuf::from("/srv/data/a/b")
        );
    }

    #[test]
    fn dot_prefixed_names_are_ordinary() {
        assert_eq!(
            resolve(root(), "..hidden").unwrap(),
            PathBuf::from("/srv/data/..hidden")
        );
        assert_eq!(
            resolve(root(), ".config/x").unwrap(),
            PathBuf::from("/srv/data/.config/x")
        );
    }

    #[test]
    fn resolution_never_touches_disk() {
        let missing = Path::new("/definitely/not/a/real/root");
        assert_eq!(
            resolve(missing, "a").unwrap(),
            PathBuf::from("/definitely/not/a/real/root/a")
        );
    }

    #[test]
    fn relative_key_round_trips() {
        let resolved = resolve(root(), "a/./b//c.txt").unwrap();
        let key = relative_key(root(), &resolved).unwrap();
        assert_eq!(key, "a/b/c.txt");
        assert_eq!(resolve(root(), &key).unwrap(), resolved);
    }

    #[cfg(unix)]
    #[test]
    fn relative_key_requires_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = root().join("a").join(OsStr::from_bytes(b"bad\xff.txt"));
        assert!(relative_key(root(), &path).is_none());
    }

    #[test]
    fn relative_key_outside_root() {
        assert!(relative_key(root(), Path::new("/srv/data")).is_none());
        assert!(relative_key(root(), Path::new("/srv/data-evil/x")).is_none());
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn resolution_is_total_and_contained(key in ".*") {
            if let Ok(path) = resolve(root(), &key) {
                prop_assert!(path.starts_with(root()));
                prop_assert_ne!(path.as_path(), root());
            }
        }

        #[test]
        fn resolution_is_idempotent(key in "[a-z./]{0,24}") {
            if let Ok(path) = resolve(root(), &key) {
                let again = relative_key(root(), &path).unwrap();
                prop_assert_eq!(resolve(root(), &again).unwrap(), path);
            }
        }

        #[test]
        fn backtracking_past_the_root_is_rejected(
            depth in 0usize..4,
            extra in 1usize..4,
            tail in "[a-z]{1,6}",
        ) {
            let down = "d/".repeat(depth);
            let up = "../".repeat(depth + extra);
            let key = format!("{down}{up}{tail}");
            prop_assert!(rejected(&key));
        }
    }
}
