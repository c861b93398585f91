//! Repository path helpers.
//!
//! Repository paths are absolute, `/`-separated and never end with a slash
//! (`/Root/Content/Apps`). The helpers here work on `&str` so they can be used
//! on both configured paths and paths returned by the remote store.

use super::error::{RecorderError, Result};

pub const SEPARATOR: char = '/';

/// Returns the parent of `path`, or `None` for a top-level path such as `/Root`.
pub fn parent_path(path: &str) -> Option<&str> {
    let idx = path.rfind(SEPARATOR)?;
    if idx == 0 { None } else { Some(&path[..idx]) }
}

/// Returns the last segment of `path`.
pub fn file_name(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

pub fn join(parent: &str, name: &str) -> String {
    format!("{}{}{}", parent.trim_end_matches(SEPARATOR), SEPARATOR, name)
}

/// True when `path` equals `root` or lies below it.
pub fn is_in_tree(path: &str, root: &str) -> bool {
    path == root
        || (path.starts_with(root) && path[root.len()..].starts_with(SEPARATOR))
}

/// Checks that `path` is absolute, has no empty segments and no trailing slash.
pub fn validate(path: &str) -> Result<()> {
    if !path.starts_with(SEPARATOR) {
        return Err(RecorderError::InvalidPath(format!(
            "'{path}' is not absolute"
        )));
    }
    if path.len() == 1 || path.ends_with(SEPARATOR) {
        return Err(RecorderError::InvalidPath(format!(
            "'{path}' must not end with a separator"
        )));
    }
    if path[1..].split(SEPARATOR).any(str::is_empty) {
        return Err(RecorderError::InvalidPath(format!(
            "'{path}' contains an empty segment"
        )));
    }
    Ok(())
}

/// Checks that `name` can be used as a single path segment.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains(SEPARATOR) {
        return Err(RecorderError::InvalidPath(format!(
            "'{name}' is not a valid content name"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent_path("/Root/Content/Apps"), Some("/Root/Content"));
        assert_eq!(parent_path("/Root"), None);
        assert_eq!(file_name("/Root/Content/Apps"), "Apps");
        assert_eq!(join("/Root/Content", "Apps"), "/Root/Content/Apps");
        assert_eq!(join("/Root/Content/", "Apps"), "/Root/Content/Apps");
    }

    #[test]
    fn test_in_tree_requires_segment_boundary() {
        assert!(is_in_tree("/Root/Content/Apps/X", "/Root/Content/Apps"));
        assert!(is_in_tree("/Root/Content/Apps", "/Root/Content/Apps"));
        assert!(!is_in_tree("/Root/Content/AppsOld/X", "/Root/Content/Apps"));
    }

    #[test]
    fn test_validate() {
        assert!(validate("/Root/Content").is_ok());
        assert!(validate("Root/Content").is_err());
        assert!(validate("/Root/Content/").is_err());
        assert!(validate("/Root//Content").is_err());
        assert!(validate("/").is_err());
        assert!(validate_name("BPR-V0_1").is_ok());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("  ").is_err());
    }
}
