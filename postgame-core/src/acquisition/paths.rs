//! Managed-root containment checks
//!
//! Every path written or accepted under the managed root goes through
//! these helpers. Containment is decided on canonical paths so symlinks
//! cannot redirect a write or a scan outside the root.

use std::path::{Component, Path, PathBuf};

use crate::error::AcquisitionError;

/// Create `root` if needed and return its canonical form
pub fn canonical_root(root: &Path) -> Result<PathBuf, AcquisitionError> {
    std::fs::create_dir_all(root)?;
    let canonical = root.canonicalize()?;
    tracing::trace!("Canonical root {:?} -> {:?}", root, canonical);
    Ok(canonical)
}

/// Canonicalize an existing path and require it to sit strictly below
/// `canonical_root`
pub fn ensure_contained(canonical_root: &Path, candidate: &Path) -> Result<PathBuf, AcquisitionError> {
    let resolved = candidate.canonicalize()?;
    if resolved != canonical_root && resolved.starts_with(canonical_root) {
        Ok(resolved)
    } else {
        Err(AcquisitionError::PathEscape {
            path: resolved,
            root: canonical_root.to_path_buf(),
        })
    }
}

/// Turn an archive member name into a relative path, or reject it
///
/// Absolute names, drive prefixes and any `..` component are escapes.
/// Backslashes are treated as separators.
pub fn safe_relative_path(name: &str, root: &Path) -> Result<PathBuf, AcquisitionError> {
    let escape = || AcquisitionError::PathEscape {
        path: PathBuf::from(name),
        root: root.to_path_buf(),
    };

    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(escape());
    }

    let mut relative = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(escape());
            }
        }
    }

    // Windows drive letters survive as a Normal component on unix
    if relative
        .components()
        .next()
        .and_then(|c| c.as_os_str().to_str())
        .is_some_and(|first| first.len() == 2 && first.ends_with(':'))
    {
        return Err(escape());
    }

    Ok(relative)
}

/// Directory name for an installed map derived from its title
pub fn sanitize_dir_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('_').trim();
    if trimmed.is_empty() {
        "map".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_safe_relative_path() {
        let root = Path::new("/maps");
        assert_eq!(
            safe_relative_path("Map/./map.upk", root).unwrap(),
            PathBuf::from("Map/map.upk")
        );
        assert_eq!(
            safe_relative_path("Map\\Textures\\a.upk", root).unwrap(),
            PathBuf::from("Map/Textures/a.upk")
        );

        for evil in ["../../evil.exe", "/etc/passwd", "Map/../../x", "C:/Windows/x", "..\\evil.exe"] {
            assert!(
                matches!(safe_relative_path(evil, root), Err(AcquisitionError::PathEscape { .. })),
                "{evil} should be rejected"
            );
        }
    }

    #[test]
    fn test_ensure_contained() {
        let temp = TempDir::new().unwrap();
        let root = canonical_root(&temp.path().join("maps")).unwrap();
        let inside = root.join("a");
        std::fs::create_dir(&inside).unwrap();

        assert_eq!(ensure_contained(&root, &inside).unwrap(), inside);
        assert!(ensure_contained(&root, &root).is_err());
        assert!(ensure_contained(&root, temp.path()).is_err());
        assert!(ensure_contained(&root, &root.join("a/../..")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_is_rejected() {
        let temp = TempDir::new().unwrap();
        let root = canonical_root(&temp.path().join("maps")).unwrap();
        let outside = temp.path().join("outside");
        std::fs::create_dir(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        assert!(matches!(
            ensure_contained(&root, &root.join("link")),
            Err(AcquisitionError::PathEscape { .. })
        ));
    }

    #[test]
    fn test_sanitize_dir_name() {
        assert_eq!(sanitize_dir_name("Obstacle Course (v2)"), "Obstacle Course (v2)");
        assert_eq!(sanitize_dir_name("../../etc"), "etc");
        assert_eq!(sanitize_dir_name("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_dir_name("..."), "map");
        assert_eq!(sanitize_dir_name(""), "map");
    }
}
